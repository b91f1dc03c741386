//! Network mode state machine
//!
//! ```text
//! Idle -> Scanning -> Connecting -> Connected
//!                          |            |  link loss
//!                          |            v
//!                          |       Connecting -> ...
//!                          v
//!                     ApFallback  (until an operator join succeeds)
//! ```
//!
//! A join is a blocking wait with a hard deadline: the radio is polled every
//! [`JOIN_POLL_INTERVAL`] until it reports a link to the requested network or
//! [`JOIN_TIMEOUT`] elapses. There is no retry per credential; callers iterate
//! over candidates themselves.

use crate::{
    error::{StationError, StationResult},
    radio::{LinkStatus, Radio, VisibleNetwork},
    services::wifi_list::{CredentialList, WifiCredential},
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
pub const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const DEFAULT_AP_SSID: &str = "QR Station";
pub const DEFAULT_AP_PASSPHRASE: &str = "88888888";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectivityState {
    Idle,
    Scanning,
    Connecting,
    Connected,
    ApFallback,
}

/// Name and passphrase of the fallback access point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelfHostedNetwork {
    pub name: String,
    pub passphrase: String,
}

impl Default for SelfHostedNetwork {
    fn default() -> Self {
        Self {
            name: DEFAULT_AP_SSID.to_string(),
            passphrase: DEFAULT_AP_PASSPHRASE.to_string(),
        }
    }
}

pub struct NetworkModeMachine<R> {
    radio: R,
    credentials: CredentialList,
    self_hosted: SelfHostedNetwork,
    self_hosted_active: bool,
    state: ConnectivityState,
    joined_ssid: Option<String>,
    join_timeout: Duration,
}

impl<R: Radio> NetworkModeMachine<R> {
    pub fn new(radio: R, credentials: CredentialList, self_hosted: SelfHostedNetwork) -> Self {
        Self {
            radio,
            credentials,
            self_hosted,
            self_hosted_active: false,
            state: ConnectivityState::Idle,
            joined_ssid: None,
            join_timeout: JOIN_TIMEOUT,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn self_hosted(&self) -> &SelfHostedNetwork {
        &self.self_hosted
    }

    /// Whether the configuration portal can currently be reached.
    pub fn portal_reachable(&self) -> bool {
        matches!(
            self.state,
            ConnectivityState::Connected | ConnectivityState::ApFallback
        )
    }

    /// Fresh scan of visible networks; nothing is cached.
    pub async fn scan(&self) -> StationResult<Vec<VisibleNetwork>> {
        self.radio.scan().await.map_err(StationError::Platform)
    }

    pub async fn current_ssid(&self) -> Option<String> {
        if self.state != ConnectivityState::Connected {
            return None;
        }

        match self.radio.current_ssid().await {
            Ok(ssid) => ssid,
            Err(e) => {
                warn!("failed to query current ssid: {e:#}");
                None
            }
        }
    }

    /// Operator requested join.
    ///
    /// On success the credential is remembered for future boots. On failure the
    /// previous state is restored, including the self-hosted network.
    pub async fn connect(&mut self, ssid: &str, passphrase: &str) -> StationResult<()> {
        if ssid.is_empty() {
            return Err(StationError::invalid_argument("missing ssid"));
        }

        let previous = self.state;
        self.transition(ConnectivityState::Connecting);

        if let Err(e) = self.join(ssid, passphrase).await {
            self.restore(previous).await;
            return Err(e);
        }

        self.transition(ConnectivityState::Connected);
        self.credentials.add_or_update(ssid, passphrase)
    }

    /// Try the stored credentials, falling back to the self-hosted network.
    pub async fn boot(&mut self) -> StationResult<ConnectivityState> {
        self.transition(ConnectivityState::Scanning);

        let stored = match self.credentials.get_all() {
            Ok(stored) => stored,
            Err(e) => {
                error!("failed to read stored wifi credentials: {e}");
                Vec::new()
            }
        };

        let candidates = self.prioritize(stored).await;
        self.join_any(&candidates).await
    }

    /// Periodic driver. Returns whether the portal is reachable afterwards.
    pub async fn tick(&mut self) -> StationResult<bool> {
        match self.state {
            ConnectivityState::Idle => {
                self.boot().await?;
            }
            ConnectivityState::Connected => match self.radio.status().await {
                Ok(LinkStatus::Connected) => {}
                Ok(LinkStatus::Disconnected) => {
                    warn!("link lost");
                    self.recover().await?;
                }
                Err(e) => warn!("failed to query link status: {e:#}"),
            },
            _ => {}
        }

        Ok(self.portal_reachable())
    }

    /// Leave self-hosted mode before the process exits.
    pub async fn shutdown(&mut self) -> StationResult<()> {
        self.stop_self_hosted().await?;
        self.transition(ConnectivityState::Idle);
        Ok(())
    }

    /// Retry the last joined network first, then the rest of the stored list.
    async fn recover(&mut self) -> StationResult<ConnectivityState> {
        let mut stored = self.credentials.get_all().unwrap_or_else(|e| {
            error!("failed to read stored wifi credentials: {e}");
            Vec::new()
        });

        let last = self.joined_ssid.as_deref();
        if let Some(pos) = stored.iter().position(|c| Some(c.ssid.as_str()) == last) {
            let current = stored.remove(pos);
            stored.insert(0, current);
        }

        self.join_any(&stored).await
    }

    async fn join_any(
        &mut self,
        candidates: &[WifiCredential],
    ) -> StationResult<ConnectivityState> {
        for candidate in candidates {
            self.transition(ConnectivityState::Connecting);

            match self.join(&candidate.ssid, &candidate.passphrase).await {
                Ok(()) => {
                    self.transition(ConnectivityState::Connected);
                    return Ok(self.state);
                }
                Err(e) => warn!("join {} failed: {e}", candidate.ssid),
            }
        }

        self.enter_ap_fallback().await?;
        Ok(self.state)
    }

    /// Visible networks first, keeping stored priority within each group.
    async fn prioritize(&self, stored: Vec<WifiCredential>) -> Vec<WifiCredential> {
        if stored.is_empty() {
            return stored;
        }

        let visible = match self.radio.scan().await {
            Ok(visible) => visible,
            Err(e) => {
                warn!("boot scan failed: {e:#}");
                return stored;
            }
        };

        let (mut first, rest): (Vec<_>, Vec<_>) = stored
            .into_iter()
            .partition(|c| visible.iter().any(|v| v.ssid == c.ssid));

        debug!("{} of the stored networks are visible", first.len());
        first.extend(rest);
        first
    }

    async fn join(&mut self, ssid: &str, passphrase: &str) -> StationResult<()> {
        self.stop_self_hosted().await?;

        info!("joining {ssid}");
        let started = Instant::now();

        // the deadline also covers radio calls that never return
        match timeout(self.join_timeout, self.associate(ssid, passphrase)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(StationError::JoinTimeout {
                    ssid: ssid.to_string(),
                    waited: started.elapsed(),
                });
            }
        }

        info!("joined {ssid} after {}ms", started.elapsed().as_millis());
        self.joined_ssid = Some(ssid.to_string());
        Ok(())
    }

    async fn associate(&self, ssid: &str, passphrase: &str) -> StationResult<()> {
        self.radio
            .join_network(ssid, passphrase)
            .await
            .map_err(StationError::Platform)?;

        while !self.linked_to(ssid).await {
            sleep(JOIN_POLL_INTERVAL).await;
        }

        Ok(())
    }

    /// Connected, and to `ssid` rather than to whatever network was up before.
    async fn linked_to(&self, ssid: &str) -> bool {
        match self.radio.status().await {
            Ok(LinkStatus::Connected) => {}
            Ok(LinkStatus::Disconnected) => return false,
            Err(e) => {
                debug!("status poll failed: {e:#}");
                return false;
            }
        }

        match self.radio.current_ssid().await {
            Ok(current) => current.as_deref() == Some(ssid),
            Err(e) => {
                debug!("ssid poll failed: {e:#}");
                false
            }
        }
    }

    async fn restore(&mut self, previous: ConnectivityState) {
        self.transition(previous);
        if previous != ConnectivityState::ApFallback {
            return;
        }

        if let Err(e) = self.start_self_hosted().await {
            error!("failed to restore self-hosted network: {e}");
            self.transition(ConnectivityState::Idle);
        }
    }

    async fn enter_ap_fallback(&mut self) -> StationResult<()> {
        if let Err(e) = self.start_self_hosted().await {
            // retried on the next tick
            self.transition(ConnectivityState::Idle);
            return Err(e);
        }

        self.transition(ConnectivityState::ApFallback);
        Ok(())
    }

    async fn start_self_hosted(&mut self) -> StationResult<()> {
        if self.self_hosted_active {
            return Ok(());
        }

        self.radio
            .start_self_hosted_network(&self.self_hosted.name, &self.self_hosted.passphrase)
            .await
            .map_err(StationError::Platform)?;

        self.self_hosted_active = true;
        Ok(())
    }

    async fn stop_self_hosted(&mut self) -> StationResult<()> {
        if !self.self_hosted_active {
            return Ok(());
        }

        self.radio
            .stop_self_hosted_network()
            .await
            .map_err(StationError::Platform)?;

        self.self_hosted_active = false;
        Ok(())
    }

    fn transition(&mut self, next: ConnectivityState) {
        if self.state != next {
            info!("network state {:?} -> {next:?}", self.state);
            self.state = next;
        }
    }
}
