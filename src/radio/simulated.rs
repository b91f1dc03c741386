use super::{LinkStatus, Radio, VisibleNetwork};
use anyhow::{Result, bail};
use log::info;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::Instant;

#[derive(Clone, Debug)]
struct ReachableNetwork {
    ssid: String,
    passphrase: String,
    signal_strength: i32,
}

#[derive(Debug)]
struct SimulatedState {
    reachable: Vec<ReachableNetwork>,
    association_delay: Duration,
    pending: Option<(String, Instant)>,
    connected: Option<String>,
    self_hosted: Option<(String, String)>,
    join_attempts: Vec<String>,
}

/// In-process radio with a configurable set of reachable networks.
///
/// Station and self-hosted modes are exclusive: joining while the self-hosted
/// network is up fails, starting it drops the station link.
#[derive(Clone, Debug)]
pub struct SimulatedRadio {
    state: Arc<Mutex<SimulatedState>>,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                reachable: Vec::new(),
                association_delay: Duration::from_millis(300),
                pending: None,
                connected: None,
                self_hosted: None,
                join_attempts: Vec::new(),
            })),
        }
    }
}

impl SimulatedRadio {
    pub fn with_network(self, ssid: &str, passphrase: &str, signal_strength: i32) -> Self {
        self.state().reachable.push(ReachableNetwork {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
            signal_strength,
        });
        self
    }

    pub fn with_association_delay(self, delay: Duration) -> Self {
        self.state().association_delay = delay;
        self
    }

    /// Make a network disappear, dropping the link if it was in use.
    pub fn remove_network(&self, ssid: &str) {
        let mut state = self.state();
        state.reachable.retain(|n| n.ssid != ssid);
        if state.connected.as_deref() == Some(ssid) {
            info!("simulated link loss on {ssid}");
            state.connected = None;
        }
    }

    pub fn self_hosted(&self) -> Option<(String, String)> {
        self.state().self_hosted.clone()
    }

    pub fn join_attempts(&self) -> Vec<String> {
        self.state().join_attempts.clone()
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Radio for SimulatedRadio {
    async fn join_network(&self, ssid: &str, passphrase: &str) -> Result<()> {
        let mut state = self.state();

        if state.self_hosted.is_some() {
            bail!("failed to join {ssid}: self-hosted network still active");
        }

        state.join_attempts.push(ssid.to_string());
        state.connected = None;
        state.pending = None;

        let accepted = state
            .reachable
            .iter()
            .any(|n| n.ssid == ssid && n.passphrase == passphrase);

        if accepted {
            let ready_at = Instant::now() + state.association_delay;
            state.pending = Some((ssid.to_string(), ready_at));
        }

        Ok(())
    }

    async fn status(&self) -> Result<LinkStatus> {
        let mut state = self.state();

        if let Some((ssid, ready_at)) = state.pending.take() {
            if Instant::now() >= ready_at {
                state.connected = Some(ssid);
            } else {
                state.pending = Some((ssid, ready_at));
            }
        }

        Ok(match state.connected {
            Some(_) => LinkStatus::Connected,
            None => LinkStatus::Disconnected,
        })
    }

    async fn scan(&self) -> Result<Vec<VisibleNetwork>> {
        let mut networks: Vec<_> = self
            .state()
            .reachable
            .iter()
            .map(|n| VisibleNetwork {
                ssid: n.ssid.clone(),
                signal_strength: n.signal_strength,
            })
            .collect();
        networks.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));
        Ok(networks)
    }

    async fn start_self_hosted_network(&self, name: &str, passphrase: &str) -> Result<()> {
        let mut state = self.state();
        state.connected = None;
        state.pending = None;
        state.self_hosted = Some((name.to_string(), passphrase.to_string()));
        Ok(())
    }

    async fn stop_self_hosted_network(&self) -> Result<()> {
        self.state().self_hosted = None;
        Ok(())
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        Ok(self.state().connected.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn join_completes_after_association_delay() {
        let radio = SimulatedRadio::default()
            .with_network("home", "secret", -40)
            .with_association_delay(Duration::from_millis(500));

        radio.join_network("home", "secret").await.unwrap();
        assert_eq!(radio.status().await.unwrap(), LinkStatus::Disconnected);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(radio.status().await.unwrap(), LinkStatus::Connected);
        assert_eq!(radio.current_ssid().await.unwrap(), Some("home".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_passphrase_never_connects() {
        let radio = SimulatedRadio::default().with_network("home", "secret", -40);

        radio.join_network("home", "nope").await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(radio.status().await.unwrap(), LinkStatus::Disconnected);
    }

    #[tokio::test]
    async fn join_while_self_hosted_fails() {
        let radio = SimulatedRadio::default().with_network("home", "secret", -40);
        radio
            .start_self_hosted_network("QR Station", "88888888")
            .await
            .unwrap();

        assert!(radio.join_network("home", "secret").await.is_err());
        assert!(radio.join_attempts().is_empty());
    }

    #[tokio::test]
    async fn scan_orders_by_signal() {
        let radio = SimulatedRadio::default()
            .with_network("weak", "x", -80)
            .with_network("strong", "y", -30);

        let ssids: Vec<_> = radio
            .scan()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.ssid)
            .collect();

        assert_eq!(ssids, ["strong", "weak"]);
    }
}
