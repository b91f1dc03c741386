//! Station context
//!
//! Owns every component of the appliance core plus the live settings. Sensitive
//! operations are only reachable through [`Authorized`], which is handed out by
//! [`Station::authorize`] after the auth gate accepted the presented
//! credentials. Each [`Authorized`] handle is consumed by the single operation
//! it was obtained for.

use crate::{
    display_client::DisplayClient,
    error::{StationError, StationResult},
    messaging::MessagingProbe,
    radio::{Radio, VisibleNetwork},
    services::{
        accounts::{ACCOUNT_SLOTS, AccountRecord, AccountRegistry, ApiAccount, ExportedAccount},
        auth::{AuthGate, PresentedCredentials},
        dynamic_qr::{DynamicQr, QrRequest, SessionSnapshot},
        network::{ConnectivityState, NetworkModeMachine, SelfHostedNetwork},
        settings::{MessagingSettings, MessagingStatus, MessagingStatusReport, NetworkSettings},
        wifi_list::CredentialList,
    },
    store::ConfigStore,
};
use anyhow::Context;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use tokio::sync::broadcast;

pub const STATION_NAME: &str = "QR Station";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StationInfo {
    pub name: &'static str,
    pub status: &'static str,
}

/// Everything the config page shows. Never carries the admin password.
#[derive(Clone, Debug)]
pub struct ConfigView {
    pub accounts: [AccountRecord; ACCOUNT_SLOTS],
    pub current_ssid: Option<String>,
    pub messaging: MessagingSettings,
    pub auth_user: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KnownNetwork {
    pub ssid: String,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct ConnectRequest {
    #[serde(default)]
    #[validate(min_length = 1)]
    #[validate(max_length = 32)]
    pub s: String,
    #[serde(default)]
    #[validate(max_length = 63)]
    pub p: String,
}

/// Which known network to forget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteTarget {
    /// Position in the list as last fetched by the caller.
    Index(usize),
    /// Index that cannot denote any entry, e.g. negative or not a number.
    InvalidIndex(String),
    Ssid(String),
}

impl DeleteTarget {
    pub fn from_query(index: Option<&str>, ssid: Option<&str>) -> StationResult<Self> {
        match (index, ssid) {
            (_, Some(ssid)) if !ssid.is_empty() => Ok(Self::Ssid(ssid.to_string())),
            (Some(index), _) => Ok(index
                .trim()
                .parse()
                .map(Self::Index)
                .unwrap_or_else(|_| Self::InvalidIndex(index.to_string()))),
            _ => Err(StationError::invalid_argument("missing index or ssid")),
        }
    }
}

/// Fields of the config page form.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SaveSettings {
    pub bin0: String,
    pub acc0: String,
    pub bn0: String,
    pub on0: String,
    pub bin1: String,
    pub acc1: String,
    pub bn1: String,
    pub on1: String,
    pub bin2: String,
    pub acc2: String,
    pub bn2: String,
    pub on2: String,
    #[validate(max_length = 32)]
    pub ws: String,
    #[validate(max_length = 63)]
    pub wp: String,
    pub ms: String,
    pub mu: String,
    pub mp: String,
    pub me: String,
    pub au: String,
    /// Empty keeps the current admin password.
    pub ap: String,
}

impl SaveSettings {
    fn records(&self) -> [AccountRecord; ACCOUNT_SLOTS] {
        [
            AccountRecord::new(&self.bin0, &self.acc0, &self.bn0, &self.on0),
            AccountRecord::new(&self.bin1, &self.acc1, &self.bn1, &self.on1),
            AccountRecord::new(&self.bin2, &self.acc2, &self.bn2, &self.on2),
        ]
    }

    fn network_settings(&self, current_auth_pass: &str) -> NetworkSettings {
        NetworkSettings {
            messaging: MessagingSettings {
                server: self.ms.clone(),
                user: self.mu.clone(),
                password: self.mp.clone(),
                enabled: self.me == "1",
            },
            auth_user: self.au.clone(),
            auth_pass: if self.ap.is_empty() {
                current_auth_pass.to_string()
            } else {
                self.ap.clone()
            },
        }
    }
}

pub struct Station<R, D, M> {
    store: ConfigStore,
    accounts: AccountRegistry,
    credentials: CredentialList,
    settings: NetworkSettings,
    gate: AuthGate,
    network: NetworkModeMachine<R>,
    qr: DynamicQr<D>,
    messaging: M,
    restart_tx: broadcast::Sender<()>,
}

impl<R, D, M> Station<R, D, M>
where
    R: Radio,
    D: DisplayClient,
    M: MessagingProbe,
{
    /// Build the station from what is persisted in `store`. The network starts
    /// out `Idle`; the first tick runs the boot sequence.
    ///
    /// An unreadable store is not fatal: the station starts from defaults so
    /// the self-hosted network and the portal still come up.
    pub fn load(
        store: ConfigStore,
        radio: R,
        display: D,
        messaging: M,
        self_hosted: SelfHostedNetwork,
        restart_tx: broadcast::Sender<()>,
    ) -> Self {
        let (accounts, settings) = match Self::load_persisted(&store) {
            Ok(persisted) => persisted,
            Err(e) => {
                error!(
                    "failed to load namespace {}, using defaults: {e}",
                    store.namespace()
                );
                (AccountRegistry::default(), NetworkSettings::default())
            }
        };

        let gate = AuthGate::new(&settings.auth_user, &settings.auth_pass);
        if gate.is_disabled() {
            warn!("admin user is empty: auth gate disabled");
        }

        let credentials = CredentialList::new(store.clone());
        let network = NetworkModeMachine::new(radio, credentials.clone(), self_hosted);

        info!("station loaded from namespace {}", store.namespace());

        Self {
            store,
            accounts,
            credentials,
            settings,
            gate,
            network,
            qr: DynamicQr::new(display),
            messaging,
            restart_tx,
        }
    }

    fn load_persisted(store: &ConfigStore) -> StationResult<(AccountRegistry, NetworkSettings)> {
        let mut accounts = AccountRegistry::default();
        accounts.load(store)?;
        let settings = NetworkSettings::load(store)?;
        Ok((accounts, settings))
    }

    pub fn info(&self) -> StationInfo {
        StationInfo {
            name: STATION_NAME,
            status: "online",
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.network.state()
    }

    pub async fn tick(&mut self) -> StationResult<bool> {
        self.network.tick().await
    }

    pub async fn shutdown(&mut self) -> StationResult<()> {
        self.network.shutdown().await
    }

    /// Ask the entry point to tear down and rebuild the station.
    pub fn reboot(&self) -> StationResult<()> {
        info!("restart requested");
        self.restart_tx
            .send(())
            .context("failed to send restart signal")
            .map_err(StationError::Platform)?;
        Ok(())
    }

    pub fn authorize(
        &mut self,
        presented: Option<PresentedCredentials<'_>>,
    ) -> StationResult<Authorized<'_, R, D, M>> {
        if !self.gate.check(presented) {
            debug!("authorization denied");
            return Err(StationError::Unauthorized);
        }

        Ok(Authorized { station: self })
    }
}

/// Proof that the auth gate accepted the caller.
pub struct Authorized<'a, R, D, M> {
    station: &'a mut Station<R, D, M>,
}

impl<R, D, M> Authorized<'_, R, D, M>
where
    R: Radio,
    D: DisplayClient,
    M: MessagingProbe,
{
    pub async fn config_view(self) -> ConfigView {
        let station = self.station;
        ConfigView {
            accounts: station.accounts.records().clone(),
            current_ssid: station.network.current_ssid().await,
            messaging: station.settings.messaging.clone(),
            auth_user: station.settings.auth_user.clone(),
        }
    }

    pub async fn scan(self) -> StationResult<Vec<VisibleNetwork>> {
        self.station.network.scan().await
    }

    pub async fn connect(self, request: ConnectRequest) -> StationResult<String> {
        request
            .validate()
            .map_err(|e| StationError::invalid_argument(e.to_string()))?;

        self.station.network.connect(&request.s, &request.p).await?;
        Ok(format!("Connected to {}", request.s))
    }

    pub fn list_known_networks(self) -> StationResult<Vec<KnownNetwork>> {
        Ok(self
            .station
            .credentials
            .get_all()?
            .into_iter()
            .map(|c| KnownNetwork { ssid: c.ssid })
            .collect())
    }

    /// Forgetting an entry that does not exist is not an error.
    pub fn delete_known_network(self, target: DeleteTarget) -> StationResult<()> {
        let credentials = &self.station.credentials;

        match target {
            DeleteTarget::Index(index) => match credentials.delete_at(index) {
                Ok(_) => Ok(()),
                Err(StationError::OutOfRange { index, len }) => {
                    debug!("delete index {index} ignored: list has {len} entries");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            DeleteTarget::InvalidIndex(index) => {
                debug!("delete index {index:?} ignored");
                Ok(())
            }
            DeleteTarget::Ssid(ssid) => {
                if !credentials.delete_by_ssid(&ssid)? {
                    debug!("delete {ssid} ignored: not a known network");
                }
                Ok(())
            }
        }
    }

    /// Persist accounts, an optional new network and the settings, then make
    /// the new settings live.
    pub fn save_settings(self, form: SaveSettings) -> StationResult<()> {
        form.validate()
            .map_err(|e| StationError::invalid_argument(e.to_string()))?;

        let station = self.station;
        station.accounts.save(&station.store, form.records())?;

        if !form.ws.is_empty() {
            station.credentials.add_or_update(&form.ws, &form.wp)?;
        }

        let settings = form.network_settings(&station.settings.auth_pass);
        settings.save(&station.store)?;

        station.gate = AuthGate::new(&settings.auth_user, &settings.auth_pass);
        station.settings = settings;

        info!("settings saved");
        Ok(())
    }

    /// Erase everything in the namespace and restart.
    pub fn factory_reset(self) -> StationResult<()> {
        let station = self.station;

        station.store.erase()?;

        warn!("factory reset: store cleared");
        station.reboot()
    }

    pub async fn activate_qr(self, request: QrRequest) -> StationResult<String> {
        self.station.qr.activate(request).await?;
        Ok("QR Updated".to_string())
    }

    pub fn session_snapshot(self) -> SessionSnapshot {
        self.station.qr.snapshot()
    }

    pub fn list_accounts(self) -> Vec<ApiAccount> {
        self.station.accounts.list_for_api()
    }

    pub fn export_accounts(self) -> Vec<ExportedAccount> {
        self.station.accounts.export()
    }

    pub async fn messaging_status(self) -> MessagingStatusReport {
        let settings = &self.station.settings.messaging;
        let link_up = self.station.messaging.is_connected(settings).await;

        MessagingStatusReport {
            status: MessagingStatus::evaluate(settings, link_up),
            enabled: settings.enabled,
        }
    }
}
