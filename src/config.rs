use crate::services::network::{DEFAULT_AP_PASSPHRASE, DEFAULT_AP_SSID, SelfHostedNetwork};
use anyhow::{Context, Result, bail, ensure};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// UI server configuration
    pub ui: UiConfig,

    /// Persistent store location
    pub store: StoreConfig,

    /// Wireless radio selection
    pub radio: RadioConfig,

    /// Display service connection, if any
    pub display: DisplayConfig,

    /// Fallback access point credentials
    pub self_hosted: SelfHostedNetwork,

    /// Interval of the network state machine tick
    pub tick_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct UiConfig {
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub namespace: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RadioKind {
    Nmcli,
    Simulated,
}

impl FromStr for RadioKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nmcli" => Ok(Self::Nmcli),
            "simulated" => Ok(Self::Simulated),
            other => bail!("failed to parse RADIO: unknown radio {other:?}"),
        }
    }
}

/// A network the simulated radio can join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatedNetwork {
    pub ssid: String,
    pub passphrase: String,
    pub signal_strength: i32,
}

#[derive(Clone, Debug)]
pub struct RadioConfig {
    pub kind: RadioKind,
    pub interface: String,
    pub simulated_networks: Vec<SimulatedNetwork>,
}

#[derive(Clone, Debug)]
pub struct DisplayConfig {
    pub socket_path: Option<String>,
}

impl AppConfig {
    /// Load and validate the configuration from environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(|key| env::var(key).ok())
    }

    fn load_from(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ui = UiConfig::load(&var)?;
        let store = StoreConfig::load(&var)?;
        let radio = RadioConfig::load(&var)?;
        let display = DisplayConfig {
            socket_path: var("DISPLAY_SOCKET_PATH").filter(|path| !path.is_empty()),
        };

        let self_hosted = SelfHostedNetwork {
            name: var("AP_SSID").unwrap_or_else(|| DEFAULT_AP_SSID.to_string()),
            passphrase: var("AP_PASSPHRASE").unwrap_or_else(|| DEFAULT_AP_PASSPHRASE.to_string()),
        };
        ensure!(
            self_hosted.passphrase.len() >= 8,
            "failed to validate AP_PASSPHRASE: must have at least 8 characters"
        );

        let tick_interval = var("TICK_INTERVAL_MS")
            .unwrap_or_else(|| "1000".to_string())
            .parse::<u64>()
            .context("failed to parse TICK_INTERVAL_MS: invalid format")?;
        ensure!(tick_interval > 0, "failed to validate TICK_INTERVAL_MS: must not be 0");

        Ok(Self {
            ui,
            store,
            radio,
            display,
            self_hosted,
            tick_interval: Duration::from_millis(tick_interval),
        })
    }
}

impl UiConfig {
    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("UI_PORT")
            .unwrap_or_else(|| "80".to_string())
            .parse::<u16>()
            .context("failed to parse UI_PORT: invalid format")?;

        Ok(Self { port })
    }
}

impl StoreConfig {
    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = var("DATA_DIR").unwrap_or_else(|| "/data".to_string()).into();
        let namespace = var("STORE_NAMESPACE").unwrap_or_else(|| "bank_data".to_string());

        ensure!(
            !namespace.is_empty() && !namespace.contains(['/', '\\', '.']),
            "failed to validate STORE_NAMESPACE: {namespace:?} is not a plain name"
        );

        Ok(Self {
            data_dir,
            namespace,
        })
    }
}

impl RadioConfig {
    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kind = var("RADIO")
            .unwrap_or_else(|| "nmcli".to_string())
            .parse()?;
        let interface = var("WIFI_INTERFACE").unwrap_or_else(|| "wlan0".to_string());
        let simulated_networks = var("SIMULATED_NETWORKS")
            .map(|list| parse_simulated_networks(&list))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            kind,
            interface,
            simulated_networks,
        })
    }
}

/// `ssid:passphrase:rssi` entries separated by commas; the rssi defaults to -50.
fn parse_simulated_networks(list: &str) -> Result<Vec<SimulatedNetwork>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let ssid = parts.next().unwrap_or_default();
            let passphrase = parts.next().unwrap_or_default();
            let signal_strength = parts
                .next()
                .map(|rssi| rssi.parse::<i32>())
                .transpose()
                .context(format!("failed to parse SIMULATED_NETWORKS entry {entry:?}"))?
                .unwrap_or(-50);

            ensure!(
                !ssid.is_empty(),
                "failed to parse SIMULATED_NETWORKS entry {entry:?}: empty ssid"
            );

            Ok(SimulatedNetwork {
                ssid: ssid.to_string(),
                passphrase: passphrase.to_string(),
                signal_strength,
            })
        })
        .collect()
}
