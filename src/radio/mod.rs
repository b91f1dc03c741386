//! Wireless radio platform boundary

mod nmcli;
mod simulated;

pub use nmcli::NmcliRadio;
pub use simulated::SimulatedRadio;

use anyhow::Result;
use serde::Serialize;
use trait_variant::make;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Disconnected,
    Connected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VisibleNetwork {
    #[serde(rename = "s")]
    pub ssid: String,
    /// Received signal strength in dBm.
    #[serde(rename = "r")]
    pub signal_strength: i32,
}

#[make(Send)]
pub trait Radio {
    /// Issue a station join request. Completion is observed through [`Radio::status`].
    async fn join_network(&self, ssid: &str, passphrase: &str) -> Result<()>;
    async fn status(&self) -> Result<LinkStatus>;
    async fn scan(&self) -> Result<Vec<VisibleNetwork>>;
    async fn start_self_hosted_network(&self, name: &str, passphrase: &str) -> Result<()>;
    async fn stop_self_hosted_network(&self) -> Result<()>;
    async fn current_ssid(&self) -> Result<Option<String>>;
}

/// Radio selected at startup.
#[derive(Clone)]
pub enum PlatformRadio {
    Nmcli(NmcliRadio),
    Simulated(SimulatedRadio),
}

impl Radio for PlatformRadio {
    async fn join_network(&self, ssid: &str, passphrase: &str) -> Result<()> {
        match self {
            Self::Nmcli(radio) => radio.join_network(ssid, passphrase).await,
            Self::Simulated(radio) => radio.join_network(ssid, passphrase).await,
        }
    }

    async fn status(&self) -> Result<LinkStatus> {
        match self {
            Self::Nmcli(radio) => radio.status().await,
            Self::Simulated(radio) => radio.status().await,
        }
    }

    async fn scan(&self) -> Result<Vec<VisibleNetwork>> {
        match self {
            Self::Nmcli(radio) => radio.scan().await,
            Self::Simulated(radio) => radio.scan().await,
        }
    }

    async fn start_self_hosted_network(&self, name: &str, passphrase: &str) -> Result<()> {
        match self {
            Self::Nmcli(radio) => radio.start_self_hosted_network(name, passphrase).await,
            Self::Simulated(radio) => radio.start_self_hosted_network(name, passphrase).await,
        }
    }

    async fn stop_self_hosted_network(&self) -> Result<()> {
        match self {
            Self::Nmcli(radio) => radio.stop_self_hosted_network().await,
            Self::Simulated(radio) => radio.stop_self_hosted_network().await,
        }
    }

    async fn current_ssid(&self) -> Result<Option<String>> {
        match self {
            Self::Nmcli(radio) => radio.current_ssid().await,
            Self::Simulated(radio) => radio.current_ssid().await,
        }
    }
}
