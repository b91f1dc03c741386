//! Remote messaging server reachability

use crate::services::settings::MessagingSettings;
use log::debug;
use std::time::Duration;
use tokio::{net::TcpStream, time::timeout};
use trait_variant::make;

pub const DEFAULT_MESSAGING_PORT: u16 = 1883;

#[make(Send)]
pub trait MessagingProbe {
    async fn is_connected(&self, settings: &MessagingSettings) -> bool;
}

/// Considers the link up when a TCP connection to the server succeeds.
#[derive(Clone, Debug)]
pub struct TcpMessagingProbe {
    connect_timeout: Duration,
}

impl Default for TcpMessagingProbe {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(500),
        }
    }
}

/// `host` or `host:port`; bare hosts get the default messaging port.
fn server_address(server: &str) -> String {
    match server.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => server.to_string(),
        _ => format!("{server}:{DEFAULT_MESSAGING_PORT}"),
    }
}

impl MessagingProbe for TcpMessagingProbe {
    async fn is_connected(&self, settings: &MessagingSettings) -> bool {
        if !settings.enabled || settings.server.is_empty() {
            return false;
        }

        let address = server_address(&settings.server);
        match timeout(self.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("messaging server {address} unreachable: {e}");
                false
            }
            Err(_) => {
                debug!("messaging server {address} timed out");
                false
            }
        }
    }
}
