//! Display subsystem boundary
//!
//! Notifications are fire-and-forget from the point of view of the core: the
//! caller logs failures and moves on.

use crate::http_client::{handle_http_response, unix_socket_client};
use anyhow::{Context, Result};
use log::info;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use trait_variant::make;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Render the current dynamic QR session instead of the static rotation.
    DynamicQr,
}

#[derive(Debug, Serialize)]
struct SetMode {
    mode: DisplayMode,
}

#[derive(Debug, Deserialize)]
struct Visibility {
    visible: bool,
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait DisplayClient {
    async fn is_content_visible(&self) -> Result<bool>;
    async fn wake(&self) -> Result<()>;
    async fn set_mode(&self, mode: DisplayMode) -> Result<()>;
}

/// Display service reachable over HTTP on a unix socket.
#[derive(Clone)]
pub struct SocketDisplayClient {
    client: Client,
}

impl SocketDisplayClient {
    const VISIBLE_ENDPOINT: &str = "/display/v1/visible";
    const WAKE_ENDPOINT: &str = "/display/v1/wake";
    const MODE_ENDPOINT: &str = "/display/v1/mode";

    pub fn new(socket_path: &str) -> Result<Self> {
        let client = unix_socket_client(socket_path)?;
        Ok(Self { client })
    }

    fn build_url(&self, path: &str) -> String {
        let normalized_path = path.trim_start_matches('/');
        format!("http://localhost/{normalized_path}")
    }

    async fn get(&self, path: &str) -> Result<String> {
        let url = self.build_url(path);
        info!("GET {url}");

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .context(format!("failed to send GET request to {url}"))?;

        handle_http_response(res, &format!("GET {url}")).await
    }

    async fn post_json(&self, path: &str, body: Option<impl Debug + Serialize>) -> Result<String> {
        let url = self.build_url(path);
        info!("POST {url} with body: {body:?}");

        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let res = request
            .send()
            .await
            .context(format!("failed to send POST request to {url}"))?;

        handle_http_response(res, &format!("POST {url}")).await
    }
}

impl DisplayClient for SocketDisplayClient {
    async fn is_content_visible(&self) -> Result<bool> {
        let body = self.get(Self::VISIBLE_ENDPOINT).await?;
        let visibility: Visibility =
            serde_json::from_str(&body).context("failed to parse display visibility")?;
        Ok(visibility.visible)
    }

    async fn wake(&self) -> Result<()> {
        self.post_json(Self::WAKE_ENDPOINT, None::<()>).await?;
        Ok(())
    }

    async fn set_mode(&self, mode: DisplayMode) -> Result<()> {
        self.post_json(Self::MODE_ENDPOINT, Some(SetMode { mode }))
            .await?;
        Ok(())
    }
}

/// Used when no display service is configured; reports content as visible.
#[derive(Clone, Default)]
pub struct LogDisplayClient;

impl DisplayClient for LogDisplayClient {
    async fn is_content_visible(&self) -> Result<bool> {
        Ok(true)
    }

    async fn wake(&self) -> Result<()> {
        info!("display: wake");
        Ok(())
    }

    async fn set_mode(&self, mode: DisplayMode) -> Result<()> {
        info!("display: set mode {mode:?}");
        Ok(())
    }
}

/// Display selected at startup.
#[derive(Clone)]
pub enum PlatformDisplay {
    Socket(SocketDisplayClient),
    Log(LogDisplayClient),
}

impl DisplayClient for PlatformDisplay {
    async fn is_content_visible(&self) -> Result<bool> {
        match self {
            Self::Socket(display) => display.is_content_visible().await,
            Self::Log(display) => display.is_content_visible().await,
        }
    }

    async fn wake(&self) -> Result<()> {
        match self {
            Self::Socket(display) => display.wake().await,
            Self::Log(display) => display.wake().await,
        }
    }

    async fn set_mode(&self, mode: DisplayMode) -> Result<()> {
        match self {
            Self::Socket(display) => display.set_mode(mode).await,
            Self::Log(display) => display.set_mode(mode).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod build_url {
        use super::*;

        fn create_test_client() -> SocketDisplayClient {
            SocketDisplayClient {
                client: reqwest::Client::new(),
            }
        }

        #[test]
        fn normalizes_path_with_leading_slash() {
            let client = create_test_client();
            assert_eq!(
                client.build_url(SocketDisplayClient::WAKE_ENDPOINT),
                "http://localhost/display/v1/wake"
            );
        }

        #[test]
        fn normalizes_path_with_multiple_leading_slashes() {
            let client = create_test_client();
            assert_eq!(
                client.build_url("///display/v1/mode"),
                "http://localhost/display/v1/mode"
            );
        }
    }

    #[test]
    fn set_mode_body_is_snake_case() {
        let body = serde_json::to_string(&SetMode {
            mode: DisplayMode::DynamicQr,
        })
        .unwrap();
        assert_eq!(body, r#"{"mode":"dynamic_qr"}"#);
    }

    #[test]
    fn socket_client_requires_existing_socket() {
        assert!(SocketDisplayClient::new("/tmp/nonexistent-display.sock").is_err());
    }
}
