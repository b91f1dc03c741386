//! Dynamic QR session
//!
//! A single slot: the last activation wins. Nothing here clears the session;
//! when it stops being shown is up to the display.

use crate::{
    display_client::{DisplayClient, DisplayMode},
    error::{StationError, StationResult},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Activation parameters as received from a client.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QrRequest {
    pub bin: String,
    pub acc: String,
    pub amt: String,
    pub on: String,
    pub desc: String,
}

#[derive(Clone, Debug, Default)]
pub struct DynamicQrSession {
    pub bank_identifier: String,
    pub account_number: String,
    /// Empty means the payer chooses the amount.
    pub amount: String,
    pub owner_name: String,
    pub description: String,
    pub active: bool,
    pub start_time: Option<Instant>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub bin: String,
    pub acc: String,
    pub amount: String,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub elapsed_ms: Option<u64>,
}

pub struct DynamicQr<D> {
    display: D,
    session: DynamicQrSession,
}

impl<D: DisplayClient> DynamicQr<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            session: DynamicQrSession::default(),
        }
    }

    pub fn session(&self) -> &DynamicQrSession {
        &self.session
    }

    pub async fn activate(&mut self, request: QrRequest) -> StationResult<()> {
        if request.bin.is_empty() || request.acc.is_empty() {
            return Err(StationError::invalid_argument("Missing bin or acc"));
        }

        self.session = DynamicQrSession {
            bank_identifier: request.bin,
            account_number: request.acc,
            amount: request.amt,
            owner_name: request.on,
            description: request.desc,
            active: true,
            start_time: Some(Instant::now()),
        };

        info!(
            "dynamic qr activated for {} (amount: {})",
            self.session.account_number,
            if self.session.amount.is_empty() {
                "open"
            } else {
                &self.session.amount
            }
        );

        self.signal_display().await;
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = &self.session;
        SessionSnapshot {
            bin: session.bank_identifier.clone(),
            acc: session.account_number.clone(),
            amount: session.amount.clone(),
            name: session.owner_name.clone(),
            description: session.description.clone(),
            active: session.active,
            elapsed_ms: session
                .start_time
                .map(|started| u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
        }
    }

    async fn signal_display(&self) {
        match self.display.is_content_visible().await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.display.wake().await {
                    warn!("failed to wake display: {e:#}");
                }
            }
            Err(e) => warn!("failed to query display visibility: {e:#}"),
        }

        if let Err(e) = self.display.set_mode(DisplayMode::DynamicQr).await {
            warn!("failed to switch display to dynamic qr: {e:#}");
        }
    }
}
