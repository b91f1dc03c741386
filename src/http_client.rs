use crate::error::StationError;
use actix_web::{
    HttpResponse,
    http::header::{CONTENT_DISPOSITION, ContentType, WWW_AUTHENTICATE},
};
use anyhow::{Context, Result, ensure};
use log::{error, warn};
use reqwest::{Client, Response};
use serde::Serialize;
use std::path::Path;

pub const AUTH_REALM: &str = "QR Station";

/// Create a Unix socket client for local service communication
///
/// Accepts either a raw path or a URI with `unix://` scheme.
///
/// # Examples
/// ```no_run
/// use qr_station::http_client::unix_socket_client;
///
/// let client = unix_socket_client("unix:///run/display/api.sock")
///     .expect("failed to create client");
/// ```
pub fn unix_socket_client(socket_path: &str) -> Result<Client> {
    let socket_path = Path::new(socket_path.strip_prefix("unix://").unwrap_or(socket_path));

    ensure!(
        socket_path
            .try_exists()
            .context("failed to check if socket path exists")?,
        "failed since socket path does not exist: {socket_path:?}"
    );

    Client::builder()
        .unix_socket(socket_path)
        .build()
        .context("failed to create Unix socket HTTP client")
}

/// Handle HTTP response by checking status and extracting body
pub async fn handle_http_response(res: Response, context_msg: &str) -> Result<String> {
    let status = res.status();
    let body = res.text().await.context("failed to read response body")?;

    ensure!(
        status.is_success(),
        "{context_msg} failed with status {status} and body: {body}"
    );

    Ok(body)
}

/// Trait for converting service results into HTTP responses
pub trait ServiceResultResponse {
    fn into_response(self) -> HttpResponse;
}

impl ServiceResultResponse for () {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().content_type(ContentType::plaintext()).body("OK")
    }
}

impl ServiceResultResponse for String {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok()
            .content_type(ContentType::plaintext())
            .body(self)
    }
}

/// Serialized as `application/json`.
pub struct Json<T>(pub T);

impl<T: Serialize> ServiceResultResponse for Json<T> {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().json(self.0)
    }
}

/// JSON offered as a download.
pub struct Attachment<T> {
    pub filename: &'static str,
    pub body: T,
}

impl<T: Serialize> ServiceResultResponse for Attachment<T> {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok()
            .insert_header((
                CONTENT_DISPOSITION,
                format!("attachment; filename={}", self.filename),
            ))
            .json(self.body)
    }
}

pub struct Html(pub String);

impl ServiceResultResponse for Html {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().content_type(ContentType::html()).body(self.0)
    }
}

/// Response asking the client to present Basic credentials.
pub fn challenge() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((WWW_AUTHENTICATE, format!("Basic realm=\"{AUTH_REALM}\"")))
        .finish()
}

/// Turn an operation result into a response
///
/// Every [`StationError`] is recovered here; none of them terminates the process.
pub fn handle_service_result<T>(result: Result<T, StationError>, operation: &str) -> HttpResponse
where
    T: ServiceResultResponse,
{
    match result {
        Ok(data) => data.into_response(),
        Err(StationError::Unauthorized) => {
            warn!("{operation} rejected: unauthorized");
            challenge()
        }
        Err(StationError::InvalidArgument(msg)) => {
            warn!("{operation} failed: invalid argument: {msg}");
            HttpResponse::BadRequest()
                .content_type(ContentType::plaintext())
                .body(msg)
        }
        Err(e @ StationError::OutOfRange { .. }) => {
            warn!("{operation} failed: {e}");
            HttpResponse::NotFound().body(e.to_string())
        }
        Err(e @ StationError::JoinTimeout { .. }) => {
            warn!("{operation} failed: {e}");
            HttpResponse::GatewayTimeout().body("Connect failed")
        }
        Err(e) => {
            error!("{operation} failed: {e}");
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}
