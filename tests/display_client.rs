use qr_station::display_client::{DisplayClient, DisplayMode, SocketDisplayClient};
use qr_station::http_client::unix_socket_client;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::oneshot;

type Requests = Arc<Mutex<Vec<String>>>;

// Minimal display service: records "METHOD /path body" per request.
async fn start_mock_display_service(
    socket_path: PathBuf,
    visible: bool,
    requests: Requests,
    ready_tx: oneshot::Sender<()>,
) -> std::io::Result<()> {
    let listener = UnixListener::bind(&socket_path)?;

    let _ = ready_tx.send(());

    loop {
        let (mut stream, _) = listener.accept().await?;
        let requests = requests.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(&mut stream);
            let mut request_line = String::new();
            let mut content_length = 0;

            if reader.read_line(&mut request_line).await.is_err() {
                return;
            }

            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.is_err() {
                    return;
                }

                if line.trim().is_empty() {
                    break;
                }

                match line.split_once(':') {
                    Some((name, value)) if name.eq_ignore_ascii_case("content-length") => {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                    _ => {}
                }
            }

            let mut body = vec![0; content_length];
            if reader.read_exact(&mut body).await.is_err() {
                return;
            }

            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or_default().to_string();
            let path = parts.next().unwrap_or_default().to_string();
            requests.lock().unwrap().push(
                format!("{method} {path} {}", String::from_utf8_lossy(&body))
                    .trim_end()
                    .to_string(),
            );

            let response_body = if path == "/display/v1/visible" {
                format!(r#"{{"visible":{visible}}}"#)
            } else {
                "{}".to_string()
            };
            let http_response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                response_body.len(),
                response_body
            );

            let _ = stream.write_all(http_response.as_bytes()).await;
        });
    }
}

async fn spawn_display_service(
    temp_dir: &TempDir,
    visible: bool,
) -> (PathBuf, Requests, tokio::task::JoinHandle<()>) {
    let socket_path = temp_dir.path().join("display.sock");
    let socket_path_clone = socket_path.clone();
    let requests = Requests::default();
    let requests_clone = requests.clone();

    let (ready_tx, ready_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        let _ =
            start_mock_display_service(socket_path_clone, visible, requests_clone, ready_tx).await;
    });

    ready_rx.await.expect("server failed to start");

    (socket_path, requests, server_handle)
}

#[tokio::test]
async fn unix_socket_client_reaches_service() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let (socket_path, requests, server_handle) = spawn_display_service(&temp_dir, true).await;

    let client = unix_socket_client(socket_path.to_str().expect("invalid socket path"))
        .expect("failed to create unix socket client");

    for i in 0..3 {
        let response = client
            .get(format!("http://localhost/test/{i}"))
            .send()
            .await
            .expect("failed to send request");

        assert!(response.status().is_success());
    }

    assert_eq!(requests.lock().unwrap().len(), 3);

    server_handle.abort();
}

#[tokio::test]
async fn display_client_reads_visibility() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let (socket_path, _requests, server_handle) = spawn_display_service(&temp_dir, false).await;

    let display = SocketDisplayClient::new(socket_path.to_str().expect("invalid socket path"))
        .expect("failed to create display client");

    assert!(!display.is_content_visible().await.expect("should query"));

    server_handle.abort();
}

#[tokio::test]
async fn display_client_wakes_and_switches_mode() {
    let temp_dir = TempDir::new().expect("failed to create temp directory");
    let (socket_path, requests, server_handle) = spawn_display_service(&temp_dir, false).await;

    let display = SocketDisplayClient::new(socket_path.to_str().expect("invalid socket path"))
        .expect("failed to create display client");

    display.wake().await.expect("should wake");
    display
        .set_mode(DisplayMode::DynamicQr)
        .await
        .expect("should set mode");

    assert_eq!(
        *requests.lock().unwrap(),
        vec![
            "POST /display/v1/wake".to_string(),
            r#"POST /display/v1/mode {"mode":"dynamic_qr"}"#.to_string(),
        ]
    );

    server_handle.abort();
}
