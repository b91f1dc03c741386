use actix_server::ServerHandle;
use actix_web::{App, HttpServer, web::Data};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info, warn};
use qr_station::{
    api::{Api, cors},
    config::{AppConfig, DisplayConfig, RadioConfig, RadioKind},
    display_client::{LogDisplayClient, PlatformDisplay, SocketDisplayClient},
    messaging::TcpMessagingProbe,
    radio::{NmcliRadio, PlatformRadio, Radio, SimulatedRadio},
    station::Station,
    store::{ConfigStore, FileBackend},
};
use std::{io::Write, sync::Arc, time::Duration};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::broadcast,
    time::{MissedTickBehavior, interval},
};

type UiApi = Api<PlatformRadio, PlatformDisplay, TcpMessagingProbe>;

enum ShutdownReason {
    Restart,
    Shutdown,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Restart => write!(f, "restarting station"),
            ShutdownReason::Shutdown => write!(f, "shutting down"),
        }
    }
}

/// Long-lived collaborators that survive a station restart.
struct Platform {
    config: AppConfig,
    store: ConfigStore,
    radio: PlatformRadio,
    display: PlatformDisplay,
    restart_tx: broadcast::Sender<()>,
}

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::load().context("failed to load configuration")?;

    let backend = FileBackend::new(&config.store.data_dir).context("failed to open store")?;
    let store = ConfigStore::new(Arc::new(backend), config.store.namespace.clone());
    let radio = create_radio(&config.radio);
    let display = create_display(&config.display);

    let (restart_tx, mut restart_rx) = broadcast::channel(1);
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let platform = Platform {
        config,
        store,
        radio,
        display,
        restart_tx,
    };

    while let ShutdownReason::Restart =
        run_until_shutdown(&platform, &mut restart_rx, &mut sigterm).await?
    {}

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

fn create_radio(config: &RadioConfig) -> PlatformRadio {
    match config.kind {
        RadioKind::Nmcli => PlatformRadio::Nmcli(NmcliRadio::new(&config.interface)),
        RadioKind::Simulated => {
            let radio = config
                .simulated_networks
                .iter()
                .fold(SimulatedRadio::default(), |radio, n| {
                    radio.with_network(&n.ssid, &n.passphrase, n.signal_strength)
                });
            PlatformRadio::Simulated(radio)
        }
    }
}

fn create_display(config: &DisplayConfig) -> PlatformDisplay {
    let Some(socket_path) = &config.socket_path else {
        info!("no display socket configured, display signals are logged only");
        return PlatformDisplay::Log(LogDisplayClient);
    };

    match SocketDisplayClient::new(socket_path) {
        Ok(client) => PlatformDisplay::Socket(client),
        Err(e) => {
            warn!("display unavailable, falling back to log display: {e:#}");
            PlatformDisplay::Log(LogDisplayClient)
        }
    }
}

async fn run_until_shutdown(
    platform: &Platform,
    restart_rx: &mut broadcast::Receiver<()>,
    sigterm: &mut tokio::signal::unix::Signal,
) -> Result<ShutdownReason> {
    info!("starting station");

    // a previous run may have left the fallback network up
    if let Err(e) = platform.radio.stop_self_hosted_network().await {
        debug!("no self-hosted network to stop: {e:#}");
    }

    let station = Station::load(
        platform.store.clone(),
        platform.radio.clone(),
        platform.display.clone(),
        TcpMessagingProbe::default(),
        platform.config.self_hosted.clone(),
        platform.restart_tx.clone(),
    );

    let api = UiApi::new(station);
    let ticker = actix_web::rt::spawn(tick(api.clone(), platform.config.tick_interval));
    let (server_handle, server_task) = run_server(api.clone(), platform.config.ui.port)?;

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
            ShutdownReason::Shutdown
        },
        _ = sigterm.recv() => {
            debug!("SIGTERM received");
            ShutdownReason::Shutdown
        },
        _ = restart_rx.recv() => {
            debug!("station restart requested");
            ShutdownReason::Restart
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
            ShutdownReason::Shutdown
        },
    };

    info!("{reason}");

    ticker.abort();
    server_handle.stop(true).await;

    if matches!(reason, ShutdownReason::Shutdown) {
        if let Err(e) = api.station.lock().await.shutdown().await {
            warn!("failed to stop self-hosted network: {e}");
        }
        info!("shutdown complete");
    }

    Ok(reason)
}

/// Drive the network state machine.
async fn tick(api: UiApi, period: Duration) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut portal_reachable = None;

    loop {
        ticks.tick().await;

        let result = api.station.lock().await.tick().await;
        match result {
            Ok(reachable) if portal_reachable != Some(reachable) => {
                info!(
                    "config portal {}",
                    if reachable { "reachable" } else { "unreachable" }
                );
                portal_reachable = Some(reachable);
            }
            Ok(_) => {}
            Err(e) => warn!("network tick failed: {e}"),
        }
    }
}

fn run_server(
    api: UiApi,
    port: u16,
) -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    // a single worker keeps request dispatch strictly sequential
    let server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .app_data(Data::new(api.clone()))
            .configure(UiApi::configure)
    })
    .workers(1)
    .bind(("0.0.0.0", port))
    .context("failed to bind server")?
    .disable_signals()
    .run();

    Ok((server.handle(), tokio::spawn(server)))
}
