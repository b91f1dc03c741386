use crate::{
    display_client::DisplayClient,
    error::StationError,
    http_client::{Attachment, Html, Json, handle_service_result},
    messaging::MessagingProbe,
    radio::Radio,
    render::render_config_page,
    services::{auth::PresentedCredentials, dynamic_qr::QrRequest},
    station::{ConnectRequest, DeleteTarget, SaveSettings, Station},
};
use actix_cors::Cors;
use actix_web::{Responder, http::Method, web};
use actix_web_httpauth::extractors::basic::BasicAuth;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const SAVED_PAGE: &str = "<html><meta charset='utf-8'><meta name='viewport' content='width=device-width,initial-scale=1'>\
<body style='text-align:center;padding-top:100px;font-family:sans-serif;'>\
<h1 style='color:green;'>Saved</h1><a href='/'>Back</a></body></html>";

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    i: Option<String>,
    s: Option<String>,
}

/// API clients run in other origins (e.g. a browser extension on a shop page).
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_header()
        .allowed_methods(vec![Method::GET, Method::POST])
        .send_wildcard()
        .max_age(3600)
}

fn presented(auth: Option<&BasicAuth>) -> Option<PresentedCredentials<'_>> {
    auth.map(|auth| PresentedCredentials {
        user: auth.user_id(),
        pass: auth.password().unwrap_or_default(),
    })
}

/// Lock the station, pass the auth gate and run `$body` with the
/// authorization handle bound to `$authorized`.
macro_rules! gated {
    ($api:expr, $auth:expr, $operation:literal, |$authorized:ident| $body:expr) => {{
        let mut station = $api.station.lock().await;
        let result = match station.authorize(presented($auth.as_ref())) {
            Ok($authorized) => $body,
            Err(e) => Err(e),
        };
        handle_service_result(result, $operation)
    }};
}

pub struct Api<R, D, M> {
    pub station: Arc<Mutex<Station<R, D, M>>>,
}

impl<R, D, M> Clone for Api<R, D, M> {
    fn clone(&self) -> Self {
        Self {
            station: Arc::clone(&self.station),
        }
    }
}

impl<R, D, M> Api<R, D, M>
where
    R: Radio + 'static,
    D: DisplayClient + 'static,
    M: MessagingProbe + 'static,
{
    pub fn new(station: Station<R, D, M>) -> Self {
        Api {
            station: Arc::new(Mutex::new(station)),
        }
    }

    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/", web::get().to(Self::index))
            .route("/scan", web::get().to(Self::scan))
            .route("/connect_wifi", web::get().to(Self::connect_wifi))
            .route("/list_wifi", web::get().to(Self::list_wifi))
            .route("/del_wifi", web::get().to(Self::del_wifi))
            .route("/save", web::post().to(Self::save))
            .route("/reset", web::get().to(Self::reset))
            .route("/reboot", web::get().to(Self::reboot))
            .route("/export", web::get().to(Self::export))
            .route("/api/qr", web::get().to(Self::activate_qr))
            .route("/api/info", web::get().to(Self::info))
            .route("/api/accounts", web::get().to(Self::accounts))
            .route("/api/mqtt_status", web::get().to(Self::mqtt_status))
            .route("/api/session", web::get().to(Self::session));
    }

    pub async fn index(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("index() called");
        gated!(api, auth, "index", |authorized| {
            let view = authorized.config_view().await;
            Ok::<_, StationError>(Html(render_config_page(&view)))
        })
    }

    pub async fn scan(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("scan() called");
        gated!(api, auth, "scan", |authorized| authorized
            .scan()
            .await
            .map(Json))
    }

    pub async fn connect_wifi(
        auth: Option<BasicAuth>,
        query: web::Query<ConnectRequest>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("connect_wifi() called: {}", query.s);
        gated!(api, auth, "connect_wifi", |authorized| authorized
            .connect(query.into_inner())
            .await)
    }

    pub async fn list_wifi(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("list_wifi() called");
        gated!(api, auth, "list_wifi", |authorized| authorized
            .list_known_networks()
            .map(Json))
    }

    pub async fn del_wifi(
        auth: Option<BasicAuth>,
        query: web::Query<DeleteQuery>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("del_wifi() called: {query:?}");
        gated!(api, auth, "del_wifi", |authorized| {
            DeleteTarget::from_query(query.i.as_deref(), query.s.as_deref())
                .and_then(|target| authorized.delete_known_network(target))
        })
    }

    pub async fn save(
        auth: Option<BasicAuth>,
        form: web::Form<SaveSettings>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("save() called");
        gated!(api, auth, "save", |authorized| authorized
            .save_settings(form.into_inner())
            .map(|()| Html(SAVED_PAGE.to_string())))
    }

    pub async fn reset(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("reset() called");
        gated!(api, auth, "reset", |authorized| authorized
            .factory_reset()
            .map(|()| "Resetting...".to_string()))
    }

    pub async fn reboot(api: web::Data<Self>) -> impl Responder {
        debug!("reboot() called");
        let result = api
            .station
            .lock()
            .await
            .reboot()
            .map(|()| "Rebooting...".to_string());
        handle_service_result(result, "reboot")
    }

    pub async fn export(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("export() called");
        gated!(api, auth, "export", |authorized| Ok::<_, StationError>(
            Attachment {
                filename: "config.json",
                body: authorized.export_accounts(),
            }
        ))
    }

    pub async fn activate_qr(
        auth: Option<BasicAuth>,
        query: web::Query<QrRequest>,
        api: web::Data<Self>,
    ) -> impl Responder {
        debug!("activate_qr() called");
        gated!(api, auth, "activate_qr", |authorized| authorized
            .activate_qr(query.into_inner())
            .await)
    }

    pub async fn info(api: web::Data<Self>) -> impl Responder {
        debug!("info() called");
        let info = api.station.lock().await.info();
        handle_service_result(Ok(Json(info)), "info")
    }

    pub async fn accounts(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("accounts() called");
        gated!(api, auth, "accounts", |authorized| Ok::<_, StationError>(
            Json(authorized.list_accounts())
        ))
    }

    pub async fn mqtt_status(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("mqtt_status() called");
        gated!(api, auth, "mqtt_status", |authorized| Ok::<_, StationError>(
            Json(authorized.messaging_status().await)
        ))
    }

    pub async fn session(auth: Option<BasicAuth>, api: web::Data<Self>) -> impl Responder {
        debug!("session() called");
        gated!(api, auth, "session", |authorized| Ok::<_, StationError>(
            Json(authorized.session_snapshot())
        ))
    }
}
