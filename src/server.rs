use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::error::IperfError;
use crate::iperf::{self, IperfRequest};
use crate::models::domain::Protocol;
use crate::session::NetworkSession;

/// How iperf runs are launched from the web endpoints.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub source_host: String,
    /// Seconds, passed to iperf `-t`.
    pub duration: u64,
    /// Seconds allowed on top of `duration` before a run is abandoned.
    pub timeout_grace: u64,
    pub log_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            source_host: "h1".to_string(),
            duration: 10,
            timeout_grace: 15,
            log_dir: PathBuf::from("."),
        }
    }
}

impl RunSettings {
    fn time_limit(&self) -> Duration {
        Duration::from_secs(self.duration + self.timeout_grace)
    }
}

pub struct AppState {
    pub session: Arc<NetworkSession>,
    pub settings: RunSettings,
}

/// Runs blocking node work off the async workers, bounded by `limit`.
async fn blocking<T, F>(limit: Duration, work: F) -> Result<T, IperfError>
where
    F: FnOnce() -> Result<T, IperfError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
        Ok(joined) => joined?,
        Err(_) => Err(IperfError::Timeout(limit.as_secs())),
    }
}

fn status_error(code: StatusCode, err: &IperfError) -> HttpResponse {
    HttpResponse::build(code).json(json!({ "status": "error", "message": err.to_string() }))
}

#[get("/")]
async fn index(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({ "hosts": state.session.topology().host_ips() }))
}

#[post("/start_iperf")]
async fn start_iperf(state: web::Data<AppState>, body: web::Json<IperfRequest>) -> impl Responder {
    let target = match body.validate() {
        Ok(target) => target,
        Err(e) => return status_error(StatusCode::BAD_REQUEST, &e),
    };

    let session = state.session.clone();
    let source = state.settings.source_host.clone();
    let duration = state.settings.duration;
    let run_target = target.clone();
    let result = blocking(state.settings.time_limit(), move || {
        iperf::run_client(&session, &source, &run_target, duration)
    })
    .await;

    match result {
        Ok(output) => HttpResponse::Ok().json(json!({
            "status": "success",
            "message": format!(
                "Iperf started to {} with rate {} and protocol {}.",
                target.ip_dest, target.src_rate, target.protocol
            ),
            "output": output,
        })),
        Err(e @ IperfError::ConnectFailed(_)) => status_error(StatusCode::OK, &e),
        Err(e) => {
            error!("iperf run failed: {e}");
            status_error(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

#[post("/stop_iperf")]
async fn stop_iperf(state: web::Data<AppState>) -> impl Responder {
    let session = state.session.clone();
    let source = state.settings.source_host.clone();
    let limit = Duration::from_secs(state.settings.timeout_grace);

    match blocking(limit, move || iperf::stop_clients(&session, &source)).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "success",
            "message": "Iperf stopped successfully.",
        })),
        Err(e) => {
            error!("stopping iperf failed: {e}");
            status_error(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct RestartQuery {
    protocol: Option<String>,
}

#[post("/restart_iperf")]
async fn restart_iperf(state: web::Data<AppState>, query: web::Query<RestartQuery>) -> impl Responder {
    let Some(protocol) = query.protocol.as_deref().and_then(|p| p.parse::<Protocol>().ok()) else {
        return HttpResponse::BadRequest().json(json!({ "error": "Invalid or missing protocol" }));
    };

    let session = state.session.clone();
    let log_dir = state.settings.log_dir.clone();
    let limit = Duration::from_secs(state.settings.timeout_grace);

    match blocking(limit, move || iperf::restart_servers(&session, protocol, &log_dir)).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": format!("iperf restarted in {protocol} mode for all hosts"),
        })),
        Err(e) => {
            error!("restarting iperf servers failed: {e}");
            HttpResponse::InternalServerError()
                .json(json!({ "error": format!("Error restarting iperf: {e}") }))
        }
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(start_iperf)
        .service(stop_iperf)
        .service(restart_iperf);
}
