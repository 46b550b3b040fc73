//! Axum API gateway for the Vetta assessment engine. Config-driven via
//! `CoreConfig::from_env`; all semantics live in vetta-core.

mod envelope;
mod handlers;
mod state;

use axum::routing::{get, post, put};
use axum::Router;
use state::AppState;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vetta_core::CoreConfig;

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Recruiter JD surface
        .route("/api/jd/upload", post(handlers::jd::upload))
        .route("/api/jd", get(handlers::jd::list))
        .route("/api/jd/:id", get(handlers::jd::get).delete(handlers::jd::delete))
        .route("/api/jd/:id/parse", post(handlers::jd::parse))
        .route("/api/jd/:id/config", put(handlers::jd::update_config))
        .route("/api/jd/:id/skills", put(handlers::jd::update_skills))
        .route("/api/jd/:id/rubrics", put(handlers::jd::update_rubrics))
        .route("/api/jd/:id/lock", post(handlers::jd::set_locked))
        .route("/api/jd/:id/generate-link", post(handlers::jd::generate_link))
        // Candidate onboarding
        .route("/api/assess/:link/info", get(handlers::candidate::assessment_info))
        .route("/api/assess/:link/register", post(handlers::candidate::register))
        .route("/api/candidate/:id/verify-email", post(handlers::candidate::verify_email))
        .route("/api/candidate/:id/photo", post(handlers::candidate::capture_photo))
        .route("/api/candidate/:id/consent", post(handlers::candidate::accept_consent))
        .route("/api/candidate/:id/resume", post(handlers::candidate::upload_resume))
        .route("/api/candidate/:id/status", get(handlers::candidate::status))
        .route("/api/candidate/:id/start", post(handlers::candidate::start))
        // Timed session
        .route("/api/session", get(handlers::session::get_session))
        .route("/api/session/questions/:section", get(handlers::session::get_questions))
        .route("/api/session/answer", post(handlers::session::save_answer))
        .route("/api/session/submit-section", post(handlers::session::submit_section))
        .route("/api/session/submit", post(handlers::session::submit_all))
        .route("/api/session/heartbeat", get(handlers::session::heartbeat))
        .route("/api/session/followups", get(handlers::session::list_followups))
        .route("/api/session/proctor-event", post(handlers::session::log_proctor_event))
        // Code execution
        .route("/api/code/run", post(handlers::code::run))
        .route("/api/code/submit", post(handlers::code::submit))
        .route("/api/code/languages", get(handlers::code::list_languages))
        // Admin
        .route("/api/admin/jd/:id/candidates", get(handlers::admin::list_candidates))
        .route("/api/admin/candidate/:id", get(handlers::admin::get_candidate))
        .route("/api/admin/candidate/:id/decide", post(handlers::admin::decide))
        .route("/api/admin/proctoring/:id/review", post(handlers::admin::review_proctoring))
        .route("/api/admin/jd/:id/analytics", get(handlers::admin::analytics))
        .route("/api/admin/jd/:id/export", get(handlers::admin::export_candidates))
        .route("/api/admin/audit", get(handlers::admin::audit_log))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env();
    let state = match AppState::build(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize");
            std::process::exit(1);
        }
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "vetta gateway listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!(error = %e, "server exited");
        std::process::exit(1);
    }
}
