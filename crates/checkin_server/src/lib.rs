//! HTTP surface for event check-in.
//!
//! # Routes
//! - `POST /register` `{name, email, roll}` registers an attendee and returns
//!   the token text to render as a QR code.
//! - `POST /attendance` `{id}` or `{qrData}` marks attendance once per token.
//! - `GET /records` lists registrations (`?attended=&limit=&offset=`).
//! - `GET /records/:id` returns one registration.
//! - `GET /stats` returns `{totalRegistered, totalAttended}`.
//! - `GET /health` reports liveness and version.
//!
//! # Running
//! ```sh
//! CHECKIN_PORT=5000 CHECKIN_DB_PATH=./registrations.sqlite3 checkin_server
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use checkin_core::{db::DbError, RegistrationStore};
use log::{error, info, warn};
use thiserror::Error;
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::Config;
use routes::{
    attendance_handler, health_handler, record_handler, records_handler, register_handler,
    stats_handler,
};
use state::AppState;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to open registration store: {0}")]
    Store(#[from] DbError),

    #[error("failed to bind or serve: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the router over an already opened store.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/register", post(register_handler))
        .route("/attendance", post(attendance_handler))
        .route("/records", get(records_handler))
        .route("/records/:id", get(record_handler))
        .route("/stats", get(stats_handler))
        .layer(cors)
        .with_state(state)
}

/// Opens the store, serves until Ctrl+C/SIGTERM, then closes the store.
pub async fn start_server(config: Config) -> Result<(), ServerError> {
    info!(
        "event=server_start module=server status=start db_path={}",
        config.db_path.display()
    );
    let store = RegistrationStore::open(&config.db_path)?;
    let state = AppState::new(store);

    let address = config.address();
    let listener = TcpListener::bind(&address).await?;
    info!("event=server_start module=server status=ok address={address}");

    axum::serve(listener, app(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=server status=draining");
    match Arc::try_unwrap(state).map(|state| Arc::try_unwrap(state.store)) {
        Ok(Ok(store)) => store.close()?,
        _ => warn!("event=store_close module=server status=skipped reason=store_still_shared"),
    }
    info!("event=server_stop module=server status=ok");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("event=signal_install module=server status=error signal=ctrl_c error={err}");
            std::future::pending::<()>().await;
        }
        info!("event=signal module=server status=ok signal=ctrl_c");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("event=signal module=server status=ok signal=sigterm");
            }
            Err(err) => {
                error!("event=signal_install module=server status=error signal=sigterm error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
