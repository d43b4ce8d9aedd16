use std::sync::Arc;

use checkin_core::{RegistrationError, RegistrationStore};
use tokio::task::spawn_blocking;

use super::error::ApiError;

pub struct AppState {
    pub store: Arc<RegistrationStore>,
}

impl AppState {
    pub fn new(store: RegistrationStore) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(store),
        })
    }

    /// Runs a store call on the blocking pool; SQLite I/O must not stall
    /// the async workers.
    pub async fn run<T, F>(&self, action: F) -> Result<T, ApiError>
    where
        F: FnOnce(&RegistrationStore) -> Result<T, RegistrationError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        spawn_blocking(move || action(&store))
            .await
            .map_err(|err| ApiError::Internal(format!("store task failed: {err}")))?
            .map_err(ApiError::from)
    }
}
