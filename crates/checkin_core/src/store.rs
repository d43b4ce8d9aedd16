//! Owned registration store with an explicit open/close lifecycle.
//!
//! # Responsibility
//! - Own one migrated SQLite connection for the lifetime of a process.
//! - Serialize in-process access to it and expose the use-case API.
//!
//! # Invariants
//! - The schema is checked once at open; calls then run on a repository
//!   over the owned connection. No ambient/global connection exists.
//! - A poisoned lock surfaces as `StoreUnavailable`, never as a panic.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::model::registration::{AttendanceCounts, NewRegistration, Registration, RegistrationId};
use crate::repo::registration_repo::{
    RegistrationListQuery, RepoError, SqliteRegistrationRepository,
};
use crate::service::registration_service::{RegistrationError, RegistrationService, ServiceResult};
use crate::token::ScannedToken;
use log::info;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Registration store shared by request handlers.
pub struct RegistrationStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl RegistrationStore {
    /// Opens (creating if needed) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let conn = open_db(path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a store that lives only as long as this value.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = open_db_in_memory()?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file backing this store, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn register(&self, input: &NewRegistration) -> ServiceResult<Registration> {
        self.with_service(|service| service.register(input))
    }

    pub fn list(&self, query: &RegistrationListQuery) -> ServiceResult<Vec<Registration>> {
        self.with_service(|service| service.list(query))
    }

    pub fn find_by_id(&self, id: RegistrationId) -> ServiceResult<Option<Registration>> {
        self.with_service(|service| service.find_by_id(id))
    }

    pub fn counts(&self) -> ServiceResult<AttendanceCounts> {
        self.with_service(|service| service.counts())
    }

    pub fn mark_attendance(&self, id: RegistrationId) -> ServiceResult<Registration> {
        self.with_service(|service| service.mark_attendance(id))
    }

    pub fn mark_scanned(&self, token: &ScannedToken) -> ServiceResult<Registration> {
        self.with_service(|service| service.mark_scanned(token))
    }

    /// Closes the underlying connection, reporting any flush failure.
    pub fn close(self) -> DbResult<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, err)| DbError::Sqlite(err))?;
        info!(
            "event=store_close module=store status=ok mode={}",
            if self.path.is_some() { "file" } else { "memory" }
        );
        Ok(())
    }

    fn with_service<T>(
        &self,
        action: impl FnOnce(&RegistrationService<SqliteRegistrationRepository<'_>>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| RegistrationError::StoreUnavailable)?;
        let repo = SqliteRegistrationRepository::new_unchecked(&conn);
        let service = RegistrationService::new(repo);
        action(&service)
    }
}

fn ensure_schema(conn: &Connection) -> DbResult<()> {
    SqliteRegistrationRepository::check_schema(conn).map_err(|err| match err {
        RepoError::Db(err) => err,
        other => DbError::IncompatibleSchema(other.to_string()),
    })
}
