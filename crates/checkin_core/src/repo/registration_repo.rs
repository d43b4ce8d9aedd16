//! Registration repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist attendee registrations with unique email/roll.
//! - Perform the one-way attendance transition as a single conditional write.
//!
//! # Invariants
//! - Insert runs duplicate check, id assignment and insert inside one
//!   `IMMEDIATE` transaction; the `UNIQUE` constraints back it up.
//! - `mark_attended` never reads the flag before writing it. The affected-row
//!   count of `UPDATE ... WHERE attended = 0` decides success.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::registration::{
    AttendanceCounts, NewRegistration, Registration, RegistrationId, RegistrationValidationError,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const REGISTRATION_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    roll,
    attended,
    registered_at,
    attended_at
FROM registrations";

const REQUIRED_COLUMNS: [&str; 7] = [
    "id",
    "name",
    "email",
    "roll",
    "attended",
    "registered_at",
    "attended_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Identity field that collided with an existing registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Email,
    Roll,
}

impl DuplicateField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Roll => "roll",
        }
    }
}

impl Display for DuplicateField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository error for registration persistence and attendance writes.
#[derive(Debug)]
pub enum RepoError {
    Validation(RegistrationValidationError),
    Duplicate(DuplicateField),
    NotFound(RegistrationId),
    AlreadyMarked(RegistrationId),
    Db(DbError),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate(field) => write!(f, "{field} is already registered"),
            Self::NotFound(id) => write!(f, "registration not found: {id}"),
            Self::AlreadyMarked(id) => write!(f, "attendance already marked for registration {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted registration data: {message}")
            }
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistrationValidationError> for RepoError {
    fn from(value: RegistrationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationListQuery {
    /// Restrict to attended (`Some(true)`) or pending (`Some(false)`) rows.
    pub attended: Option<bool>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for registration storage and attendance writes.
pub trait RegistrationRepository {
    /// Inserts a new registration and returns the persisted row.
    fn insert_registration(&self, input: &NewRegistration) -> RepoResult<Registration>;
    fn get_registration(&self, id: RegistrationId) -> RepoResult<Option<Registration>>;
    /// Lists registrations in insertion (id ascending) order.
    fn list_registrations(&self, query: &RegistrationListQuery) -> RepoResult<Vec<Registration>>;
    fn count_registrations(&self) -> RepoResult<AttendanceCounts>;
    /// Flips the attendance flag exactly once and returns the updated row.
    fn mark_attended(&self, id: RegistrationId) -> RepoResult<Registration>;
}

/// SQLite-backed registration repository.
pub struct SqliteRegistrationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRegistrationRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Self::check_schema(conn)?;
        Ok(Self::new_unchecked(conn))
    }

    /// Verifies the table and columns this repository reads and writes.
    pub fn check_schema(conn: &Connection) -> RepoResult<()> {
        ensure_connection_ready(conn)
    }

    /// Wraps a connection that already passed [`Self::check_schema`].
    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RegistrationRepository for SqliteRegistrationRepository<'_> {
    fn insert_registration(&self, input: &NewRegistration) -> RepoResult<Registration> {
        input.validate()?;

        // Immediate: take the write lock before reading, so the duplicate
        // check and `MAX(id)` cannot go stale before the insert.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        if let Some(field) = find_conflict(&tx, input)? {
            return Err(RepoError::Duplicate(field));
        }

        let id: RegistrationId = tx.query_row(
            "SELECT COALESCE(MAX(id), 0) + 1 FROM registrations;",
            [],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO registrations (id, name, email, roll, attended)
             VALUES (?1, ?2, ?3, ?4, 0);",
            params![
                id,
                input.name.as_str(),
                input.email.as_str(),
                input.roll.as_str()
            ],
        )
        .map_err(map_unique_violation)?;

        let registration = load_registration(&tx, id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("registration {id} missing after insert"))
        })?;
        tx.commit()?;

        Ok(registration)
    }

    fn get_registration(&self, id: RegistrationId) -> RepoResult<Option<Registration>> {
        load_registration(self.conn, id)
    }

    fn list_registrations(&self, query: &RegistrationListQuery) -> RepoResult<Vec<Registration>> {
        let mut sql = format!("{REGISTRATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(attended) = query.attended {
            sql.push_str(" AND attended = ?");
            bind_values.push(Value::Integer(bool_to_int(attended)));
        }

        sql.push_str(" ORDER BY id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut registrations = Vec::new();

        while let Some(row) = rows.next()? {
            registrations.push(parse_registration_row(row)?);
        }

        Ok(registrations)
    }

    fn count_registrations(&self) -> RepoResult<AttendanceCounts> {
        let (total, attended): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(attended), 0) FROM registrations;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(AttendanceCounts {
            total_registered: non_negative(total, "COUNT(*)")?,
            total_attended: non_negative(attended, "SUM(attended)")?,
        })
    }

    fn mark_attended(&self, id: RegistrationId) -> RepoResult<Registration> {
        // Immediate: writers on other connections queue on the busy handler
        // instead of failing with SQLITE_BUSY on a SHARED -> RESERVED upgrade.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE registrations
             SET
                attended = 1,
                attended_at = CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)
             WHERE id = ?1
               AND attended = 0;",
            [id],
        )?;

        if changed == 0 {
            // Attended is terminal, so a row that exists here was already marked.
            return match load_registration(&tx, id)? {
                Some(_) => Err(RepoError::AlreadyMarked(id)),
                None => Err(RepoError::NotFound(id)),
            };
        }

        let registration = load_registration(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;
        Ok(registration)
    }
}

fn find_conflict(conn: &Connection, input: &NewRegistration) -> RepoResult<Option<DuplicateField>> {
    let email_taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM registrations WHERE email = ?1 LIMIT 1;",
            [input.email.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    if email_taken.is_some() {
        return Ok(Some(DuplicateField::Email));
    }

    let roll_taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM registrations WHERE roll = ?1 LIMIT 1;",
            [input.roll.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(roll_taken.map(|_| DuplicateField::Roll))
}

fn map_unique_violation(err: rusqlite::Error) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation
            && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        {
            if message.contains("registrations.email") {
                return RepoError::Duplicate(DuplicateField::Email);
            }
            if message.contains("registrations.roll") {
                return RepoError::Duplicate(DuplicateField::Roll);
            }
        }
    }
    RepoError::from(err)
}

fn load_registration(conn: &Connection, id: RegistrationId) -> RepoResult<Option<Registration>> {
    let mut stmt = conn.prepare(&format!("{REGISTRATION_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_registration_row(row)?));
    }

    Ok(None)
}

fn parse_registration_row(row: &Row<'_>) -> RepoResult<Registration> {
    let id: RegistrationId = row.get("id")?;
    let attended = match row.get::<_, i64>("attended")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid attended value `{other}` for registration {id}"
            )));
        }
    };
    let attended_at: Option<i64> = row.get("attended_at")?;
    if attended && attended_at.is_none() {
        return Err(RepoError::InvalidData(format!(
            "registration {id} is attended but has no attended_at"
        )));
    }

    Ok(Registration {
        id,
        name: row.get("name")?,
        email: row.get("email")?,
        roll: row.get("roll")?,
        attended,
        registered_at: row.get("registered_at")?,
        attended_at,
    })
}

fn non_negative(value: i64, label: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative aggregate {label} = {value}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    if !table_exists(conn, "registrations")? {
        return Err(RepoError::MissingRequiredTable("registrations"));
    }

    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "registrations", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "registrations",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM pragma_table_info(?1)
            WHERE name = ?2
        );",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
