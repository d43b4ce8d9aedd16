use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use checkin_core::{
    core_version, AttendanceCounts, NewRegistration, Registration, RegistrationError,
    RegistrationId, RegistrationListQuery, ScannedToken, TokenPayload,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{error::ApiError, state::AppState};

const MAX_RECORDS_PAGE: u32 = 500;

/// Missing and `null` fields both arrive as `None` and fail validation as empty.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub roll: Option<String>,
}

impl RegisterRequest {
    fn into_new_registration(self) -> NewRegistration {
        NewRegistration::new(
            self.name.unwrap_or_default(),
            self.email.unwrap_or_default(),
            self.roll.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: &'static str,
    pub id: RegistrationId,
    /// Text to encode into the attendee's QR code.
    pub token: String,
    pub record: Registration,
}

/// Scan submission: either a typed `id` or the raw text the scanner decoded.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRequest {
    pub id: Option<Value>,
    pub qr_data: Option<Value>,
}

impl AttendanceRequest {
    fn into_token(self) -> Result<ScannedToken, ApiError> {
        match (self.id, self.qr_data) {
            (Some(id), _) => Ok(ScannedToken::parse(&id.to_string())?),
            // Scanners hand over text, but some clients forward the decoded JSON value.
            (None, Some(Value::String(raw))) => Ok(ScannedToken::parse(&raw)?),
            (None, Some(value)) => Ok(ScannedToken::parse(&value.to_string())?),
            (None, None) => Err(ApiError::MalformedPayload("id or qrData is required")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub success: bool,
    pub status: &'static str,
    pub message: &'static str,
    pub record: Registration,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    pub attended: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl RecordsQuery {
    fn into_list_query(self) -> RegistrationListQuery {
        RegistrationListQuery {
            attended: self.attended,
            limit: self.limit.map(|limit| limit.clamp(1, MAX_RECORDS_PAGE)),
            offset: self.offset.unwrap_or(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub success: bool,
    pub data: Vec<Registration>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub record: Registration,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: core_version(),
    })
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let input = payload.into_new_registration();
    let record = state.run(move |store| store.register(&input)).await?;
    let token = TokenPayload::from_registration(&record).encode()?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registration successful!",
            id: record.id,
            token,
            record,
        }),
    ))
}

pub async fn attendance_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AttendanceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let token = payload.into_token()?;
    let record = state.run(move |store| store.mark_scanned(&token)).await?;

    Ok(Json(AttendanceResponse {
        success: true,
        status: "marked",
        message: "Attendance marked",
        record,
    }))
}

pub async fn records_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = query.into_list_query();
    let data = state.run(move |store| store.list(&query)).await?;

    Ok(Json(RecordsResponse {
        success: true,
        data,
    }))
}

pub async fn record_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RegistrationId>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .run(move |store| store.find_by_id(id)?.ok_or(RegistrationError::NotFound(id)))
        .await?;

    Ok(Json(RecordResponse {
        success: true,
        record,
    }))
}

pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let counts = state.run(|store| store.counts()).await?;

    Ok(Json(StatsResponse {
        success: true,
        counts,
    }))
}
