use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use zerowaste_types::api::{Claims, UpdateProfileRequest};
use zerowaste_types::models::UserRole;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::require_role;

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub;
    let profile = blocking(&state, move |db| {
        db.get_profile(id)
            .map_err(ApiError::RemoteRead)?
            .ok_or_else(|| ApiError::NotFound("profile not found".into()))
    })
    .await?;

    Ok(Json(profile))
}

/// Names, avatar and organisation only. The role is fixed at registration.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(mut req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.first_name = req.first_name.map(|n| n.trim().to_string());
    req.last_name = req.last_name.map(|n| n.trim().to_string());
    if req.first_name.as_deref() == Some("") {
        return Err(ApiError::Validation("first name cannot be empty".into()));
    }

    let id = claims.sub;
    let profile = blocking(&state, move |db| {
        db.update_profile(id, &req, Utc::now())
            .map_err(ApiError::RemoteWrite)?
            .ok_or_else(|| ApiError::NotFound("profile not found".into()))
    })
    .await?;

    Ok(Json(profile))
}

pub async fn verify_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Admin])?;

    let profile = blocking(&state, move |db| {
        let found = db
            .set_profile_verified(profile_id, true, Utc::now())
            .map_err(ApiError::RemoteWrite)?;
        if !found {
            return Err(ApiError::NotFound(format!("profile {} not found", profile_id)));
        }
        db.get_profile(profile_id)
            .map_err(ApiError::RemoteRead)?
            .ok_or_else(|| ApiError::NotFound(format!("profile {} not found", profile_id)))
    })
    .await?;

    info!("Admin {} verified profile {}", claims.sub, profile_id);

    Ok(Json(profile))
}
