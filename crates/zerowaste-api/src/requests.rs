use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use zerowaste_core::lifecycle::{TransitionError, check_request_decision};
use zerowaste_db::{DecisionOutcome, RequestOutcome};
use zerowaste_types::api::{Claims, CreateRequestRequest, DecisionRequest, RequestResponse};
use zerowaste_types::models::{Donation, Request, RequestStatus, UserRole};

use crate::auth::AppState;
use crate::donations::find_donation;
use crate::error::{ApiError, blocking};
use crate::middleware::require_role;

/// A receiver asks for an open donation whose pickup deadline is still
/// ahead. Repeat requests for the same
/// donation are accepted; the donor decides each one.
pub async fn create_request(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRequestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Receiver])?;

    let now = Utc::now();
    let request = Request {
        id: Uuid::new_v4(),
        donation_id,
        receiver_id: claims.sub,
        status: RequestStatus::Pending,
        message: req.message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        created_at: now,
        decided_at: None,
    };

    let request = blocking(&state, move |db| {
        match db.create_request(&request, now).map_err(ApiError::RemoteWrite)? {
            RequestOutcome::Created => Ok(request),
            RequestOutcome::DonationNotFound => {
                Err(ApiError::NotFound(format!("donation {} not found", donation_id)))
            }
            RequestOutcome::DonationNotPending(status) => Err(ApiError::Conflict(format!(
                "donation is {} and no longer takes requests",
                status
            ))),
            RequestOutcome::DonationOverdue => Err(ApiError::Conflict(
                "the pickup deadline for this donation has passed".into(),
            )),
        }
    })
    .await?;

    info!("Receiver {} requested donation {}", claims.sub, donation_id);

    Ok((
        StatusCode::CREATED,
        Json(RequestResponse {
            request,
            donation: None,
        }),
    ))
}

/// Requests on the caller's donations.
pub async fn list_incoming(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Donor])?;

    let donor_id = claims.sub;
    let rows = blocking(&state, move |db| {
        db.list_requests_for_donor(donor_id).map_err(ApiError::RemoteRead)
    })
    .await?;

    Ok(Json(joined(rows)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Receiver])?;

    let receiver_id = claims.sub;
    let rows = blocking(&state, move |db| {
        db.list_requests_by_receiver(receiver_id).map_err(ApiError::RemoteRead)
    })
    .await?;

    Ok(Json(joined(rows)))
}

/// The donor accepts or rejects a pending request. Accepting also takes
/// the donation off the open list; only one request per donation can win.
pub async fn decide_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DecisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Donor])?;
    if req.status == RequestStatus::Pending {
        return Err(ApiError::Validation(
            "status must be accepted or rejected".into(),
        ));
    }

    let caller = claims.sub;
    let outcome = req.status;
    let (request, donation) = blocking(&state, move |db| {
        let request = db
            .get_request(request_id)
            .map_err(ApiError::RemoteRead)?
            .ok_or_else(|| ApiError::NotFound(format!("request {} not found", request_id)))?;
        let donation = find_donation(db, request.donation_id)?;
        if donation.donor_id != caller {
            return Err(ApiError::Forbidden(
                "only the donor can decide requests on this donation".into(),
            ));
        }
        check_request_decision(request.status, outcome)?;

        match db
            .decide_request(request_id, outcome, Utc::now())
            .map_err(ApiError::RemoteWrite)?
        {
            DecisionOutcome::Applied(request) => {
                let donation = find_donation(db, request.donation_id)?;
                Ok((request, donation))
            }
            DecisionOutcome::RequestNotFound => {
                Err(ApiError::NotFound(format!("request {} not found", request_id)))
            }
            DecisionOutcome::RequestNotPending(status) => {
                Err(TransitionError::AlreadyDecided(status).into())
            }
            DecisionOutcome::DonationNotPending(status) => Err(ApiError::Conflict(format!(
                "donation is already {}",
                status
            ))),
            DecisionOutcome::DonationOverdue => Err(ApiError::Conflict(
                "the pickup deadline for this donation has passed".into(),
            )),
        }
    })
    .await?;

    info!("Request {} {} by donor {}", request.id, request.status, caller);

    Ok(Json(RequestResponse {
        request,
        donation: Some(donation),
    }))
}

fn joined(rows: Vec<(Request, Donation)>) -> Vec<RequestResponse> {
    rows.into_iter()
        .map(|(request, donation)| RequestResponse {
            request,
            donation: Some(donation),
        })
        .collect()
}
