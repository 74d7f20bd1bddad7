use axum::{Extension, Json, extract::State, response::IntoResponse};

use zerowaste_types::api::{Claims, DashboardResponse, StatusCount};
use zerowaste_types::models::UserRole;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Statistics for the caller's role.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub;
    let role = claims.role;

    let dashboard = blocking(&state, move |db| {
        let dashboard = match role {
            UserRole::Donor => {
                let donations = db
                    .donation_status_counts(id)
                    .map_err(ApiError::RemoteRead)?
                    .into_iter()
                    .map(|(status, count)| StatusCount {
                        status: status.to_string(),
                        count,
                    })
                    .collect();
                let requests = db.request_counts_for_donor(id).map_err(ApiError::RemoteRead)?;
                DashboardResponse::Donor {
                    donations,
                    requests_received: requests.total,
                    requests_pending: requests.pending,
                }
            }
            UserRole::Receiver => {
                let requests = db
                    .request_counts_for_receiver(id)
                    .map_err(ApiError::RemoteRead)?;
                let impact = db.receiver_impact(id).map_err(ApiError::RemoteRead)?;
                DashboardResponse::Receiver {
                    requests_count: requests.total,
                    pending_requests_count: requests.pending,
                    accepted_requests_count: requests.accepted,
                    people_served: impact.people_served,
                    food_saved_kg: impact.food_saved_kg,
                    co2_saved_kg: impact.co2_saved_kg,
                }
            }
            UserRole::Volunteer => {
                let (available, completed) =
                    db.volunteer_counts(id).map_err(ApiError::RemoteRead)?;
                DashboardResponse::Volunteer {
                    pickups_available: available,
                    pickups_completed: completed,
                }
            }
            UserRole::Admin => DashboardResponse::Admin {
                analytics: db.analytics().map_err(ApiError::RemoteRead)?,
                unverified_profiles: db
                    .count_unverified_profiles()
                    .map_err(ApiError::RemoteRead)?,
            },
        };
        Ok(dashboard)
    })
    .await?;

    Ok(Json(dashboard))
}
