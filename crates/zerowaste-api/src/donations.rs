use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use zerowaste_core::directory::DonationDirectory;
use zerowaste_core::lifecycle::TransitionError;
use zerowaste_core::urgency;
use zerowaste_core::visibility::{Freshness, VisibilityFilter};
use zerowaste_db::VerifyOutcome;
use zerowaste_types::api::{
    Claims, CreateDonationRequest, DonationResponse, DonationStatusChange, VerifyDonationRequest,
};
use zerowaste_types::models::{Coordinates, Donation, DonationStatus, Transaction, UserRole};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::require_role;

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 10.0;

/// Estimated CO2 avoided per kilogram of food that isn't thrown away.
pub const CO2_PER_KG_FOOD: f64 = 2.5;

#[derive(Debug, Default, Deserialize)]
pub struct DonationQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// `0` disables the distance check.
    pub max_distance_km: Option<f64>,
    /// `all` or empty disables the check.
    pub food_type: Option<String>,
    pub vegetarian: Option<bool>,
    /// `fresh`, `expiring`, or `all`.
    pub freshness: Option<String>,
}

impl DonationQuery {
    fn viewer(&self) -> Result<Option<Coordinates>, ApiError> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                check_coordinates(lat, lng)?;
                Ok(Some(Coordinates::new(lat, lng)))
            }
            (None, None) => Ok(None),
            _ => Err(ApiError::Validation("lat and lng must be given together".into())),
        }
    }

    fn filter(&self) -> Result<VisibilityFilter, ApiError> {
        let max_distance_km = self.max_distance_km.unwrap_or(DEFAULT_MAX_DISTANCE_KM);
        if !max_distance_km.is_finite() || max_distance_km < 0.0 {
            return Err(ApiError::Validation("max_distance_km must be zero or more".into()));
        }

        let freshness = match self.freshness.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some("fresh") => Some(Freshness::Fresh),
            Some("expiring") => Some(Freshness::Expiring),
            Some(other) => {
                return Err(ApiError::Validation(format!("unknown freshness '{}'", other)));
            }
        };

        let food_type = self
            .food_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("all"))
            .map(str::to_string);

        Ok(VisibilityFilter {
            max_distance_km: (max_distance_km > 0.0).then_some(max_distance_km),
            food_type,
            vegetarian_only: self.vegetarian,
            freshness,
        })
    }
}

/// Open donations visible to the caller.
pub async fn list_open(
    State(state): State<AppState>,
    Query(query): Query<DonationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = query.viewer()?;
    let filter = query.filter()?;

    let donations = blocking(&state, move |db| {
        let now = Utc::now();
        let mut directory = DonationDirectory::new(filter, viewer);
        directory.refresh(db, now).map_err(ApiError::RemoteRead)?;

        Ok(directory
            .visible(now)
            .into_iter()
            .map(|m| donation_response(m.donation.clone(), m.distance_km, now))
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(Json(donations))
}

pub async fn create_donation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Donor])?;
    let now = Utc::now();
    validate_donation(&req, now)?;

    let donation = Donation {
        id: Uuid::new_v4(),
        donor_id: claims.sub,
        title: req.title.trim().to_string(),
        food_details: req.food_details,
        image_url: req.image_url,
        location: req.location,
        pickup_deadline: req.pickup_deadline,
        status: DonationStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    let donation = blocking(&state, move |db| {
        db.insert_donation(&donation).map_err(ApiError::RemoteWrite)?;
        Ok(donation)
    })
    .await?;

    info!("Donor {} listed donation {}", claims.sub, donation.id);

    Ok((StatusCode::CREATED, Json(donation_response(donation, None, now))))
}

/// The caller's own donations, newest first.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Donor])?;

    let donor_id = claims.sub;
    let donations = blocking(&state, move |db| {
        db.list_donations_by_donor(donor_id).map_err(ApiError::RemoteRead)
    })
    .await?;

    let now = Utc::now();
    let donations: Vec<DonationResponse> = donations
        .into_iter()
        .map(|d| donation_response(d, None, now))
        .collect();
    Ok(Json(donations))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let donation = blocking(&state, move |db| find_donation(db, donation_id)).await?;
    Ok(Json(donation_response(donation, None, Utc::now())))
}

/// `accepted -> picked`. The accepted receiver, the owning donor, or any
/// volunteer may collect.
pub async fn mark_picked_up(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = claims.sub;
    let role = claims.role;

    blocking(&state, move |db| {
        let donation = find_donation(db, donation_id)?;

        let allowed = match role {
            UserRole::Volunteer => true,
            UserRole::Donor => donation.donor_id == caller,
            UserRole::Receiver => db
                .accepted_request_for_donation(donation_id)
                .map_err(ApiError::RemoteRead)?
                .is_some_and(|r| r.receiver_id == caller),
            UserRole::Admin => false,
        };
        if !allowed {
            return Err(ApiError::Forbidden(
                "only the accepted receiver, the donor or a volunteer can collect this donation"
                    .into(),
            ));
        }

        let moved = db
            .mark_picked_up(donation_id, caller, Utc::now())
            .map_err(ApiError::RemoteWrite)?;
        if !moved {
            return Err(TransitionError::Donation {
                from: donation.status,
                to: DonationStatus::Picked,
            }
            .into());
        }
        Ok(())
    })
    .await?;

    info!("Donation {} picked up by {}", donation_id, caller);

    Ok(Json(DonationStatusChange {
        id: donation_id,
        status: DonationStatus::Picked,
    }))
}

/// `picked -> verified`, recording the transaction.
pub async fn verify_donation(
    State(state): State<AppState>,
    Path(donation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<VerifyDonationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[UserRole::Donor, UserRole::Admin])?;
    validate_verification(&req)?;

    let caller = claims.sub;
    let is_admin = claims.role == UserRole::Admin;
    let transaction = Transaction {
        id: Uuid::new_v4(),
        donation_id,
        // Parties are filled in by the store.
        donor_id: Uuid::nil(),
        receiver_id: Uuid::nil(),
        volunteer_id: None,
        completed_at: Utc::now(),
        feedback: req.feedback,
        rating: req.rating,
        food_saved_kg: req.food_saved_kg,
        co2_saved_kg: req
            .co2_saved_kg
            .unwrap_or(req.food_saved_kg * CO2_PER_KG_FOOD),
        people_served: req.people_served,
    };

    let transaction = blocking(&state, move |db| {
        let donation = find_donation(db, donation_id)?;
        if !is_admin && donation.donor_id != caller {
            return Err(ApiError::Forbidden(
                "only the donor or an admin can verify this donation".into(),
            ));
        }

        match db
            .verify_donation(donation_id, transaction)
            .map_err(ApiError::RemoteWrite)?
        {
            VerifyOutcome::Recorded(transaction) => Ok(transaction),
            VerifyOutcome::DonationNotFound => {
                Err(ApiError::NotFound(format!("donation {} not found", donation_id)))
            }
            VerifyOutcome::NotPicked(status) => Err(TransitionError::Donation {
                from: status,
                to: DonationStatus::Verified,
            }
            .into()),
            VerifyOutcome::NoReceiver => Err(ApiError::Conflict(
                "donation has no accepted request".into(),
            )),
        }
    })
    .await?;

    info!(
        "Donation {} verified, {:.1} kg saved",
        donation_id, transaction.food_saved_kg
    );

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub(crate) fn find_donation(db: &zerowaste_db::Database, id: Uuid) -> Result<Donation, ApiError> {
    db.get_donation(id)
        .map_err(ApiError::RemoteRead)?
        .ok_or_else(|| ApiError::NotFound(format!("donation {} not found", id)))
}

fn donation_response(
    donation: Donation,
    distance_km: Option<f64>,
    now: DateTime<Utc>,
) -> DonationResponse {
    let urgency = urgency::classify(&donation, now);
    DonationResponse {
        donation,
        urgency,
        marker_color: urgency::marker_color(urgency).to_string(),
        distance_km,
    }
}

fn check_coordinates(lat: f64, lng: f64) -> Result<(), ApiError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::Validation("coordinates are out of range".into()));
    }
    Ok(())
}

fn validate_donation(req: &CreateDonationRequest, now: DateTime<Utc>) -> Result<(), ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    let food = &req.food_details;
    if food.food_type.trim().is_empty() {
        return Err(ApiError::Validation("food type is required".into()));
    }
    if !food.quantity.is_finite() || food.quantity <= 0.0 {
        return Err(ApiError::Validation("quantity must be positive".into()));
    }
    check_coordinates(req.location.latitude, req.location.longitude)?;
    if req.pickup_deadline <= now {
        return Err(ApiError::Validation("pickup deadline must be in the future".into()));
    }
    Ok(())
}

fn validate_verification(req: &VerifyDonationRequest) -> Result<(), ApiError> {
    if !req.food_saved_kg.is_finite() || req.food_saved_kg < 0.0 {
        return Err(ApiError::Validation("food_saved_kg must be zero or more".into()));
    }
    if req.co2_saved_kg.is_some_and(|kg| !kg.is_finite() || kg < 0.0) {
        return Err(ApiError::Validation("co2_saved_kg must be zero or more".into()));
    }
    if req.rating.is_some_and(|r| !(1..=5).contains(&r)) {
        return Err(ApiError::Validation("rating must be between 1 and 5".into()));
    }
    Ok(())
}
