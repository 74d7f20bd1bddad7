use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Analytics, Donation, DonationStatus, FoodDetails, Location, Request, RequestStatus, UserRole,
};

// -- JWT Claims --

/// JWT claims issued at login and checked by the auth middleware.
/// The role is copied from the stored profile when the token is minted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: UserRole,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: UserRole,
    pub organization_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub role: UserRole,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub token: String,
}

// -- Profiles --

/// Partial profile update. `role` is deliberately absent.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub organization_name: Option<String>,
}

// -- Donations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDonationRequest {
    pub title: String,
    pub food_details: FoodDetails,
    pub image_url: Option<String>,
    pub location: Location,
    pub pickup_deadline: DateTime<Utc>,
}

/// Map marker class for a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerUrgency {
    Fresh,
    NearExpiry,
    Accepted,
    Unavailable,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonationResponse {
    #[serde(flatten)]
    pub donation: Donation,
    pub urgency: MarkerUrgency,
    pub marker_color: String,
    /// Present when the caller supplied a viewer position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyDonationRequest {
    pub food_saved_kg: f64,
    pub co2_saved_kg: Option<f64>,
    pub people_served: Option<u32>,
    pub feedback: Option<String>,
    pub rating: Option<u8>,
}

// -- Requests --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequestRequest {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRequest {
    pub status: RequestStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestResponse {
    #[serde(flatten)]
    pub request: Request,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donation: Option<Donation>,
}

// -- Dashboards --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardResponse {
    Donor {
        donations: Vec<StatusCount>,
        requests_received: u64,
        requests_pending: u64,
    },
    Receiver {
        requests_count: u64,
        pending_requests_count: u64,
        accepted_requests_count: u64,
        people_served: u64,
        food_saved_kg: f64,
        co2_saved_kg: f64,
    },
    Volunteer {
        pickups_available: u64,
        pickups_completed: u64,
    },
    Admin {
        analytics: Analytics,
        unverified_profiles: u64,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DonationStatusChange {
    pub id: Uuid,
    pub status: DonationStatus,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
