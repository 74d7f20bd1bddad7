use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored enum column holds a value we don't know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// -- Profiles --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Donor,
    Receiver,
    Volunteer,
    Admin,
}

string_enum!(UserRole, "role", {
    Donor => "donor",
    Receiver => "receiver",
    Volunteer => "volunteer",
    Admin => "admin",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub organization_name: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Donations --

/// Donation lifecycle. Variants are declared in forward order; `Expired`
/// sits outside the main chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Accepted,
    Picked,
    Verified,
    Expired,
}

string_enum!(DonationStatus, "donation status", {
    Pending => "pending",
    Accepted => "accepted",
    Picked => "picked",
    Verified => "verified",
    Expired => "expired",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodDetails {
    #[serde(rename = "type")]
    pub food_type: String,
    pub is_vegetarian: bool,
    pub quantity: f64,
    pub quantity_unit: String,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl Location {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub title: String,
    pub food_details: FoodDetails,
    pub image_url: Option<String>,
    pub location: Location,
    pub pickup_deadline: DateTime<Utc>,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Requests --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

string_enum!(RequestStatus, "request status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub receiver_id: Uuid,
    pub status: RequestStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

// -- Completed hand-overs --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub donor_id: Uuid,
    pub receiver_id: Uuid,
    pub volunteer_id: Option<Uuid>,
    pub completed_at: DateTime<Utc>,
    pub feedback: Option<String>,
    pub rating: Option<u8>,
    pub food_saved_kg: f64,
    pub co2_saved_kg: f64,
    pub people_served: Option<u32>,
}

/// Platform-wide totals, maintained as transactions are recorded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analytics {
    pub total_transactions: u64,
    pub food_saved_total_kg: f64,
    pub co2_saved_total_kg: f64,
    pub people_served_total: u64,
    pub active_donors: u64,
    pub active_receivers: u64,
    pub last_updated: Option<DateTime<Utc>>,
}
