use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zerowaste_types::models::{Coordinates, Donation};

use crate::geo::haversine_km;

/// Donations expiring in less than this many days count as "expiring".
pub const EXPIRING_SOON_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Expiring,
}

impl Freshness {
    /// Classify an expiry timestamp relative to `now`. Already-expired food
    /// is "expiring".
    pub fn classify(expiry: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if expiry - now < Duration::days(EXPIRING_SOON_DAYS) {
            Self::Expiring
        } else {
            Self::Fresh
        }
    }
}

/// Viewer-side criteria for which donations to surface.
///
/// Every `None` field disables its check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityFilter {
    pub max_distance_km: Option<f64>,
    pub food_type: Option<String>,
    pub vegetarian_only: Option<bool>,
    pub freshness: Option<Freshness>,
}

impl VisibilityFilter {
    /// Whether `donation` passes every active check.
    ///
    /// The distance check only runs when both `viewer` and
    /// `max_distance_km` are known.
    pub fn matches(&self, donation: &Donation, viewer: Option<Coordinates>, now: DateTime<Utc>) -> bool {
        let food = &donation.food_details;

        if let Some(wanted) = &self.food_type {
            if food.food_type.to_lowercase() != wanted.to_lowercase() {
                return false;
            }
        }

        if let Some(vegetarian) = self.vegetarian_only {
            if food.is_vegetarian != vegetarian {
                return false;
            }
        }

        if let Some(wanted) = self.freshness {
            if Freshness::classify(food.expiry_date, now) != wanted {
                return false;
            }
        }

        if let (Some(viewer), Some(max_km)) = (viewer, self.max_distance_km) {
            if haversine_km(viewer, donation.location.coordinates()) > max_km {
                return false;
            }
        }

        true
    }
}
