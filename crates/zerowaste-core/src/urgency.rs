use chrono::{DateTime, Duration, Utc};
use zerowaste_types::api::MarkerUrgency;
use zerowaste_types::models::{Donation, DonationStatus};

/// Pending donations expiring within this many hours get the amber marker.
pub const NEAR_EXPIRY_HOURS: i64 = 24;

pub fn classify(donation: &Donation, now: DateTime<Utc>) -> MarkerUrgency {
    match donation.status {
        DonationStatus::Pending => {
            if donation.food_details.expiry_date - now <= Duration::hours(NEAR_EXPIRY_HOURS) {
                MarkerUrgency::NearExpiry
            } else {
                MarkerUrgency::Fresh
            }
        }
        DonationStatus::Accepted => MarkerUrgency::Accepted,
        _ => MarkerUrgency::Unavailable,
    }
}

/// Hex colour the map client paints the marker with.
pub fn marker_color(urgency: MarkerUrgency) -> &'static str {
    match urgency {
        MarkerUrgency::Fresh => "#10B981",
        MarkerUrgency::NearExpiry => "#F59E0B",
        MarkerUrgency::Accepted => "#6366F1",
        MarkerUrgency::Unavailable => "#EF4444",
    }
}
