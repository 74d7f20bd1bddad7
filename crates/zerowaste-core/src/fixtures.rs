use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use zerowaste_types::models::{Donation, DonationStatus, FoodDetails, Location};

/// A pending vegetarian donation at (lat, lng) expiring `expires_in` from `now`.
pub fn donation_at(
    food_type: &str,
    latitude: f64,
    longitude: f64,
    now: DateTime<Utc>,
    expires_in: Duration,
) -> Donation {
    Donation {
        id: Uuid::new_v4(),
        donor_id: Uuid::new_v4(),
        title: format!("Surplus {food_type}"),
        food_details: FoodDetails {
            food_type: food_type.to_string(),
            is_vegetarian: true,
            quantity: 5.0,
            quantity_unit: "kg".into(),
            expiry_date: now + expires_in,
            description: String::new(),
        },
        image_url: None,
        location: Location {
            latitude,
            longitude,
            address: "1 Market St".into(),
            city: "Springfield".into(),
            postal_code: "00000".into(),
            country: "Nowhere".into(),
        },
        pickup_deadline: now + Duration::hours(12),
        status: DonationStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}
