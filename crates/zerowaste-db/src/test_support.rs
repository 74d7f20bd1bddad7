use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use zerowaste_types::models::{
    Donation, DonationStatus, FoodDetails, Location, Profile, Request, RequestStatus, UserRole,
};

use crate::Database;
use crate::workflow::RequestOutcome;

pub fn account(db: &Database, email: &str, role: UserRole) -> Profile {
    let now = Utc::now();
    let profile = Profile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: email.split('@').next().unwrap_or_default().to_string(),
        last_name: String::new(),
        avatar_url: None,
        role,
        organization_name: None,
        is_verified: false,
        created_at: now,
        updated_at: now,
    };
    assert!(db.create_account(&profile, "$argon2id$test").unwrap());
    profile
}

pub fn donor_and_receiver(db: &Database) -> (Profile, Profile) {
    (
        account(db, "donor@example.org", UserRole::Donor),
        account(db, "receiver@example.org", UserRole::Receiver),
    )
}

pub fn pending_donation(donor_id: Uuid, now: DateTime<Utc>) -> Donation {
    Donation {
        id: Uuid::new_v4(),
        donor_id,
        title: "Leftover vegetables".into(),
        food_details: FoodDetails {
            food_type: "vegetables".into(),
            is_vegetarian: true,
            quantity: 12.5,
            quantity_unit: "kg".into(),
            expiry_date: now + Duration::days(1),
            description: "Carrots and spinach".into(),
        },
        image_url: None,
        location: Location {
            latitude: 17.385,
            longitude: 78.4867,
            address: "Road No. 1".into(),
            city: "Hyderabad".into(),
            postal_code: "500001".into(),
            country: "India".into(),
        },
        pickup_deadline: now + Duration::hours(8),
        status: DonationStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

pub fn pending_request(db: &Database, donation_id: Uuid, receiver_id: Uuid) -> Request {
    let request = Request {
        id: Uuid::new_v4(),
        donation_id,
        receiver_id,
        status: RequestStatus::Pending,
        message: None,
        created_at: Utc::now(),
        decided_at: None,
    };
    let outcome = db.create_request(&request, Utc::now()).unwrap();
    assert!(matches!(outcome, RequestOutcome::Created), "{outcome:?}");
    request
}
