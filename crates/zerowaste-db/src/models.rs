//! Database row types. These map directly to SQLite rows and are converted
//! into the zerowaste-types models at the edge of this crate.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use zerowaste_types::models::{Donation, FoodDetails, Location, Profile, Request};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub organization_name: Option<String>,
    pub is_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct DonationRow {
    pub id: String,
    pub donor_id: String,
    pub title: String,
    pub food_type: String,
    pub is_vegetarian: bool,
    pub quantity: f64,
    pub quantity_unit: String,
    pub expiry_date: String,
    pub description: String,
    pub image_url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub pickup_deadline: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct RequestRow {
    pub id: String,
    pub donation_id: String,
    pub receiver_id: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: String,
    pub decided_at: Option<String>,
}

pub(crate) const PROFILE_COLUMNS: &str = "p.id, u.email, p.first_name, p.last_name, p.avatar_url, \
     p.role, p.organization_name, p.is_verified, p.created_at, p.updated_at";

pub(crate) const DONATION_COLUMNS: &str = "d.id, d.donor_id, d.title, d.food_type, d.is_vegetarian, \
     d.quantity, d.quantity_unit, d.expiry_date, d.description, d.image_url, d.latitude, d.longitude, \
     d.address, d.city, d.postal_code, d.country, d.pickup_deadline, d.status, d.created_at, d.updated_at";

pub(crate) const REQUEST_COLUMNS: &str =
    "r.id, r.donation_id, r.receiver_id, r.status, r.message, r.created_at, r.decided_at";

/// Number of columns in `REQUEST_COLUMNS`, for joined reads.
pub(crate) const REQUEST_COLUMN_COUNT: usize = 7;

impl ProfileRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            avatar_url: row.get(4)?,
            role: row.get(5)?,
            organization_name: row.get(6)?,
            is_verified: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub fn into_profile(self) -> Result<Profile> {
        Ok(Profile {
            id: parse_uuid(&self.id)?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            avatar_url: self.avatar_url,
            role: self.role.parse()?,
            organization_name: self.organization_name,
            is_verified: self.is_verified,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

impl DonationRow {
    /// Reads the donation columns starting at `offset`.
    pub(crate) fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            donor_id: row.get(offset + 1)?,
            title: row.get(offset + 2)?,
            food_type: row.get(offset + 3)?,
            is_vegetarian: row.get(offset + 4)?,
            quantity: row.get(offset + 5)?,
            quantity_unit: row.get(offset + 6)?,
            expiry_date: row.get(offset + 7)?,
            description: row.get(offset + 8)?,
            image_url: row.get(offset + 9)?,
            latitude: row.get(offset + 10)?,
            longitude: row.get(offset + 11)?,
            address: row.get(offset + 12)?,
            city: row.get(offset + 13)?,
            postal_code: row.get(offset + 14)?,
            country: row.get(offset + 15)?,
            pickup_deadline: row.get(offset + 16)?,
            status: row.get(offset + 17)?,
            created_at: row.get(offset + 18)?,
            updated_at: row.get(offset + 19)?,
        })
    }

    pub fn into_donation(self) -> Result<Donation> {
        Ok(Donation {
            id: parse_uuid(&self.id)?,
            donor_id: parse_uuid(&self.donor_id)?,
            title: self.title,
            food_details: FoodDetails {
                food_type: self.food_type,
                is_vegetarian: self.is_vegetarian,
                quantity: self.quantity,
                quantity_unit: self.quantity_unit,
                expiry_date: parse_timestamp(&self.expiry_date)?,
                description: self.description,
            },
            image_url: self.image_url,
            location: Location {
                latitude: self.latitude,
                longitude: self.longitude,
                address: self.address,
                city: self.city,
                postal_code: self.postal_code,
                country: self.country,
            },
            pickup_deadline: parse_timestamp(&self.pickup_deadline)?,
            status: self.status.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

impl RequestRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            donation_id: row.get(1)?,
            receiver_id: row.get(2)?,
            status: row.get(3)?,
            message: row.get(4)?,
            created_at: row.get(5)?,
            decided_at: row.get(6)?,
        })
    }

    pub fn into_request(self) -> Result<Request> {
        Ok(Request {
            id: parse_uuid(&self.id)?,
            donation_id: parse_uuid(&self.donation_id)?,
            receiver_id: parse_uuid(&self.receiver_id)?,
            status: self.status.parse()?,
            message: self.message,
            created_at: parse_timestamp(&self.created_at)?,
            decided_at: self.decided_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Storage form for timestamps. Fixed-width UTC, so string order is time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone. Treat as UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

pub fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}
