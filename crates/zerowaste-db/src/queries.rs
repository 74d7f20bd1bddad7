use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;
use uuid::Uuid;

use zerowaste_core::directory::DonationSource;
use zerowaste_types::api::UpdateProfileRequest;
use zerowaste_types::models::{Donation, DonationStatus, Profile, Request};

use crate::Database;
use crate::models::{
    DONATION_COLUMNS, DonationRow, PROFILE_COLUMNS, ProfileRow, REQUEST_COLUMN_COUNT,
    REQUEST_COLUMNS, RequestRow, UserRow, format_timestamp,
};

impl Database {
    // -- Accounts --

    /// Insert the credential row and the profile in one transaction.
    /// Returns false, writing nothing, when the email is already taken.
    pub fn create_account(&self, profile: &Profile, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id = profile.id.to_string();
            let created = format_timestamp(profile.created_at);

            let inserted = tx.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, profile.email, password_hash, created],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
            tx.execute(
                "INSERT INTO profiles (id, first_name, last_name, avatar_url, role, organization_name,
                                       is_verified, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    profile.first_name,
                    profile.last_name,
                    profile.avatar_url,
                    profile.role.as_str(),
                    profile.organization_name,
                    profile.is_verified,
                    created,
                    format_timestamp(profile.updated_at),
                ],
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, password, created_at FROM users WHERE email = ?1 COLLATE NOCASE",
                    [email],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            password: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| query_profile(conn, &id.to_string()))
    }

    /// Apply the provided fields. Returns the updated profile, or `None` if
    /// the profile doesn't exist.
    pub fn update_profile(
        &self,
        id: Uuid,
        update: &UpdateProfileRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET
                    first_name = COALESCE(?2, first_name),
                    last_name = COALESCE(?3, last_name),
                    avatar_url = COALESCE(?4, avatar_url),
                    organization_name = COALESCE(?5, organization_name),
                    updated_at = ?6
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.first_name,
                    update.last_name,
                    update.avatar_url,
                    update.organization_name,
                    format_timestamp(now),
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_profile(conn, &id.to_string())
        })
    }

    /// Returns false if no such profile.
    pub fn set_profile_verified(&self, id: Uuid, verified: bool, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET is_verified = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), verified, format_timestamp(now)],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Donations --

    pub fn insert_donation(&self, donation: &Donation) -> Result<()> {
        self.with_conn(|conn| {
            let food = &donation.food_details;
            let loc = &donation.location;
            conn.execute(
                "INSERT INTO donations (id, donor_id, title, food_type, is_vegetarian, quantity, quantity_unit,
                                        expiry_date, description, image_url, latitude, longitude, address, city,
                                        postal_code, country, pickup_deadline, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                params![
                    donation.id.to_string(),
                    donation.donor_id.to_string(),
                    donation.title,
                    food.food_type,
                    food.is_vegetarian,
                    food.quantity,
                    food.quantity_unit,
                    format_timestamp(food.expiry_date),
                    food.description,
                    donation.image_url,
                    loc.latitude,
                    loc.longitude,
                    loc.address,
                    loc.city,
                    loc.postal_code,
                    loc.country,
                    format_timestamp(donation.pickup_deadline),
                    donation.status.as_str(),
                    format_timestamp(donation.created_at),
                    format_timestamp(donation.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_donation(&self, id: Uuid) -> Result<Option<Donation>> {
        self.with_conn(|conn| query_donation(conn, &id.to_string()))
    }

    pub fn list_donations_by_status(&self, status: DonationStatus) -> Result<Vec<Donation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {DONATION_COLUMNS} FROM donations d
                 WHERE d.status = ?1
                 ORDER BY d.pickup_deadline ASC"
            );
            query_donations(conn, &sql, status.as_str())
        })
    }

    pub fn list_donations_by_donor(&self, donor_id: Uuid) -> Result<Vec<Donation>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {DONATION_COLUMNS} FROM donations d
                 WHERE d.donor_id = ?1
                 ORDER BY d.created_at DESC"
            );
            query_donations(conn, &sql, &donor_id.to_string())
        })
    }

    // -- Requests --

    pub fn get_request(&self, id: Uuid) -> Result<Option<Request>> {
        self.with_conn(|conn| query_request(conn, &id.to_string()))
    }

    /// Requests made against any of the donor's donations, newest first.
    pub fn list_requests_for_donor(&self, donor_id: Uuid) -> Result<Vec<(Request, Donation)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REQUEST_COLUMNS}, {DONATION_COLUMNS}
                 FROM requests r
                 JOIN donations d ON d.id = r.donation_id
                 WHERE d.donor_id = ?1
                 ORDER BY r.created_at DESC"
            );
            query_requests_with_donation(conn, &sql, &donor_id.to_string())
        })
    }

    /// The receiver's own requests, newest first.
    pub fn list_requests_by_receiver(&self, receiver_id: Uuid) -> Result<Vec<(Request, Donation)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REQUEST_COLUMNS}, {DONATION_COLUMNS}
                 FROM requests r
                 JOIN donations d ON d.id = r.donation_id
                 WHERE r.receiver_id = ?1
                 ORDER BY r.created_at DESC"
            );
            query_requests_with_donation(conn, &sql, &receiver_id.to_string())
        })
    }

    /// The request that won the donation, if any.
    pub fn accepted_request_for_donation(&self, donation_id: Uuid) -> Result<Option<Request>> {
        self.with_conn(|conn| query_accepted_request(conn, &donation_id.to_string()))
    }
}

impl DonationSource for Database {
    type Error = anyhow::Error;

    fn open_donations(&self) -> Result<Vec<Donation>> {
        self.list_donations_by_status(DonationStatus::Pending)
    }
}

pub(crate) fn insert_request(conn: &Connection, request: &Request) -> Result<()> {
    conn.execute(
        "INSERT INTO requests (id, donation_id, receiver_id, status, message, created_at, decided_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            request.id.to_string(),
            request.donation_id.to_string(),
            request.receiver_id.to_string(),
            request.status.as_str(),
            request.message,
            format_timestamp(request.created_at),
            request.decided_at.map(format_timestamp),
        ],
    )?;
    Ok(())
}

pub(crate) fn query_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    let sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles p JOIN users u ON u.id = p.id WHERE p.id = ?1"
    );
    conn.query_row(&sql, [id], ProfileRow::from_row)
        .optional()?
        .map(ProfileRow::into_profile)
        .transpose()
}

pub(crate) fn query_donation(conn: &Connection, id: &str) -> Result<Option<Donation>> {
    let sql = format!("SELECT {DONATION_COLUMNS} FROM donations d WHERE d.id = ?1");
    conn.query_row(&sql, [id], |row| DonationRow::from_row_at(row, 0))
        .optional()?
        .map(DonationRow::into_donation)
        .transpose()
}

pub(crate) fn query_request(conn: &Connection, id: &str) -> Result<Option<Request>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests r WHERE r.id = ?1");
    conn.query_row(&sql, [id], RequestRow::from_row)
        .optional()?
        .map(RequestRow::into_request)
        .transpose()
}

pub(crate) fn query_accepted_request(conn: &Connection, donation_id: &str) -> Result<Option<Request>> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM requests r
         WHERE r.donation_id = ?1 AND r.status = 'accepted'
         ORDER BY r.decided_at ASC
         LIMIT 1"
    );
    conn.query_row(&sql, [donation_id], RequestRow::from_row)
        .optional()?
        .map(RequestRow::into_request)
        .transpose()
}

fn query_donations(conn: &Connection, sql: &str, param: &str) -> Result<Vec<Donation>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([param], |row| DonationRow::from_row_at(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Unreadable rows are logged and skipped.
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match row.into_donation() {
                Ok(donation) => Some(donation),
                Err(e) => {
                    warn!("Skipping unreadable donation {}: {:#}", id, e);
                    None
                }
            }
        })
        .collect())
}

fn query_requests_with_donation(
    conn: &Connection,
    sql: &str,
    param: &str,
) -> Result<Vec<(Request, Donation)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([param], |row| {
            Ok((
                RequestRow::from_row(row)?,
                DonationRow::from_row_at(row, REQUEST_COLUMN_COUNT)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(request, donation)| Ok((request.into_request()?, donation.into_donation()?)))
        .collect()
}
