use anyhow::Result;
use rusqlite::{Connection, params};
use uuid::Uuid;

use zerowaste_types::models::{Analytics, DonationStatus};

use crate::Database;
use crate::models::parse_timestamp;

/// Request counts seen from one side of the marketplace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub total: u64,
    pub pending: u64,
    pub accepted: u64,
}

/// What a receiver's completed pickups amounted to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Impact {
    pub people_served: u64,
    pub food_saved_kg: f64,
    pub co2_saved_kg: f64,
}

impl Database {
    /// Per-status donation counts for a donor. Statuses with no donations
    /// are omitted.
    pub fn donation_status_counts(&self, donor_id: Uuid) -> Result<Vec<(DonationStatus, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM donations WHERE donor_id = ?1 GROUP BY status ORDER BY status",
            )?;
            let rows = stmt
                .query_map([donor_id.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(status, count)| Ok((status.parse()?, count as u64)))
                .collect()
        })
    }

    pub fn request_counts_for_donor(&self, donor_id: Uuid) -> Result<RequestCounts> {
        self.with_conn(|conn| {
            request_counts(
                conn,
                "SELECT COUNT(*),
                        COALESCE(SUM(r.status = 'pending'), 0),
                        COALESCE(SUM(r.status = 'accepted'), 0)
                 FROM requests r JOIN donations d ON d.id = r.donation_id
                 WHERE d.donor_id = ?1",
                donor_id,
            )
        })
    }

    pub fn request_counts_for_receiver(&self, receiver_id: Uuid) -> Result<RequestCounts> {
        self.with_conn(|conn| {
            request_counts(
                conn,
                "SELECT COUNT(*),
                        COALESCE(SUM(r.status = 'pending'), 0),
                        COALESCE(SUM(r.status = 'accepted'), 0)
                 FROM requests r
                 WHERE r.receiver_id = ?1",
                receiver_id,
            )
        })
    }

    pub fn receiver_impact(&self, receiver_id: Uuid) -> Result<Impact> {
        self.with_conn(|conn| {
            let impact = conn.query_row(
                "SELECT COALESCE(SUM(people_served), 0),
                        COALESCE(SUM(food_saved_kg), 0.0),
                        COALESCE(SUM(co2_saved_kg), 0.0)
                 FROM transactions WHERE receiver_id = ?1",
                [receiver_id.to_string()],
                |row| {
                    Ok(Impact {
                        people_served: row.get::<_, i64>(0)? as u64,
                        food_saved_kg: row.get(1)?,
                        co2_saved_kg: row.get(2)?,
                    })
                },
            )?;
            Ok(impact)
        })
    }

    /// (donations waiting for pickup, pickups done by this volunteer)
    pub fn volunteer_counts(&self, volunteer_id: Uuid) -> Result<(u64, u64)> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT COALESCE(SUM(status = 'accepted'), 0),
                        COALESCE(SUM(picked_by = ?1), 0)
                 FROM donations",
                [volunteer_id.to_string()],
                |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
            )?;
            Ok(counts)
        })
    }

    pub fn count_unverified_profiles(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM profiles WHERE is_verified = 0 AND role != 'admin'",
                [],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Platform totals plus live counts of donors and receivers who have
    /// ever listed or requested anything.
    pub fn analytics(&self) -> Result<Analytics> {
        self.with_conn(|conn| {
            let (total, food, co2, people, last_updated) = conn.query_row(
                "SELECT total_transactions, food_saved_total_kg, co2_saved_total_kg,
                        people_served_total, last_updated
                 FROM analytics WHERE id = 'global'",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )?;

            let active_donors: i64 =
                conn.query_row("SELECT COUNT(DISTINCT donor_id) FROM donations", [], |row| row.get(0))?;
            let active_receivers: i64 =
                conn.query_row("SELECT COUNT(DISTINCT receiver_id) FROM requests", [], |row| row.get(0))?;

            Ok(Analytics {
                total_transactions: total as u64,
                food_saved_total_kg: food,
                co2_saved_total_kg: co2,
                people_served_total: people as u64,
                active_donors: active_donors as u64,
                active_receivers: active_receivers as u64,
                last_updated: last_updated.as_deref().map(parse_timestamp).transpose()?,
            })
        })
    }
}

fn request_counts(conn: &Connection, sql: &str, id: Uuid) -> Result<RequestCounts> {
    let counts = conn.query_row(sql, params![id.to_string()], |row| {
        Ok(RequestCounts {
            total: row.get::<_, i64>(0)? as u64,
            pending: row.get::<_, i64>(1)? as u64,
            accepted: row.get::<_, i64>(2)? as u64,
        })
    })?;
    Ok(counts)
}
