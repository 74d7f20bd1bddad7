//! Status-changing writes. Each one runs as a single SQLite transaction
//! guarded by the status it expects to find, so two concurrent callers can
//! never both win the same transition.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

use zerowaste_core::lifecycle::check_donation_transition;
use zerowaste_types::models::{DonationStatus, Request, RequestStatus, Transaction};

use crate::Database;
use crate::models::format_timestamp;
use crate::queries::{insert_request, query_accepted_request, query_request};

#[derive(Debug)]
pub enum RequestOutcome {
    Created,
    DonationNotFound,
    /// The donation is no longer open. Carries its current status.
    DonationNotPending(DonationStatus),
    /// Still pending, but the pickup deadline has passed.
    DonationOverdue,
}

#[derive(Debug)]
pub enum DecisionOutcome {
    Applied(Request),
    RequestNotFound,
    /// The request was already decided. Carries its current status.
    RequestNotPending(RequestStatus),
    /// The donation is no longer open. Nothing was written.
    DonationNotPending(DonationStatus),
    /// The pickup deadline has passed. Nothing was written.
    DonationOverdue,
}

#[derive(Debug)]
pub enum VerifyOutcome {
    Recorded(Transaction),
    DonationNotFound,
    /// The donation is not in `picked`. Carries its current status.
    NotPicked(DonationStatus),
    /// No accepted request exists for the donation.
    NoReceiver,
}

/// Status and overdue flag of a donation, read inside the caller's
/// transaction.
fn donation_state(conn: &Connection, donation_id: &str, now: &str) -> Result<Option<(DonationStatus, bool)>> {
    let row: Option<(String, bool)> = conn
        .query_row(
            "SELECT status, pickup_deadline <= ?2 FROM donations WHERE id = ?1",
            params![donation_id, now],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match row {
        Some((status, overdue)) => Ok(Some((status.parse()?, overdue))),
        None => Ok(None),
    }
}

/// Guarded single-step move of a donation. The move itself must be allowed
/// by the lifecycle rules; returns false when the donation is missing or
/// not in `from`.
pub(crate) fn move_donation(
    conn: &Connection,
    donation_id: &str,
    from: DonationStatus,
    to: DonationStatus,
    at: &str,
) -> Result<bool> {
    check_donation_transition(from, to)?;

    let changed = conn.execute(
        "UPDATE donations SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![donation_id, from.as_str(), to.as_str(), at],
    )?;
    Ok(changed == 1)
}

impl Database {
    /// Store a new pending request, provided its donation is still pending
    /// and before its pickup deadline. The check and the insert share one
    /// transaction.
    pub fn create_request(&self, request: &Request, now: DateTime<Utc>) -> Result<RequestOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let did = request.donation_id.to_string();

            match donation_state(&tx, &did, &format_timestamp(now))? {
                None => return Ok(RequestOutcome::DonationNotFound),
                Some((DonationStatus::Pending, true)) => return Ok(RequestOutcome::DonationOverdue),
                Some((DonationStatus::Pending, false)) => {}
                Some((status, _)) => return Ok(RequestOutcome::DonationNotPending(status)),
            }

            insert_request(&tx, request)?;
            tx.commit()?;
            debug!("Request {} created for donation {}", request.id, did);
            Ok(RequestOutcome::Created)
        })
    }

    /// Decide a pending request. Accepting also moves the donation from
    /// `pending` to `accepted` in the same transaction, and is refused once
    /// the pickup deadline has passed.
    pub fn decide_request(
        &self,
        request_id: Uuid,
        outcome: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome> {
        anyhow::ensure!(outcome != RequestStatus::Pending, "pending is not a decision");

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let rid = request_id.to_string();
            let decided_at = format_timestamp(now);

            let Some(request) = query_request(&tx, &rid)? else {
                return Ok(DecisionOutcome::RequestNotFound);
            };

            let changed = tx.execute(
                "UPDATE requests SET status = ?2, decided_at = ?3 WHERE id = ?1 AND status = 'pending'",
                params![rid, outcome.as_str(), decided_at],
            )?;
            if changed == 0 {
                return Ok(DecisionOutcome::RequestNotPending(request.status));
            }

            if outcome == RequestStatus::Accepted {
                // Early returns drop `tx`, rolling the request update back.
                let did = request.donation_id.to_string();
                match donation_state(&tx, &did, &decided_at)? {
                    Some((DonationStatus::Pending, false)) => {}
                    Some((DonationStatus::Pending, true)) => {
                        return Ok(DecisionOutcome::DonationOverdue);
                    }
                    Some((status, _)) => return Ok(DecisionOutcome::DonationNotPending(status)),
                    None => anyhow::bail!("request {} points at a missing donation", rid),
                }
                move_donation(&tx, &did, DonationStatus::Pending, DonationStatus::Accepted, &decided_at)?;
            }

            tx.commit()?;
            debug!("Request {} {}", request_id, outcome);

            Ok(DecisionOutcome::Applied(Request {
                status: outcome,
                decided_at: Some(now),
                ..request
            }))
        })
    }

    /// `accepted -> picked`, remembering who collected it.
    pub fn mark_picked_up(&self, donation_id: Uuid, picked_by: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let did = donation_id.to_string();

            let at = format_timestamp(now);
            if !move_donation(&tx, &did, DonationStatus::Accepted, DonationStatus::Picked, &at)? {
                return Ok(false);
            }
            tx.execute(
                "UPDATE donations SET picked_by = ?2 WHERE id = ?1",
                params![did, picked_by.to_string()],
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    /// `picked -> verified`, recording the hand-over and folding it into
    /// the analytics totals.
    ///
    /// `transaction.donor_id`, `receiver_id` and `volunteer_id` are filled
    /// in from the store; the caller only supplies the id, timestamps and
    /// impact figures.
    pub fn verify_donation(&self, donation_id: Uuid, mut transaction: Transaction) -> Result<VerifyOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let did = donation_id.to_string();

            let row: Option<(String, String, Option<String>)> = tx
                .query_row(
                    "SELECT status, donor_id, picked_by FROM donations WHERE id = ?1",
                    [&did],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let Some((status, donor_id, picked_by)) = row else {
                return Ok(VerifyOutcome::DonationNotFound);
            };
            let status: DonationStatus = status.parse()?;
            if status != DonationStatus::Picked {
                return Ok(VerifyOutcome::NotPicked(status));
            }

            let Some(accepted) = query_accepted_request(&tx, &did)? else {
                return Ok(VerifyOutcome::NoReceiver);
            };

            let donor_id: Uuid = donor_id.parse()?;
            let picked_by = picked_by.map(|id| id.parse::<Uuid>()).transpose()?;
            transaction.donation_id = donation_id;
            transaction.donor_id = donor_id;
            transaction.receiver_id = accepted.receiver_id;
            // Only record a volunteer when someone other than the two parties collected it.
            transaction.volunteer_id =
                picked_by.filter(|id| *id != donor_id && *id != accepted.receiver_id);

            let completed = format_timestamp(transaction.completed_at);
            move_donation(&tx, &did, DonationStatus::Picked, DonationStatus::Verified, &completed)?;

            tx.execute(
                "INSERT INTO transactions (id, donation_id, donor_id, receiver_id, volunteer_id, completed_at,
                                           feedback, rating, food_saved_kg, co2_saved_kg, people_served)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    transaction.id.to_string(),
                    did,
                    transaction.donor_id.to_string(),
                    transaction.receiver_id.to_string(),
                    transaction.volunteer_id.map(|id| id.to_string()),
                    completed,
                    transaction.feedback,
                    transaction.rating,
                    transaction.food_saved_kg,
                    transaction.co2_saved_kg,
                    transaction.people_served,
                ],
            )?;

            tx.execute(
                "UPDATE analytics SET
                    total_transactions = total_transactions + 1,
                    food_saved_total_kg = food_saved_total_kg + ?1,
                    co2_saved_total_kg = co2_saved_total_kg + ?2,
                    people_served_total = people_served_total + ?3,
                    last_updated = ?4
                 WHERE id = 'global'",
                params![
                    transaction.food_saved_kg,
                    transaction.co2_saved_kg,
                    transaction.people_served.unwrap_or(0),
                    completed,
                ],
            )?;

            tx.commit()?;
            Ok(VerifyOutcome::Recorded(transaction))
        })
    }

    /// Expire open or accepted donations whose pickup deadline has passed.
    /// Returns how many were expired.
    pub fn expire_overdue_donations(&self, now: DateTime<Utc>) -> Result<usize> {
        let count = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let at = format_timestamp(now);

            let mut changed = 0;
            for from in [DonationStatus::Pending, DonationStatus::Accepted] {
                check_donation_transition(from, DonationStatus::Expired)?;
                changed += tx.execute(
                    "UPDATE donations SET status = ?2, updated_at = ?1
                     WHERE status = ?3 AND pickup_deadline < ?1",
                    params![at, DonationStatus::Expired.as_str(), from.as_str()],
                )?;
            }

            tx.commit()?;
            Ok(changed)
        })?;

        if count > 0 {
            info!("Expired {} donations past their pickup deadline", count);
        }
        Ok(count)
    }
}
