use zerowaste_types::models::{DonationStatus, RequestStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("donation cannot move from {from} to {to}")]
    Donation {
        from: DonationStatus,
        to: DonationStatus,
    },
    #[error("request has already been {0}")]
    AlreadyDecided(RequestStatus),
    #[error("'{0}' is not a valid decision")]
    NotADecision(RequestStatus),
}

/// Position along `pending -> accepted -> picked -> verified`.
/// `Expired` is off the chain and has no position.
pub fn donation_rank(status: DonationStatus) -> Option<u8> {
    match status {
        DonationStatus::Pending => Some(0),
        DonationStatus::Accepted => Some(1),
        DonationStatus::Picked => Some(2),
        DonationStatus::Verified => Some(3),
        DonationStatus::Expired => None,
    }
}

pub fn is_terminal(status: DonationStatus) -> bool {
    matches!(status, DonationStatus::Verified | DonationStatus::Expired)
}

/// Allowed donation moves: one step forward along the chain, or to
/// `Expired` from `Pending`/`Accepted`.
pub fn check_donation_transition(
    from: DonationStatus,
    to: DonationStatus,
) -> Result<(), TransitionError> {
    if is_terminal(from) {
        return Err(TransitionError::Donation { from, to });
    }

    let allowed = match (donation_rank(from), donation_rank(to)) {
        (Some(a), Some(b)) => b == a + 1,
        // Expiry only before pickup.
        (Some(a), None) => a <= 1,
        (None, _) => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(TransitionError::Donation { from, to })
    }
}

/// A request is decided exactly once, and only to accepted/rejected.
pub fn check_request_decision(
    current: RequestStatus,
    outcome: RequestStatus,
) -> Result<(), TransitionError> {
    if outcome == RequestStatus::Pending {
        return Err(TransitionError::NotADecision(outcome));
    }
    if current != RequestStatus::Pending {
        return Err(TransitionError::AlreadyDecided(current));
    }
    Ok(())
}
