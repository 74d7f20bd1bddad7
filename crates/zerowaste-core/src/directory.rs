use chrono::{DateTime, Utc};
use tracing::debug;
use zerowaste_types::models::{Coordinates, Donation, DonationStatus};

use crate::geo::haversine_km;
use crate::visibility::VisibilityFilter;

/// Anything that can list the donations currently open for requests.
pub trait DonationSource {
    type Error;

    /// Every donation whose status is `pending`.
    fn open_donations(&self) -> Result<Vec<Donation>, Self::Error>;
}

/// A donation that passed the filter, with its distance from the viewer.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    pub donation: &'a Donation,
    pub distance_km: Option<f64>,
}

/// Snapshot of open donations for one viewer.
///
/// Built per request; `refresh` throws the previous list away.
#[derive(Debug, Default)]
pub struct DonationDirectory {
    donations: Vec<Donation>,
    filter: VisibilityFilter,
    viewer: Option<Coordinates>,
}

impl DonationDirectory {
    pub fn new(filter: VisibilityFilter, viewer: Option<Coordinates>) -> Self {
        Self {
            donations: Vec::new(),
            filter,
            viewer,
        }
    }

    /// Replace the snapshot with a fresh read. Donations whose pickup
    /// deadline has passed are dropped even before the sweep expires them.
    /// On error the previous snapshot is kept.
    pub fn refresh<S: DonationSource>(
        &mut self,
        source: &S,
        now: DateTime<Utc>,
    ) -> Result<usize, S::Error> {
        let mut donations = source.open_donations()?;
        donations.retain(|d| d.status == DonationStatus::Pending && d.pickup_deadline > now);
        debug!("Directory refreshed with {} open donations", donations.len());
        self.donations = donations;
        Ok(self.donations.len())
    }

    pub fn len(&self) -> usize {
        self.donations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.donations.is_empty()
    }

    /// Donations passing the current filter. Nearest first when the viewer
    /// position is known, otherwise soonest pickup deadline first.
    pub fn visible(&self, now: DateTime<Utc>) -> Vec<Match<'_>> {
        let mut matches: Vec<Match<'_>> = self
            .donations
            .iter()
            .filter(|d| self.filter.matches(d, self.viewer, now))
            .map(|donation| Match {
                donation,
                distance_km: self
                    .viewer
                    .map(|viewer| haversine_km(viewer, donation.location.coordinates())),
            })
            .collect();

        if self.viewer.is_some() {
            matches.sort_by(|a, b| {
                a.distance_km
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.distance_km.unwrap_or(f64::INFINITY))
            });
        } else {
            matches.sort_by_key(|m| m.donation.pickup_deadline);
        }

        matches
    }
}
