//! ZeroWaste matching core
//!
//! Pure logic shared by the store and the HTTP layer: distance, the
//! visibility predicate used by the donation map, marker urgency, and the
//! donation/request status lifecycle.
//!
//! Nothing in here performs I/O except through the `DonationSource` trait.

pub mod directory;
pub mod geo;
pub mod lifecycle;
pub mod urgency;
pub mod visibility;

#[cfg(test)]
pub(crate) mod fixtures;
