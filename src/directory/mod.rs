//! Attorney profiles and client reviews.

pub mod attorneys;
pub mod reviews;

pub use attorneys::AttorneyDirectory;
pub use reviews::{RatingSummary, ReviewLedger};
