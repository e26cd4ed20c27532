//! Consultation booking: availability, pricing, and client/matter resolution.

pub mod pricing;
pub mod reconcile;
pub mod scheduler;
pub mod slots;

pub use scheduler::{BookingReceipt, BookingRequest, Scheduler, UpcomingConsultation};
pub use slots::Slot;
