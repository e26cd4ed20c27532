//! counsel-desk: backend for a legal-services marketplace.
//!
//! Clients find attorneys in the directory, book hourly or fixed-fee
//! consultations on an attorney's calendar, and then work with the attorney
//! inside a matter (messages and shared files). Reviews feed the attorney's
//! public rating.
//!
//! Layers, bottom-up:
//! - `db`: `Database` trait with libSQL and in-memory backends
//! - `booking`, `directory`, `workspace`: services holding the business rules
//! - `web`: axum JSON API over the services

pub mod booking;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod settings;
pub mod web;
pub mod workspace;

#[cfg(test)]
mod testing;
