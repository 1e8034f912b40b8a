//! Household pet food purchase rotation.
//!
//! Tracks whose turn it is to buy wet and dry food, records purchases and
//! reports when each food type is due again. State lives either in a local
//! JSON file or in a shared SQLite database whose writes are pushed to every
//! connected store.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod rotation;
pub mod store;
