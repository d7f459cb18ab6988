//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as timestamps.
//! - Field names are camelCase.

pub mod auth;
pub mod convention;
pub mod id;
pub mod nomination;
pub mod race;
pub mod voting;
