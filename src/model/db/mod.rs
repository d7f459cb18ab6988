//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Relationships between members and races ("edges") are their own
//!   documents, each guarded by a unique compound index.

pub mod admin;
pub mod ballot;
pub mod candidacy;
pub mod convention;
pub mod elimination;
pub mod idea;
pub mod location;
pub mod member;
pub mod nomination;
pub mod notification;
pub mod race;
pub mod round;
