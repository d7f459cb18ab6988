//! Types shared between the database and the API.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
