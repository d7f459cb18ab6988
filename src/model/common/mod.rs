//! Domain logic that does not depend on how it is stored or served.

pub mod outcome;
pub mod phase;
pub mod status;
