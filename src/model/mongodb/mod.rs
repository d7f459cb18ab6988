mod bson;
mod collection;
mod errors;
mod transaction;

pub use bson::{serde_optional_datetime, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use errors::{is_duplicate_key_error, is_transient_transaction_error, DUPLICATE_KEY};
pub use transaction::{run_transaction, Transaction, MAX_TRANSACTION_ATTEMPTS};
