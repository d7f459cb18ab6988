use mongodb::{error::UNKNOWN_TRANSACTION_COMMIT_RESULT, Client, ClientSession};

use crate::error::{Error, Result};

use super::errors::is_transient_transaction_error;

/// How many times a transaction body is run before giving up with a conflict.
pub const MAX_TRANSACTION_ATTEMPTS: usize = 8;

/// How many times a commit with an unknown outcome is re-sent.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// A unit of work that must be applied atomically.
///
/// The body may be run more than once: a transient transaction error (e.g. a
/// write conflict with a concurrent transaction touching the same documents)
/// aborts the attempt and the body is re-run from scratch against a fresh
/// snapshot. Bodies must therefore derive everything they write from what they
/// read through the session.
#[rocket::async_trait]
pub trait Transaction: Sync {
    type Output: Send;

    /// Name used in logs.
    const NAME: &'static str;

    async fn run(&self, session: &mut ClientSession) -> Result<Self::Output>;
}

/// Run the given transaction to completion, retrying transient failures.
pub async fn run_transaction<T: Transaction>(db_client: &Client, txn: &T) -> Result<T::Output> {
    let mut session = db_client.start_session(None).await?;

    for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
        session.start_transaction(None).await?;

        let output = match txn.run(&mut session).await {
            Ok(output) => output,
            Err(Error::Db(err)) if is_transient_transaction_error(&err) => {
                debug!("{}: attempt {attempt} hit a transient error: {err}", T::NAME);
                let _ = session.abort_transaction().await;
                continue;
            }
            Err(err) => {
                let _ = session.abort_transaction().await;
                return Err(err);
            }
        };

        let mut commit_attempt = 0;
        loop {
            commit_attempt += 1;
            match session.commit_transaction().await {
                Ok(()) => return Ok(output),
                Err(err)
                    if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                        && commit_attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    debug!("{}: commit outcome unknown, re-sending: {err}", T::NAME);
                }
                Err(err) if is_transient_transaction_error(&err) => {
                    debug!("{}: attempt {attempt} failed to commit: {err}", T::NAME);
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    warn!(
        "{}: gave up after {MAX_TRANSACTION_ATTEMPTS} conflicting attempts",
        T::NAME
    );
    Err(Error::conflict(
        "The operation conflicted with concurrent changes; please try again",
    ))
}
