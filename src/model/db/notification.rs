use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::status::NotificationKind, mongodb::Id};

/// An outbox entry for the notification service, written in the same
/// transaction as the round result it reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: Id,
    pub user_id: Id,
    pub kind: NotificationKind,
    pub race_id: Id,
    pub round_number: u32,
    pub message: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(
        user_id: Id,
        kind: NotificationKind,
        race_id: Id,
        round_number: u32,
        message: String,
    ) -> Self {
        Self {
            id: Id::new(),
            user_id,
            kind,
            race_id,
            round_number,
            message,
            created_at: Utc::now(),
            read: false,
        }
    }
}
