use serde::{Deserialize, Serialize};

use sqlx::prelude::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, FromRow)]
pub struct BookingMessage {
    pub message_id: Uuid,
    pub booking_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub file_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    pub read: bool,
}

#[derive(Deserialize)]
pub struct SendMessageReq {
    pub content: Option<String>,
    pub file_url: Option<String>,
}
