use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::utils::format_datetime;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// pending -> accepted -> completed, with cancelled reachable from
    /// pending or accepted.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Accepted, Completed) | (Pending, Cancelled) | (Accepted, Cancelled)
        )
    }

    /// Every status from which `next` may be entered.
    pub fn sources_of(next: BookingStatus) -> Vec<BookingStatus> {
        [
            BookingStatus::Pending,
            BookingStatus::Accepted,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ]
        .into_iter()
        .filter(|status| status.can_transition_to(next))
        .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub client_id: ObjectId,
    pub provider_id: ObjectId,
    pub provider_profile_id: ObjectId,
    pub status: BookingStatus,
    pub scheduled_at: Option<DateTime>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Booking {
    pub fn involves(&self, user_id: &ObjectId) -> bool {
        self.client_id == *user_id || self.provider_id == *user_id
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBookingDto {
    pub provider_id: String,
    pub provider_profile_id: String,
    /// RFC 3339 timestamp
    pub scheduled_at: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CancelBookingDto {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BookingResponse {
    pub id: String,
    pub client_id: String,
    pub provider_id: String,
    pub provider_profile_id: String,
    pub status: BookingStatus,
    pub scheduled_at: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        BookingResponse {
            id: booking.id.to_hex(),
            client_id: booking.client_id.to_hex(),
            provider_id: booking.provider_id.to_hex(),
            provider_profile_id: booking.provider_profile_id.to_hex(),
            status: booking.status,
            scheduled_at: booking.scheduled_at.map(format_datetime),
            notes: booking.notes,
            cancellation_reason: booking.cancellation_reason,
            created_at: format_datetime(booking.created_at),
            updated_at: format_datetime(booking.updated_at),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewableResponse {
    pub booking_id: String,
    pub reviewable: bool,
}
