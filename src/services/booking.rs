//! Booking lifecycle: pending -> accepted -> completed, with cancelled
//! reachable from pending or accepted. Every transition is a
//! compare-and-set on the stored status, so two callers racing on the same
//! booking cannot both win.

use std::sync::Arc;

use mongodb::bson::{oid::ObjectId, DateTime};

use super::error::{ServiceError, ServiceResult};
use crate::db::{BookingTransition, Repository};
use crate::models::{Booking, BookingStatus, Role};
use crate::utils::{optional_text, parse_rfc3339};

pub const MAX_NOTES_LEN: u64 = 1000;
pub const MAX_CANCEL_REASON_LEN: u64 = 500;

/// Input for a new booking, already resolved to ids.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub provider_id: ObjectId,
    pub provider_profile_id: ObjectId,
    pub scheduled_at: Option<String>,
    pub notes: Option<String>,
}

pub struct BookingService {
    repo: Arc<dyn Repository>,
}

impl BookingService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        BookingService { repo }
    }

    pub async fn create_booking(
        &self,
        client_id: ObjectId,
        role: Role,
        input: NewBooking,
    ) -> ServiceResult<Booking> {
        if role != Role::Client {
            return Err(ServiceError::Authorization("Only clients can create bookings".to_string()));
        }
        if input.provider_id == client_id {
            return Err(ServiceError::Validation("You cannot book yourself".to_string()));
        }
        optional_text("Notes", input.notes.as_deref(), MAX_NOTES_LEN)?;
        let scheduled_at = input
            .scheduled_at
            .as_deref()
            .map(|value| parse_rfc3339(value, "scheduled_at"))
            .transpose()?;

        let now = DateTime::now();
        let booking = Booking {
            id: ObjectId::new(),
            client_id,
            provider_id: input.provider_id,
            provider_profile_id: input.provider_profile_id,
            status: BookingStatus::Pending,
            scheduled_at,
            notes: input.notes,
            cancellation_reason: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert_booking(&booking).await?;

        log::info!(
            "Booking {} created by client {} for provider {}",
            booking.id,
            client_id,
            booking.provider_id
        );
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: &ObjectId, caller_id: &ObjectId, role: Role) -> ServiceResult<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.involves(caller_id) && !role.can_moderate() {
            return Err(ServiceError::Authorization("Not authorized to view this booking".to_string()));
        }
        Ok(booking)
    }

    pub async fn accept_booking(&self, booking_id: &ObjectId, provider_id: &ObjectId) -> ServiceResult<Booking> {
        let booking = self.load(booking_id).await?;
        if booking.provider_id != *provider_id {
            return Err(ServiceError::Authorization("Only the booked provider can accept".to_string()));
        }
        self.transition(&booking, BookingTransition::to(BookingStatus::Accepted, DateTime::now()))
            .await
    }

    /// Service-completion confirmation by the provider. This is the only
    /// transition that makes a booking reviewable.
    pub async fn complete_booking(&self, booking_id: &ObjectId, provider_id: &ObjectId) -> ServiceResult<Booking> {
        let booking = self.load(booking_id).await?;
        if booking.provider_id != *provider_id {
            return Err(ServiceError::Authorization("Only the booked provider can complete".to_string()));
        }
        self.transition(&booking, BookingTransition::to(BookingStatus::Completed, DateTime::now()))
            .await
    }

    pub async fn cancel_booking(
        &self,
        booking_id: &ObjectId,
        caller_id: &ObjectId,
        reason: Option<String>,
    ) -> ServiceResult<Booking> {
        let booking = self.load(booking_id).await?;
        if !booking.involves(caller_id) {
            return Err(ServiceError::Authorization("Not authorized to cancel this booking".to_string()));
        }
        optional_text("Cancellation reason", reason.as_deref(), MAX_CANCEL_REASON_LEN)?;

        let transition = BookingTransition {
            to: BookingStatus::Cancelled,
            at: DateTime::now(),
            cancelled_by: Some(*caller_id),
            reason,
        };
        self.transition(&booking, transition).await
    }

    /// True iff the booking is completed and no review references it yet.
    pub async fn is_reviewable(&self, booking_id: &ObjectId) -> ServiceResult<bool> {
        let booking = self.load(booking_id).await?;
        if booking.status != BookingStatus::Completed {
            return Ok(false);
        }
        Ok(self.repo.find_review_by_booking(booking_id).await?.is_none())
    }

    async fn load(&self, booking_id: &ObjectId) -> ServiceResult<Booking> {
        self.repo
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))
    }

    async fn transition(&self, booking: &Booking, transition: BookingTransition) -> ServiceResult<Booking> {
        let target = transition.to;
        if booking.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Booking is already {}",
                booking.status.as_str()
            )));
        }
        if !booking.status.can_transition_to(target) {
            return Err(ServiceError::Conflict(format!(
                "Booking is {} and cannot become {}",
                booking.status.as_str(),
                target.as_str()
            )));
        }

        let sources = BookingStatus::sources_of(target);
        match self.repo.transition_booking(&booking.id, &sources, &transition).await? {
            Some((before, updated)) => {
                log::info!(
                    "Booking {} moved {} -> {}",
                    updated.id,
                    before.status.as_str(),
                    updated.status.as_str()
                );
                Ok(updated)
            }
            // Someone else moved it between our read and our write.
            None => Err(ServiceError::Conflict(
                "Booking was modified concurrently; reload and retry".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryRepository;

    struct Fixture {
        service: BookingService,
        client: ObjectId,
        provider: ObjectId,
    }

    fn fixture() -> Fixture {
        Fixture {
            service: BookingService::new(Arc::new(InMemoryRepository::new())),
            client: ObjectId::new(),
            provider: ObjectId::new(),
        }
    }

    fn new_booking(provider: ObjectId) -> NewBooking {
        NewBooking {
            provider_id: provider,
            provider_profile_id: ObjectId::new(),
            scheduled_at: Some("2026-11-01T09:30:00Z".to_string()),
            notes: Some("Second floor".to_string()),
        }
    }

    #[tokio::test]
    async fn test_happy_path_to_completed() {
        let f = fixture();
        let booking = f
            .service
            .create_booking(f.client, Role::Client, new_booking(f.provider))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(!f.service.is_reviewable(&booking.id).await.unwrap());

        let accepted = f.service.accept_booking(&booking.id, &f.provider).await.unwrap();
        assert_eq!(accepted.status, BookingStatus::Accepted);
        assert!(!f.service.is_reviewable(&booking.id).await.unwrap());

        let completed = f.service.complete_booking(&booking.id, &f.provider).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        assert!(completed.updated_at >= completed.created_at);
        assert!(f.service.is_reviewable(&booking.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cannot_complete_pending() {
        let f = fixture();
        let booking = f
            .service
            .create_booking(f.client, Role::Client, new_booking(f.provider))
            .await
            .unwrap();
        let err = f.service.complete_booking(&booking.id, &f.provider).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cancelled_is_terminal() {
        let f = fixture();
        let booking = f
            .service
            .create_booking(f.client, Role::Client, new_booking(f.provider))
            .await
            .unwrap();
        let cancelled = f
            .service
            .cancel_booking(&booking.id, &f.client, Some("Plans changed".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(f.client));
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Plans changed"));

        let err = f.service.accept_booking(&booking.id, &f.provider).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let err = f.service.cancel_booking(&booking.id, &f.provider, None).await.unwrap_err();
        match err {
            ServiceError::Conflict(message) => assert_eq!(message, "Booking is already cancelled"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completed_cannot_be_cancelled() {
        let f = fixture();
        let booking = f
            .service
            .create_booking(f.client, Role::Client, new_booking(f.provider))
            .await
            .unwrap();
        f.service.accept_booking(&booking.id, &f.provider).await.unwrap();
        f.service.complete_booking(&booking.id, &f.provider).await.unwrap();

        let err = f.service.cancel_booking(&booking.id, &f.client, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_only_the_booked_provider_transitions() {
        let f = fixture();
        let booking = f
            .service
            .create_booking(f.client, Role::Client, new_booking(f.provider))
            .await
            .unwrap();

        let stranger = ObjectId::new();
        let err = f.service.accept_booking(&booking.id, &stranger).await.unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));
        let err = f.service.accept_booking(&booking.id, &f.client).await.unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));
        let err = f.service.cancel_booking(&booking.id, &stranger, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_create_requires_client_role() {
        let f = fixture();
        let err = f
            .service
            .create_booking(f.client, Role::Provider, new_booking(f.provider))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let f = fixture();
        let mut input = new_booking(f.provider);
        input.scheduled_at = Some("next tuesday".to_string());
        let err = f.service.create_booking(f.client, Role::Client, input).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut input = new_booking(f.provider);
        input.notes = Some("x".repeat(1001));
        let err = f.service.create_booking(f.client, Role::Client, input).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_booking_visibility() {
        let f = fixture();
        let booking = f
            .service
            .create_booking(f.client, Role::Client, new_booking(f.provider))
            .await
            .unwrap();

        assert!(f.service.get_booking(&booking.id, &f.client, Role::Client).await.is_ok());
        assert!(f.service.get_booking(&booking.id, &f.provider, Role::Provider).await.is_ok());
        assert!(f.service.get_booking(&booking.id, &ObjectId::new(), Role::Admin).await.is_ok());
        let err = f
            .service
            .get_booking(&booking.id, &ObjectId::new(), Role::Client)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Authorization(_)));

        let err = f
            .service
            .get_booking(&ObjectId::new(), &f.client, Role::Client)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_racing_accept_and_cancel_stay_coherent() {
        let f = fixture();
        let booking = f
            .service
            .create_booking(f.client, Role::Client, new_booking(f.provider))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            f.service.accept_booking(&booking.id, &f.provider),
            f.service.cancel_booking(&booking.id, &f.client, None),
        );
        // Either order is legal (accept then cancel, or cancel then a
        // rejected accept); what matters is the stored state is coherent.
        let stored = f.service.get_booking(&booking.id, &f.client, Role::Client).await.unwrap();
        match (a, b) {
            (Ok(_), Ok(_)) => assert_eq!(stored.status, BookingStatus::Cancelled),
            (Err(ServiceError::Conflict(_)), Ok(_)) => assert_eq!(stored.status, BookingStatus::Cancelled),
            (Ok(_), Err(ServiceError::Conflict(_))) => assert_eq!(stored.status, BookingStatus::Accepted),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
