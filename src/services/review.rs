//! Review records: creation gated on a completed booking, provider
//! responses, user reports, and moderation. Every mutation that can change
//! a provider's visible-review set is followed by a full rating recompute.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use mongodb::bson::{oid::ObjectId, DateTime};
use validator::Validate;

use super::error::{ServiceError, ServiceResult};
use super::moderation::{reported_queue, ModerationPolicy};
use super::rating;
use crate::db::{Page, Repository, ReviewQuery, StoreError};
use crate::models::{
    BookingStatus, ProviderRating, RatingSummary, Review, ReviewCategories, ReviewChange,
    ReviewInput, Role, Score, MAX_MODERATION_NOTE_LEN, MAX_REPORT_REASON_LEN, MAX_RESPONSE_LEN,
};
use crate::utils::{optional_text, require_text, validation_message};

/// Strictly increasing timestamps for rating snapshots. A snapshot stamped
/// before another one was also read before it.
#[derive(Default)]
struct SnapshotClock {
    last: AtomicI64,
}

impl SnapshotClock {
    fn next(&self) -> DateTime {
        let now = DateTime::now().timestamp_millis();
        let prev = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        DateTime::from_millis(now.max(prev + 1))
    }
}

pub struct ReviewService {
    repo: Arc<dyn Repository>,
    policy: ModerationPolicy,
    clock: SnapshotClock,
}

impl ReviewService {
    pub fn new(repo: Arc<dyn Repository>, policy: ModerationPolicy) -> Self {
        ReviewService {
            repo,
            policy,
            clock: SnapshotClock::default(),
        }
    }

    pub async fn create_review(
        &self,
        booking_id: &ObjectId,
        client_id: &ObjectId,
        input: ReviewInput,
    ) -> ServiceResult<Review> {
        let booking = self
            .repo
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))?;

        if booking.client_id != *client_id {
            return Err(ServiceError::Authorization(
                "Only the client on this booking can review it".to_string(),
            ));
        }
        if booking.status != BookingStatus::Completed {
            return Err(ServiceError::Conflict(format!(
                "Booking is {}; only completed bookings can be reviewed",
                booking.status.as_str()
            )));
        }
        if self.repo.find_review_by_booking(booking_id).await?.is_some() {
            return Err(ServiceError::Conflict(
                "A review already exists for this booking".to_string(),
            ));
        }

        let (rating, categories) = validate_review_input(&input)?;

        let now = DateTime::now();
        let review = Review {
            id: ObjectId::new(),
            booking_id: booking.id,
            client_id: booking.client_id,
            provider_id: booking.provider_id,
            provider_profile_id: booking.provider_profile_id,
            rating,
            comment: input.comment,
            categories,
            // The booking is completed, so the reviewer demonstrably used the service.
            is_verified: true,
            is_visible: true,
            moderated_by: None,
            moderated_at: None,
            moderation_note: None,
            provider_response: None,
            provider_response_at: None,
            reported: false,
            report_reason: None,
            reported_by: None,
            created_at: now,
            updated_at: now,
        };

        // The unique index on booking_id settles races that slipped past the
        // lookup above.
        match self.repo.insert_review(&review).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(ServiceError::Conflict(
                    "A review already exists for this booking".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        log::info!(
            "Review {} created for booking {} (provider {}, rating {})",
            review.id,
            review.booking_id,
            review.provider_id,
            review.rating
        );
        self.refresh_rating(&review.provider_id).await;
        Ok(review)
    }

    /// Sets or replaces the provider's public reply.
    pub async fn attach_provider_response(
        &self,
        review_id: &ObjectId,
        provider_id: &ObjectId,
        text: String,
    ) -> ServiceResult<Review> {
        let review = self.load(review_id).await?;
        if review.provider_id != *provider_id {
            return Err(ServiceError::Authorization(
                "Only the reviewed provider can respond".to_string(),
            ));
        }
        require_text("Response", &text, MAX_RESPONSE_LEN)?;

        let change = ReviewChange::ProviderResponse {
            text,
            at: DateTime::now(),
        };
        let (_, updated) = self.apply(review_id, &change).await?;
        log::info!("Provider {} responded to review {}", provider_id, review_id);
        Ok(updated)
    }

    /// Flags a review for moderator attention. Visibility is untouched.
    pub async fn report_review(
        &self,
        review_id: &ObjectId,
        reporter_id: &ObjectId,
        reason: String,
    ) -> ServiceResult<Review> {
        require_text("Report reason", &reason, MAX_REPORT_REASON_LEN)?;
        let review = self.load(review_id).await?;
        if !review.is_visible {
            return Err(ServiceError::NotFound("Review not found".to_string()));
        }

        let change = ReviewChange::Report {
            reporter_id: *reporter_id,
            reason,
            at: DateTime::now(),
        };
        let (_, updated) = self.apply(review_id, &change).await?;
        log::info!("Review {} reported by {}", review_id, reporter_id);
        Ok(updated)
    }

    /// Closes an open report without touching visibility.
    pub async fn resolve_report(
        &self,
        review_id: &ObjectId,
        moderator_id: &ObjectId,
        role: Role,
    ) -> ServiceResult<Review> {
        require_moderator(role)?;
        let review = self.load(review_id).await?;
        if !review.reported {
            return Err(ServiceError::Conflict("Review has no open report".to_string()));
        }

        let change = ReviewChange::ResolveReport {
            moderator_id: *moderator_id,
            at: DateTime::now(),
        };
        let (_, updated) = self.apply(review_id, &change).await?;
        log::info!("Report on review {} resolved by {}", review_id, moderator_id);
        Ok(updated)
    }

    pub async fn moderate_review(
        &self,
        review_id: &ObjectId,
        moderator_id: &ObjectId,
        role: Role,
        set_visible: bool,
        reason: Option<String>,
    ) -> ServiceResult<Review> {
        require_moderator(role)?;
        optional_text("Moderation reason", reason.as_deref(), MAX_MODERATION_NOTE_LEN)?;

        let change = ReviewChange::Moderate {
            visible: set_visible,
            moderator_id: *moderator_id,
            note: reason,
            at: DateTime::now(),
        };
        let (before, updated) = self.apply(review_id, &change).await?;
        log::info!(
            "Review {} moderated by {} (visible: {} -> {})",
            review_id,
            moderator_id,
            before.is_visible,
            updated.is_visible
        );

        if before.is_visible != updated.is_visible {
            self.refresh_rating(&updated.provider_id).await;
        }
        Ok(updated)
    }

    /// A single review as the caller may see it. Suppressed reviews are only
    /// readable by moderators.
    pub async fn get_review(&self, review_id: &ObjectId, role: Role) -> ServiceResult<Review> {
        let review = self.load(review_id).await?;
        if role.can_moderate() || self.policy.is_publicly_visible(&review) {
            Ok(review)
        } else {
            Err(ServiceError::NotFound("Review not found".to_string()))
        }
    }

    /// Publicly visible reviews for a provider, most recent first, with the
    /// total number of matches.
    pub async fn get_visible_reviews(
        &self,
        provider_id: &ObjectId,
        page: Page,
    ) -> ServiceResult<(Vec<Review>, u64)> {
        let query = self.policy.public_listing(*provider_id);
        let reviews = self.repo.find_reviews(&query, page).await?;
        let total = self.repo.count_reviews(&query).await?;
        Ok((reviews, total))
    }

    pub async fn get_reported_reviews(&self, role: Role, page: Page) -> ServiceResult<(Vec<Review>, u64)> {
        require_moderator(role)?;
        let query = reported_queue();
        let reviews = self.repo.find_reviews(&query, page).await?;
        let total = self.repo.count_reviews(&query).await?;
        Ok((reviews, total))
    }

    /// Returns the stored summary, computing one on first request. Providers
    /// without visible reviews get an empty summary that is not stored.
    pub async fn get_provider_rating_summary(&self, provider_id: &ObjectId) -> ServiceResult<RatingSummary> {
        if let Some(stored) = self.repo.find_rating(provider_id).await? {
            return Ok(stored.summary);
        }

        let snapshot = self.compute(provider_id).await?;
        if snapshot.summary.review_count == 0 {
            return Ok(snapshot.summary);
        }
        if let Err(e) = self.repo.put_rating(&snapshot).await {
            log::warn!("Could not cache rating for provider {}: {}", provider_id, e);
        }
        Ok(snapshot.summary)
    }

    /// Rebuilds the provider's summary from its visible reviews and replaces
    /// the stored copy. On failure the previous copy is left as it was. If a
    /// snapshot taken later has already been stored, that one is kept and
    /// returned instead.
    pub async fn recompute_provider_rating(&self, provider_id: &ObjectId) -> ServiceResult<RatingSummary> {
        let snapshot = self.compute(provider_id).await?;
        if self.repo.put_rating(&snapshot).await? {
            return Ok(snapshot.summary);
        }

        log::debug!(
            "Rating snapshot for provider {} superseded by a newer one",
            provider_id
        );
        Ok(self
            .repo
            .find_rating(provider_id)
            .await?
            .map(|stored| stored.summary)
            .unwrap_or(snapshot.summary))
    }

    /// Stamps the snapshot before reading, so that a read which misses a
    /// commit always carries an older stamp than the recompute that follows
    /// that commit.
    async fn compute(&self, provider_id: &ObjectId) -> ServiceResult<ProviderRating> {
        let computed_at = self.clock.next();
        let query = ReviewQuery {
            provider_id: Some(*provider_id),
            visible_only: true,
            ..Default::default()
        };
        let reviews = self.repo.find_reviews(&query, Page::all()).await?;
        Ok(ProviderRating {
            provider_id: *provider_id,
            summary: rating::aggregate(&reviews),
            computed_at,
        })
    }

    /// Post-commit recompute. The write it follows has already succeeded, so
    /// a failure here only leaves a stale summary behind.
    async fn refresh_rating(&self, provider_id: &ObjectId) {
        if let Err(e) = self.recompute_provider_rating(provider_id).await {
            log::warn!(
                "Rating recompute for provider {} failed, keeping previous summary: {}",
                provider_id,
                e
            );
        }
    }

    async fn load(&self, review_id: &ObjectId) -> ServiceResult<Review> {
        self.repo
            .find_review(review_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))
    }

    async fn apply(&self, review_id: &ObjectId, change: &ReviewChange) -> ServiceResult<(Review, Review)> {
        self.repo
            .update_review(review_id, change)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))
    }
}

fn require_moderator(role: Role) -> ServiceResult<()> {
    if role.can_moderate() {
        Ok(())
    } else {
        Err(ServiceError::Authorization("Moderator access required".to_string()))
    }
}

fn validate_review_input(input: &ReviewInput) -> ServiceResult<(Score, ReviewCategories)> {
    input
        .validate()
        .map_err(|e| ServiceError::Validation(validation_message(&e)))?;

    let categories = match &input.categories {
        Some(dto) => {
            dto.validate()
                .map_err(|e| ServiceError::Validation(validation_message(&e)))?;
            ReviewCategories::try_from(dto).map_err(ServiceError::Validation)?
        }
        None => ReviewCategories::default(),
    };
    let rating = Score::try_from(input.rating).map_err(ServiceError::Validation)?;
    Ok((rating, categories))
}
