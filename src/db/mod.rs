//! Storage seam for bookings, reviews and rating summaries.
//!
//! `MongoRepository` is the production backend. `InMemoryRepository` keeps the
//! same guarantees (unique booking reference per review, compare-and-set
//! booking transitions, atomic single-review updates) in process memory.

mod memory;
mod mongo;

pub use memory::InMemoryRepository;
pub use mongo::MongoRepository;

use std::sync::Arc;

use mongodb::bson::{oid::ObjectId, DateTime};
use mongodb::Client;
use rocket::fairing::AdHoc;
use thiserror::Error;

use crate::models::{Booking, BookingStatus, ProviderRating, Review, ReviewChange};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Status change applied to a booking.
#[derive(Debug, Clone)]
pub struct BookingTransition {
    pub to: BookingStatus,
    pub at: DateTime,
    pub cancelled_by: Option<ObjectId>,
    pub reason: Option<String>,
}

impl BookingTransition {
    pub fn to(to: BookingStatus, at: DateTime) -> Self {
        BookingTransition {
            to,
            at,
            cancelled_by: None,
            reason: None,
        }
    }

    pub fn apply(&self, booking: &mut Booking) {
        booking.status = self.to;
        booking.updated_at = crate::utils::later_of(booking.updated_at, self.at);
        if self.to == BookingStatus::Cancelled {
            booking.cancelled_by = self.cancelled_by;
            booking.cancellation_reason = self.reason.clone();
        }
    }
}

/// Selects reviews for listings, aggregation and the moderation queue.
#[derive(Debug, Clone, Default)]
pub struct ReviewQuery {
    pub provider_id: Option<ObjectId>,
    pub visible_only: bool,
    pub exclude_reported: bool,
    pub reported_only: bool,
}

impl ReviewQuery {
    pub fn matches(&self, review: &Review) -> bool {
        if let Some(provider_id) = &self.provider_id {
            if review.provider_id != *provider_id {
                return false;
            }
        }
        if self.visible_only && !review.is_visible {
            return false;
        }
        if self.exclude_reported && review.reported {
            return false;
        }
        if self.reported_only && !review.reported {
            return false;
        }
        true
    }
}

/// Offset pagination. `limit: None` returns every remaining match.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub skip: u64,
    pub limit: Option<i64>,
}

impl Page {
    pub fn all() -> Self {
        Page::default()
    }

    /// Offsets past the end of the collection saturate instead of
    /// overflowing; such a page is simply empty.
    pub fn new(page: i64, limit: i64) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        Page {
            skip: (page - 1).saturating_mul(limit) as u64,
            limit: Some(limit),
        }
    }
}

/// Repository trait for bookings, reviews and derived rating summaries.
///
/// Listings are ordered most recent first by `created_at`, ties broken by id
/// (descending), so the same query and page always return the same slice.
#[rocket::async_trait]
pub trait Repository: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn find_booking(&self, id: &ObjectId) -> Result<Option<Booking>, StoreError>;

    /// Applies `transition` only if the stored status is one of `from`.
    /// Returns the booking before and after, or `None` when nothing matched.
    async fn transition_booking(
        &self,
        id: &ObjectId,
        from: &[BookingStatus],
        transition: &BookingTransition,
    ) -> Result<Option<(Booking, Booking)>, StoreError>;

    /// Fails with `StoreError::Duplicate` if a review already references
    /// the same booking.
    async fn insert_review(&self, review: &Review) -> Result<(), StoreError>;

    async fn find_review(&self, id: &ObjectId) -> Result<Option<Review>, StoreError>;

    async fn find_review_by_booking(&self, booking_id: &ObjectId) -> Result<Option<Review>, StoreError>;

    /// Atomically applies `change`, returning the record before and after.
    async fn update_review(
        &self,
        id: &ObjectId,
        change: &ReviewChange,
    ) -> Result<Option<(Review, Review)>, StoreError>;

    async fn find_reviews(&self, query: &ReviewQuery, page: Page) -> Result<Vec<Review>, StoreError>;

    async fn count_reviews(&self, query: &ReviewQuery) -> Result<u64, StoreError>;

    /// Replaces the whole stored summary for the provider, unless the stored
    /// one has a `computed_at` at or after this one. Returns whether the
    /// write landed.
    async fn put_rating(&self, rating: &ProviderRating) -> Result<bool, StoreError>;

    async fn find_rating(&self, provider_id: &ObjectId) -> Result<Option<ProviderRating>, StoreError>;
}

pub type DbConn = Arc<dyn Repository>;

pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(repository) => {
                log::info!("✓ MongoDB connected successfully");
                Ok(crate::services::manage(rocket, Arc::new(repository)))
            }
            Err(e) => {
                log::error!("✗ Failed to connect to MongoDB: {}", e);
                Err(rocket)
            }
        }
    })
}

async fn connect() -> Result<MongoRepository, StoreError> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    let repository = MongoRepository::new(client.database(&crate::config::Config::database_name()));
    repository.ensure_indexes().await?;
    Ok(repository)
}
