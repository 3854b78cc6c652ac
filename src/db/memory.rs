//! In-memory implementation of `Repository`.
//!
//! All state lives behind tokio `RwLock`s and is lost on restart. The
//! booking-reference index is checked and updated under the same write lock
//! as the review insert, so concurrent duplicates fail like the unique index
//! in MongoDB does.

use std::cmp::Ordering;
use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::AtomicBool;

use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::{BookingTransition, Page, Repository, ReviewQuery, StoreError};
use crate::models::{Booking, BookingStatus, ProviderRating, Review, ReviewChange};

#[derive(Default)]
struct ReviewTable {
    by_id: HashMap<ObjectId, Review>,
    /// booking id -> review id
    by_booking: HashMap<ObjectId, ObjectId>,
}

pub struct InMemoryRepository {
    bookings: RwLock<HashMap<ObjectId, Booking>>,
    reviews: RwLock<ReviewTable>,
    ratings: RwLock<HashMap<ObjectId, ProviderRating>>,
    #[cfg(test)]
    fail_rating_writes: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            bookings: RwLock::new(HashMap::new()),
            reviews: RwLock::new(ReviewTable::default()),
            ratings: RwLock::new(HashMap::new()),
            #[cfg(test)]
            fail_rating_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `put_rating` fail until reset.
    #[cfg(test)]
    pub fn fail_rating_writes(&self, fail: bool) {
        self.fail_rating_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn rating_writes_failing(&self) -> bool {
        self.fail_rating_writes
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    #[cfg(not(test))]
    fn rating_writes_failing(&self) -> bool {
        false
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn most_recent_first(a: &Review, b: &Review) -> Ordering {
    b.created_at
        .timestamp_millis()
        .cmp(&a.created_at.timestamp_millis())
        .then_with(|| b.id.bytes().cmp(&a.id.bytes()))
}

#[rocket::async_trait]
impl Repository for InMemoryRepository {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(StoreError::Duplicate(format!("booking {}", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_booking(&self, id: &ObjectId) -> Result<Option<Booking>, StoreError> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(id).cloned())
    }

    async fn transition_booking(
        &self,
        id: &ObjectId,
        from: &[BookingStatus],
        transition: &BookingTransition,
    ) -> Result<Option<(Booking, Booking)>, StoreError> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(id) {
            Some(booking) if from.contains(&booking.status) => {
                let before = booking.clone();
                transition.apply(booking);
                Ok(Some((before, booking.clone())))
            }
            _ => Ok(None),
        }
    }

    async fn insert_review(&self, review: &Review) -> Result<(), StoreError> {
        let mut table = self.reviews.write().await;
        if table.by_booking.contains_key(&review.booking_id) {
            return Err(StoreError::Duplicate(format!(
                "review for booking {}",
                review.booking_id
            )));
        }
        if table.by_id.contains_key(&review.id) {
            return Err(StoreError::Duplicate(format!("review {}", review.id)));
        }
        table.by_booking.insert(review.booking_id, review.id);
        table.by_id.insert(review.id, review.clone());
        Ok(())
    }

    async fn find_review(&self, id: &ObjectId) -> Result<Option<Review>, StoreError> {
        let table = self.reviews.read().await;
        Ok(table.by_id.get(id).cloned())
    }

    async fn find_review_by_booking(&self, booking_id: &ObjectId) -> Result<Option<Review>, StoreError> {
        let table = self.reviews.read().await;
        Ok(table
            .by_booking
            .get(booking_id)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn update_review(
        &self,
        id: &ObjectId,
        change: &ReviewChange,
    ) -> Result<Option<(Review, Review)>, StoreError> {
        let mut table = self.reviews.write().await;
        Ok(table.by_id.get_mut(id).map(|review| {
            let before = review.clone();
            change.apply(review);
            (before, review.clone())
        }))
    }

    async fn find_reviews(&self, query: &ReviewQuery, page: Page) -> Result<Vec<Review>, StoreError> {
        let table = self.reviews.read().await;
        let mut matching: Vec<Review> = table
            .by_id
            .values()
            .filter(|review| query.matches(review))
            .cloned()
            .collect();
        matching.sort_by(most_recent_first);

        let iter = matching.into_iter().skip(page.skip as usize);
        Ok(match page.limit {
            Some(limit) => iter.take(limit.max(0) as usize).collect(),
            None => iter.collect(),
        })
    }

    async fn count_reviews(&self, query: &ReviewQuery) -> Result<u64, StoreError> {
        let table = self.reviews.read().await;
        Ok(table.by_id.values().filter(|review| query.matches(review)).count() as u64)
    }

    async fn put_rating(&self, rating: &ProviderRating) -> Result<bool, StoreError> {
        if self.rating_writes_failing() {
            return Err(StoreError::Database("rating store unavailable".to_string()));
        }

        let mut ratings = self.ratings.write().await;
        if let Some(stored) = ratings.get(&rating.provider_id) {
            if stored.computed_at >= rating.computed_at {
                return Ok(false);
            }
        }
        ratings.insert(rating.provider_id, rating.clone());
        Ok(true)
    }

    async fn find_rating(&self, provider_id: &ObjectId) -> Result<Option<ProviderRating>, StoreError> {
        let ratings = self.ratings.read().await;
        Ok(ratings.get(provider_id).cloned())
    }
}
