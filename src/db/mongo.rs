use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    FindOneAndUpdateOptions, FindOptions, IndexOptions, ReplaceOptions, ReturnDocument,
};
use mongodb::{Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;

use super::{BookingTransition, Page, Repository, ReviewQuery, StoreError};
use crate::models::{Booking, BookingStatus, ProviderRating, Review, ReviewChange};

const DUPLICATE_KEY: i32 = 11000;

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        let duplicate = matches!(
            err.kind.as_ref(),
            ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
        );
        if duplicate {
            StoreError::Duplicate(err.to_string())
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

pub struct MongoRepository {
    db: Database,
}

impl MongoRepository {
    pub fn new(db: Database) -> Self {
        MongoRepository { db }
    }

    fn bookings(&self) -> Collection<Booking> {
        self.db.collection::<Booking>("bookings")
    }

    fn reviews(&self) -> Collection<Review> {
        self.db.collection::<Review>("reviews")
    }

    fn ratings(&self) -> Collection<ProviderRating> {
        self.db.collection::<ProviderRating>("provider_ratings")
    }

    /// The unique index on `booking_id` is what rejects a second review for
    /// a booking, including two inserts racing each other.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique_booking = IndexModel::builder()
            .keys(doc! { "booking_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("reviews_booking_unique".to_string())
                    .build(),
            )
            .build();
        self.reviews().create_index(unique_booking, None).await?;

        let provider_listing = IndexModel::builder()
            .keys(doc! { "provider_id": 1, "is_visible": 1, "created_at": -1, "_id": -1 })
            .options(
                IndexOptions::builder()
                    .name("reviews_provider_listing".to_string())
                    .build(),
            )
            .build();
        self.reviews().create_index(provider_listing, None).await?;

        let moderation_queue = IndexModel::builder()
            .keys(doc! { "reported": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("reviews_reported".to_string())
                    .build(),
            )
            .build();
        self.reviews().create_index(moderation_queue, None).await?;

        log::info!("✓ Review indexes ensured");
        Ok(())
    }
}

fn review_filter(query: &ReviewQuery) -> Document {
    let mut filter = doc! {};
    if let Some(provider_id) = query.provider_id {
        filter.insert("provider_id", provider_id);
    }
    if query.visible_only {
        filter.insert("is_visible", true);
    }
    if query.reported_only {
        filter.insert("reported", true);
    } else if query.exclude_reported {
        filter.insert("reported", false);
    }
    filter
}

fn review_update(change: &ReviewChange) -> Document {
    let set = match change {
        ReviewChange::ProviderResponse { text, at } => doc! {
            "provider_response": text.as_str(),
            "provider_response_at": *at,
        },
        ReviewChange::Report { reporter_id, reason, .. } => doc! {
            "reported": true,
            "report_reason": reason.as_str(),
            "reported_by": *reporter_id,
        },
        ReviewChange::ResolveReport { moderator_id, at } => doc! {
            "reported": false,
            "report_reason": Bson::Null,
            "reported_by": Bson::Null,
            "moderated_by": *moderator_id,
            "moderated_at": *at,
        },
        ReviewChange::Moderate { visible, moderator_id, note, at } => doc! {
            "is_visible": *visible,
            "moderated_by": *moderator_id,
            "moderated_at": *at,
            "moderation_note": note.clone(),
        },
    };

    doc! {
        "$set": set,
        "$max": { "updated_at": change.at() },
    }
}

/// Matches the provider's stored summary only while it is older than `rating`.
fn rating_filter(rating: &ProviderRating) -> Document {
    doc! {
        "_id": rating.provider_id,
        "computed_at": { "$lt": rating.computed_at },
    }
}

fn booking_update(transition: &BookingTransition) -> Document {
    let mut set = doc! { "status": transition.to.as_str() };
    if transition.to == BookingStatus::Cancelled {
        set.insert("cancelled_by", transition.cancelled_by);
        set.insert("cancellation_reason", transition.reason.clone());
    }
    doc! {
        "$set": set,
        "$max": { "updated_at": transition.at },
    }
}

#[rocket::async_trait]
impl Repository for MongoRepository {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.bookings().insert_one(booking, None).await?;
        Ok(())
    }

    async fn find_booking(&self, id: &ObjectId) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings().find_one(doc! { "_id": *id }, None).await?)
    }

    async fn transition_booking(
        &self,
        id: &ObjectId,
        from: &[BookingStatus],
        transition: &BookingTransition,
    ) -> Result<Option<(Booking, Booking)>, StoreError> {
        let sources: Vec<&str> = from.iter().map(|status| status.as_str()).collect();
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();

        let before = self
            .bookings()
            .find_one_and_update(
                doc! { "_id": *id, "status": { "$in": sources } },
                booking_update(transition),
                options,
            )
            .await?;

        Ok(before.map(|before| {
            let mut after = before.clone();
            transition.apply(&mut after);
            (before, after)
        }))
    }

    async fn insert_review(&self, review: &Review) -> Result<(), StoreError> {
        self.reviews().insert_one(review, None).await?;
        Ok(())
    }

    async fn find_review(&self, id: &ObjectId) -> Result<Option<Review>, StoreError> {
        Ok(self.reviews().find_one(doc! { "_id": *id }, None).await?)
    }

    async fn find_review_by_booking(&self, booking_id: &ObjectId) -> Result<Option<Review>, StoreError> {
        Ok(self
            .reviews()
            .find_one(doc! { "booking_id": *booking_id }, None)
            .await?)
    }

    async fn update_review(
        &self,
        id: &ObjectId,
        change: &ReviewChange,
    ) -> Result<Option<(Review, Review)>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();

        let before = self
            .reviews()
            .find_one_and_update(doc! { "_id": *id }, review_update(change), options)
            .await?;

        // The update is a pure $set/$max, so replaying it on the prior
        // document yields exactly what was written.
        Ok(before.map(|before| {
            let mut after = before.clone();
            change.apply(&mut after);
            (before, after)
        }))
    }

    async fn find_reviews(&self, query: &ReviewQuery, page: Page) -> Result<Vec<Review>, StoreError> {
        let mut options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .skip(page.skip)
            .build();
        options.limit = page.limit;

        let cursor = self.reviews().find(review_filter(query), options).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_reviews(&self, query: &ReviewQuery) -> Result<u64, StoreError> {
        Ok(self
            .reviews()
            .count_documents(review_filter(query), None)
            .await?)
    }

    async fn put_rating(&self, rating: &ProviderRating) -> Result<bool, StoreError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        let result = self
            .ratings()
            .replace_one(rating_filter(rating), rating, options)
            .await;

        match result {
            Ok(outcome) => Ok(outcome.matched_count > 0 || outcome.upserted_id.is_some()),
            // The filter missed because a newer summary is stored, and the
            // upsert then collided with its _id.
            Err(e) => match StoreError::from(e) {
                StoreError::Duplicate(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn find_rating(&self, provider_id: &ObjectId) -> Result<Option<ProviderRating>, StoreError> {
        Ok(self
            .ratings()
            .find_one(doc! { "_id": *provider_id }, None)
            .await?)
    }
}
