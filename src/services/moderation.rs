use mongodb::bson::oid::ObjectId;

use crate::db::ReviewQuery;
use crate::models::Review;

/// Decides which reviews the public may see. Never mutates a review.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModerationPolicy {
    /// Keep reviews with an unresolved report out of public listings.
    pub hide_reported: bool,
}

impl ModerationPolicy {
    pub fn from_config() -> Self {
        ModerationPolicy {
            hide_reported: crate::config::Config::hide_reported_reviews(),
        }
    }

    pub fn is_publicly_visible(&self, review: &Review) -> bool {
        review.is_visible && !(self.hide_reported && review.reported)
    }

    /// Storage query equivalent to `is_publicly_visible` for one provider.
    pub fn public_listing(&self, provider_id: ObjectId) -> ReviewQuery {
        ReviewQuery {
            provider_id: Some(provider_id),
            visible_only: true,
            exclude_reported: self.hide_reported,
            reported_only: false,
        }
    }
}

/// Query for the moderation queue: every review with an unresolved report.
pub fn reported_queue() -> ReviewQuery {
    ReviewQuery {
        reported_only: true,
        ..Default::default()
    }
}
