use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;

/// Mean per category over the reviews that rated it. Absent when no visible
/// review rated the category.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct CategoryAverages {
    pub punctuality: Option<f64>,
    pub communication: Option<f64>,
    pub professionalism: Option<f64>,
    pub overall: Option<f64>,
}

/// Derived view of a provider's visible reviews.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub category_averages: CategoryAverages,
}

impl RatingSummary {
    pub fn empty() -> Self {
        RatingSummary {
            average_rating: None,
            review_count: 0,
            category_averages: CategoryAverages::default(),
        }
    }
}

/// Stored copy of a summary. Always written by whole-document replace.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderRating {
    #[serde(rename = "_id")]
    pub provider_id: ObjectId,
    pub summary: RatingSummary,
    pub computed_at: DateTime,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RatingSummaryResponse {
    pub provider_id: String,
    #[serde(flatten)]
    pub summary: RatingSummary,
}
