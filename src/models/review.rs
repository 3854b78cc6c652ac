use std::fmt;

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

use crate::utils::{format_datetime, later_of};

pub const MAX_RESPONSE_LEN: u64 = 500;
pub const MAX_REPORT_REASON_LEN: u64 = 1000;
pub const MAX_MODERATION_NOTE_LEN: u64 = 500;

/// A star value in 1..=5. Out-of-range values cannot be constructed, so a
/// stored review never carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Score(u8);

impl Score {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 5;

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for Score {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Score(value as u8))
        } else {
            Err(format!("score {} is outside 1..=5", value))
        }
    }
}

impl From<Score> for i32 {
    fn from(score: Score) -> Self {
        score.0 as i32
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Punctuality,
    Communication,
    Professionalism,
    Overall,
}

/// Per-category sub-ratings. `None` means the category was not rated and is
/// left out of that category's average.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewCategories {
    #[serde(default)]
    pub punctuality: Option<Score>,
    #[serde(default)]
    pub communication: Option<Score>,
    #[serde(default)]
    pub professionalism: Option<Score>,
    #[serde(default)]
    pub overall: Option<Score>,
}

impl ReviewCategories {
    pub fn get(&self, category: Category) -> Option<Score> {
        match category {
            Category::Punctuality => self.punctuality,
            Category::Communication => self.communication,
            Category::Professionalism => self.professionalism,
            Category::Overall => self.overall,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub booking_id: ObjectId,
    pub client_id: ObjectId,
    pub provider_id: ObjectId,
    pub provider_profile_id: ObjectId,
    pub rating: Score,
    pub comment: Option<String>,
    #[serde(default)]
    pub categories: ReviewCategories,
    pub is_verified: bool,
    pub is_visible: bool,
    pub moderated_by: Option<ObjectId>,
    pub moderated_at: Option<DateTime>,
    pub moderation_note: Option<String>,
    pub provider_response: Option<String>,
    pub provider_response_at: Option<DateTime>,
    pub reported: bool,
    pub report_reason: Option<String>,
    pub reported_by: Option<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// A single atomic mutation of an existing review.
#[derive(Debug, Clone)]
pub enum ReviewChange {
    ProviderResponse {
        text: String,
        at: DateTime,
    },
    Report {
        reporter_id: ObjectId,
        reason: String,
        at: DateTime,
    },
    ResolveReport {
        moderator_id: ObjectId,
        at: DateTime,
    },
    Moderate {
        visible: bool,
        moderator_id: ObjectId,
        note: Option<String>,
        at: DateTime,
    },
}

impl ReviewChange {
    pub fn at(&self) -> DateTime {
        match self {
            ReviewChange::ProviderResponse { at, .. }
            | ReviewChange::Report { at, .. }
            | ReviewChange::ResolveReport { at, .. }
            | ReviewChange::Moderate { at, .. } => *at,
        }
    }

    pub fn apply(&self, review: &mut Review) {
        match self {
            ReviewChange::ProviderResponse { text, at } => {
                review.provider_response = Some(text.clone());
                review.provider_response_at = Some(*at);
            }
            ReviewChange::Report { reporter_id, reason, .. } => {
                review.reported = true;
                review.report_reason = Some(reason.clone());
                review.reported_by = Some(*reporter_id);
            }
            ReviewChange::ResolveReport { moderator_id, at } => {
                review.reported = false;
                review.report_reason = None;
                review.reported_by = None;
                review.moderated_by = Some(*moderator_id);
                review.moderated_at = Some(*at);
            }
            ReviewChange::Moderate { visible, moderator_id, note, at } => {
                review.is_visible = *visible;
                review.moderated_by = Some(*moderator_id);
                review.moderated_at = Some(*at);
                review.moderation_note = note.clone();
            }
        }
        review.updated_at = later_of(review.updated_at, self.at());
    }
}

/// Sub-ratings as submitted by clients and returned to them.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate, JsonSchema)]
pub struct CategoryRatingsDto {
    #[validate(range(min = 1, max = 5, message = "Punctuality must be between 1 and 5"))]
    pub punctuality: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Communication must be between 1 and 5"))]
    pub communication: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Professionalism must be between 1 and 5"))]
    pub professionalism: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Overall must be between 1 and 5"))]
    pub overall: Option<i32>,
}

impl From<&ReviewCategories> for CategoryRatingsDto {
    fn from(categories: &ReviewCategories) -> Self {
        CategoryRatingsDto {
            punctuality: categories.punctuality.map(i32::from),
            communication: categories.communication.map(i32::from),
            professionalism: categories.professionalism.map(i32::from),
            overall: categories.overall.map(i32::from),
        }
    }
}

impl TryFrom<&CategoryRatingsDto> for ReviewCategories {
    type Error = String;

    fn try_from(dto: &CategoryRatingsDto) -> Result<Self, Self::Error> {
        Ok(ReviewCategories {
            punctuality: dto.punctuality.map(Score::try_from).transpose()?,
            communication: dto.communication.map(Score::try_from).transpose()?,
            professionalism: dto.professionalism.map(Score::try_from).transpose()?,
            overall: dto.overall.map(Score::try_from).transpose()?,
        })
    }
}

/// Review content supplied by the client.
#[derive(Debug, Clone, Validate)]
pub struct ReviewInput {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
    pub categories: Option<CategoryRatingsDto>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateReviewDto {
    pub booking_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub categories: Option<CategoryRatingsDto>,
}

impl From<CreateReviewDto> for ReviewInput {
    fn from(dto: CreateReviewDto) -> Self {
        ReviewInput {
            rating: dto.rating,
            comment: dto.comment,
            categories: dto.categories,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProviderResponseDto {
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReportReviewDto {
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ModerateReviewDto {
    pub is_visible: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewResponse {
    pub id: String,
    pub booking_id: String,
    pub client_id: String,
    pub provider_id: String,
    pub provider_profile_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub categories: CategoryRatingsDto,
    pub is_verified: bool,
    pub is_visible: bool,
    pub provider_response: Option<String>,
    pub provider_response_at: Option<String>,
    pub reported: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        ReviewResponse {
            id: review.id.to_hex(),
            booking_id: review.booking_id.to_hex(),
            client_id: review.client_id.to_hex(),
            provider_id: review.provider_id.to_hex(),
            provider_profile_id: review.provider_profile_id.to_hex(),
            rating: review.rating.into(),
            comment: review.comment,
            categories: CategoryRatingsDto::from(&review.categories),
            is_verified: review.is_verified,
            is_visible: review.is_visible,
            provider_response: review.provider_response,
            provider_response_at: review.provider_response_at.map(format_datetime),
            reported: review.reported,
            created_at: format_datetime(review.created_at),
            updated_at: format_datetime(review.updated_at),
        }
    }
}

/// Moderator view, including report and moderation fields.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ModeratedReviewResponse {
    #[serde(flatten)]
    pub review: ReviewResponse,
    pub report_reason: Option<String>,
    pub reported_by: Option<String>,
    pub moderated_by: Option<String>,
    pub moderated_at: Option<String>,
    pub moderation_note: Option<String>,
}

impl From<Review> for ModeratedReviewResponse {
    fn from(review: Review) -> Self {
        let report_reason = review.report_reason.clone();
        let reported_by = review.reported_by.map(|id| id.to_hex());
        let moderated_by = review.moderated_by.map(|id| id.to_hex());
        let moderated_at = review.moderated_at.map(format_datetime);
        let moderation_note = review.moderation_note.clone();
        ModeratedReviewResponse {
            review: ReviewResponse::from(review),
            report_reason,
            reported_by,
            moderated_by,
            moderated_at,
            moderation_note,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: u64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: u64) -> Self {
        Pagination {
            page,
            limit,
            total,
            pages: (total as f64 / limit as f64).ceil() as i64,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewListResponse<T> {
    pub reviews: Vec<T>,
    pub pagination: Pagination,
}
