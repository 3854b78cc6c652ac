use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::config::Config;
use crate::db::Page;
use crate::guards::AuthGuard;
use crate::models::{
    CreateReviewDto, Pagination, ProviderResponseDto, RatingSummaryResponse, ReportReviewDto,
    ReviewInput, ReviewListResponse, ReviewResponse, Role,
};
use crate::services::ReviewService;
use crate::utils::{parse_object_id, ApiError, ApiResponse};

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct ReviewListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ReviewListQuery {
    /// Resolves defaults and clamps the page size to the configured maximum.
    pub fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, Config::reviews_page_limit());
        (page, limit)
    }
}

#[openapi(tag = "Review")]
#[post("/review/create", data = "<dto>")]
pub async fn create_review(
    reviews: &State<ReviewService>,
    auth: AuthGuard,
    dto: Json<CreateReviewDto>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let dto = dto.into_inner();
    let booking_id = parse_object_id(&dto.booking_id, "booking")?;

    let review = reviews
        .create_review(&booking_id, &auth.user_id, ReviewInput::from(dto))
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Review submitted successfully".to_string(),
        review.into(),
    )))
}

#[openapi(tag = "Review")]
#[get("/review/<review_id>")]
pub async fn get_review(
    reviews: &State<ReviewService>,
    review_id: String,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let review_id = parse_object_id(&review_id, "review")?;
    let review = reviews.get_review(&review_id, Role::Client).await?;
    Ok(Json(ApiResponse::success(review.into())))
}

#[openapi(tag = "Review")]
#[get("/review/provider/<provider_id>?<query..>")]
pub async fn get_provider_reviews(
    reviews: &State<ReviewService>,
    provider_id: String,
    query: ReviewListQuery,
) -> Result<Json<ApiResponse<ReviewListResponse<ReviewResponse>>>, ApiError> {
    let provider_id = parse_object_id(&provider_id, "provider")?;
    let (page, limit) = query.resolve();

    let (items, total) = reviews
        .get_visible_reviews(&provider_id, Page::new(page, limit))
        .await?;

    Ok(Json(ApiResponse::success(ReviewListResponse {
        reviews: items.into_iter().map(ReviewResponse::from).collect(),
        pagination: Pagination::new(page, limit, total),
    })))
}

#[openapi(tag = "Review")]
#[get("/review/provider/<provider_id>/summary")]
pub async fn get_provider_summary(
    reviews: &State<ReviewService>,
    provider_id: String,
) -> Result<Json<ApiResponse<RatingSummaryResponse>>, ApiError> {
    let id = parse_object_id(&provider_id, "provider")?;
    let summary = reviews.get_provider_rating_summary(&id).await?;
    Ok(Json(ApiResponse::success(RatingSummaryResponse {
        provider_id,
        summary,
    })))
}

#[openapi(tag = "Review")]
#[put("/review/<review_id>/response", data = "<dto>")]
pub async fn respond_to_review(
    reviews: &State<ReviewService>,
    auth: AuthGuard,
    review_id: String,
    dto: Json<ProviderResponseDto>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let review_id = parse_object_id(&review_id, "review")?;
    let review = reviews
        .attach_provider_response(&review_id, &auth.user_id, dto.into_inner().text)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        "Response saved".to_string(),
        review.into(),
    )))
}

#[openapi(tag = "Review")]
#[post("/review/<review_id>/report", data = "<dto>")]
pub async fn report_review(
    reviews: &State<ReviewService>,
    auth: AuthGuard,
    review_id: String,
    dto: Json<ReportReviewDto>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let review_id = parse_object_id(&review_id, "review")?;
    let review = reviews
        .report_review(&review_id, &auth.user_id, dto.into_inner().reason)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        "Review reported; a moderator will take a look".to_string(),
        review.into(),
    )))
}
