use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::Page;
use crate::guards::AdminGuard;
use crate::models::{
    ModerateReviewDto, ModeratedReviewResponse, Pagination, RatingSummaryResponse,
    ReviewListResponse,
};
use crate::routes::review::ReviewListQuery;
use crate::services::ReviewService;
use crate::utils::{parse_object_id, ApiError, ApiResponse};

// ==================== REVIEW MODERATION ROUTES ====================

#[openapi(tag = "Admin - Reviews")]
#[get("/admin/reviews/reported?<query..>")]
pub async fn get_reported_reviews(
    reviews: &State<ReviewService>,
    admin: AdminGuard,
    query: ReviewListQuery,
) -> Result<Json<ApiResponse<ReviewListResponse<ModeratedReviewResponse>>>, ApiError> {
    let (page, limit) = query.resolve();
    let (items, total) = reviews
        .get_reported_reviews(admin.auth.role, Page::new(page, limit))
        .await?;

    Ok(Json(ApiResponse::success(ReviewListResponse {
        reviews: items.into_iter().map(ModeratedReviewResponse::from).collect(),
        pagination: Pagination::new(page, limit, total),
    })))
}

#[openapi(tag = "Admin - Reviews")]
#[get("/admin/review/<review_id>")]
pub async fn get_review_for_moderation(
    reviews: &State<ReviewService>,
    admin: AdminGuard,
    review_id: String,
) -> Result<Json<ApiResponse<ModeratedReviewResponse>>, ApiError> {
    let review_id = parse_object_id(&review_id, "review")?;
    let review = reviews.get_review(&review_id, admin.auth.role).await?;
    Ok(Json(ApiResponse::success(review.into())))
}

#[openapi(tag = "Admin - Reviews")]
#[put("/admin/reviews/<review_id>/moderate", data = "<dto>")]
pub async fn moderate_review(
    reviews: &State<ReviewService>,
    admin: AdminGuard,
    review_id: String,
    dto: Json<ModerateReviewDto>,
) -> Result<Json<ApiResponse<ModeratedReviewResponse>>, ApiError> {
    let review_id = parse_object_id(&review_id, "review")?;
    let dto = dto.into_inner();

    let review = reviews
        .moderate_review(
            &review_id,
            &admin.auth.user_id,
            admin.auth.role,
            dto.is_visible,
            dto.reason,
        )
        .await?;

    let message = if review.is_visible {
        "Review is visible"
    } else {
        "Review hidden"
    };
    Ok(Json(ApiResponse::success_with_message(
        message.to_string(),
        review.into(),
    )))
}

#[openapi(tag = "Admin - Reviews")]
#[put("/admin/reviews/<review_id>/resolve-report")]
pub async fn resolve_report(
    reviews: &State<ReviewService>,
    admin: AdminGuard,
    review_id: String,
) -> Result<Json<ApiResponse<ModeratedReviewResponse>>, ApiError> {
    let review_id = parse_object_id(&review_id, "review")?;
    let review = reviews
        .resolve_report(&review_id, &admin.auth.user_id, admin.auth.role)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        "Report resolved".to_string(),
        review.into(),
    )))
}

#[openapi(tag = "Admin - Reviews")]
#[post("/admin/providers/<provider_id>/recompute-rating")]
pub async fn recompute_provider_rating(
    reviews: &State<ReviewService>,
    _admin: AdminGuard,
    provider_id: String,
) -> Result<Json<ApiResponse<RatingSummaryResponse>>, ApiError> {
    let id = parse_object_id(&provider_id, "provider")?;
    let summary = reviews.recompute_provider_rating(&id).await?;
    Ok(Json(ApiResponse::success(RatingSummaryResponse {
        provider_id,
        summary,
    })))
}
