use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::guards::AuthGuard;
use crate::models::{BookingResponse, CancelBookingDto, CreateBookingDto, ReviewableResponse};
use crate::services::{BookingService, NewBooking};
use crate::utils::{parse_object_id, ApiError, ApiResponse};

#[openapi(tag = "Booking")]
#[post("/booking", data = "<dto>")]
pub async fn create_booking(
    bookings: &State<BookingService>,
    auth: AuthGuard,
    dto: Json<CreateBookingDto>,
) -> Result<Json<ApiResponse<BookingResponse>>, ApiError> {
    let dto = dto.into_inner();
    let input = NewBooking {
        provider_id: parse_object_id(&dto.provider_id, "provider")?,
        provider_profile_id: parse_object_id(&dto.provider_profile_id, "provider profile")?,
        scheduled_at: dto.scheduled_at,
        notes: dto.notes,
    };

    let booking = bookings.create_booking(auth.user_id, auth.role, input).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Booking created".to_string(),
        booking.into(),
    )))
}

#[openapi(tag = "Booking")]
#[get("/booking/<booking_id>")]
pub async fn get_booking(
    bookings: &State<BookingService>,
    auth: AuthGuard,
    booking_id: String,
) -> Result<Json<ApiResponse<BookingResponse>>, ApiError> {
    let booking_id = parse_object_id(&booking_id, "booking")?;
    let booking = bookings.get_booking(&booking_id, &auth.user_id, auth.role).await?;
    Ok(Json(ApiResponse::success(booking.into())))
}

#[openapi(tag = "Booking")]
#[put("/booking/<booking_id>/accept")]
pub async fn accept_booking(
    bookings: &State<BookingService>,
    auth: AuthGuard,
    booking_id: String,
) -> Result<Json<ApiResponse<BookingResponse>>, ApiError> {
    let booking_id = parse_object_id(&booking_id, "booking")?;
    let booking = bookings.accept_booking(&booking_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Booking accepted".to_string(),
        booking.into(),
    )))
}

#[openapi(tag = "Booking")]
#[put("/booking/<booking_id>/complete")]
pub async fn complete_booking(
    bookings: &State<BookingService>,
    auth: AuthGuard,
    booking_id: String,
) -> Result<Json<ApiResponse<BookingResponse>>, ApiError> {
    let booking_id = parse_object_id(&booking_id, "booking")?;
    let booking = bookings.complete_booking(&booking_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Booking completed".to_string(),
        booking.into(),
    )))
}

#[openapi(tag = "Booking")]
#[put("/booking/<booking_id>/cancel", data = "<dto>")]
pub async fn cancel_booking(
    bookings: &State<BookingService>,
    auth: AuthGuard,
    booking_id: String,
    dto: Json<CancelBookingDto>,
) -> Result<Json<ApiResponse<BookingResponse>>, ApiError> {
    let booking_id = parse_object_id(&booking_id, "booking")?;
    let booking = bookings
        .cancel_booking(&booking_id, &auth.user_id, dto.into_inner().reason)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        "Booking cancelled".to_string(),
        booking.into(),
    )))
}

#[openapi(tag = "Booking")]
#[get("/booking/<booking_id>/reviewable")]
pub async fn is_reviewable(
    bookings: &State<BookingService>,
    _auth: AuthGuard,
    booking_id: String,
) -> Result<Json<ApiResponse<ReviewableResponse>>, ApiError> {
    let id = parse_object_id(&booking_id, "booking")?;
    let reviewable = bookings.is_reviewable(&id).await?;
    Ok(Json(ApiResponse::success(ReviewableResponse {
        booking_id,
        reviewable,
    })))
}
