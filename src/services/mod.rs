pub mod booking;
pub mod error;
pub mod jwt;
pub mod moderation;
pub mod rating;
pub mod review;

pub use booking::{BookingService, NewBooking};
pub use error::{ServiceError, ServiceResult};
pub use jwt::JwtService;
pub use moderation::ModerationPolicy;
pub use review::ReviewService;

use rocket::{Build, Rocket};

use crate::db::DbConn;

/// Registers the domain services over `repo` as managed state.
pub fn manage(rocket: Rocket<Build>, repo: DbConn) -> Rocket<Build> {
    let policy = ModerationPolicy::from_config();
    log::info!("Moderation policy: hide reported reviews = {}", policy.hide_reported);

    rocket
        .manage(BookingService::new(repo.clone()))
        .manage(ReviewService::new(repo, policy))
}
