pub mod user;
pub mod booking;
pub mod review;
pub mod rating;

pub use user::*;
pub use booking::*;
pub use review::*;
pub use rating::*;
