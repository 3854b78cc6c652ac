use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        Self::layered("ROCKET_")
    }

    /// `Rocket.toml` for the active profile, overridden by `<prefix>KEY`
    /// environment variables. Keys are flat, so `ROCKET_JWT_SECRET` sets
    /// `jwt_secret`.
    fn layered(env_prefix: &str) -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed(env_prefix).ignore(&["PROFILE"]).global())
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(900)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "loving".to_string())
    }

    /// When set, reviews with an unresolved report are kept out of public listings.
    pub fn hide_reported_reviews() -> bool {
        Self::figment()
            .extract_inner("hide_reported_reviews")
            .unwrap_or(false)
    }

    pub fn reviews_page_limit() -> i64 {
        Self::figment()
            .extract_inner::<i64>("reviews_page_limit")
            .unwrap_or(100)
            .max(1)
    }
}
