#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

fn error_body(kind: &str, message: &str) -> Value {
    json!({
        "success": false,
        "message": message,
        "error": kind
    })
}

#[catch(400)]
fn bad_request() -> Value {
    error_body("validation_error", "Malformed request")
}

#[catch(401)]
fn unauthorized() -> Value {
    error_body("authorization_error", "Missing or invalid access token")
}

#[catch(403)]
fn forbidden() -> Value {
    error_body("authorization_error", "You are not allowed to do this")
}

#[catch(404)]
fn not_found() -> Value {
    error_body("not_found_error", "Resource not found (check /api/v1 prefix)")
}

#[catch(422)]
fn unprocessable() -> Value {
    error_body("validation_error", "Request body could not be parsed")
}

#[catch(500)]
fn internal_error() -> Value {
    error_body("internal_error", "Internal server error")
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

/// Mounts routes, catchers and fairings. Services must already be managed.
fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Bookings
                routes::booking::create_booking,
                routes::booking::get_booking,
                routes::booking::accept_booking,
                routes::booking::complete_booking,
                routes::booking::cancel_booking,
                routes::booking::is_reviewable,
                // Reviews
                routes::review::create_review,
                routes::review::get_review,
                routes::review::get_provider_reviews,
                routes::review::get_provider_summary,
                routes::review::respond_to_review,
                routes::review::report_review,
                // Admin Routes - Reviews
                routes::admin::get_reported_reviews,
                routes::admin::get_review_for_moderation,
                routes::admin::moderate_review,
                routes::admin::resolve_report,
                routes::admin::recompute_provider_rating,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![bad_request, unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
}

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    log::info!("Loving API starting");
    log::info!("Swagger UI at /api/docs");

    mount(rocket::build().attach(db::init()))
}
