use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use mongodb::bson::oid::ObjectId;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::models::Role;
use crate::services::JwtService;

/// Why a request was turned away by an identity guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    /// Authenticated, but the role lacks the required capability.
    Forbidden,
}

/// Caller identity taken from a Bearer JWT issued by the identity provider.
pub struct AuthGuard {
    pub user_id: ObjectId,
    pub role: Role,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Some(header) = req.headers().get_one("Authorization") else {
            return Outcome::Error((Status::Unauthorized, AuthError::MissingToken));
        };
        let Some(token) = bearer_token(header) else {
            return Outcome::Error((Status::Unauthorized, AuthError::InvalidToken));
        };

        let claims = match JwtService::verify_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                log::debug!("Rejected access token: {}", e);
                return Outcome::Error((Status::Unauthorized, AuthError::InvalidToken));
            }
        };

        match ObjectId::parse_str(&claims.sub) {
            Ok(user_id) => Outcome::Success(AuthGuard {
                user_id,
                role: claims.role,
            }),
            Err(_) => Outcome::Error((Status::Unauthorized, AuthError::InvalidToken)),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
