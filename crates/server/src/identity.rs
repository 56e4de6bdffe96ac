//! Caller identity resolved from gateway-injected headers.
//!
//! The service runs behind an authenticating gateway that verifies the
//! session and injects `x-actor-id` / `x-actor-role`. The `system` role is
//! only injected for trusted internal callers such as the payment webhook,
//! never for end-user sessions.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use tailor_core::domain::actor::{Actor, ActorRole};

use crate::api::{correlation_id, ApiError};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

pub struct Identity(pub Actor);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id();

        let id = header_value(parts, ACTOR_ID_HEADER, &correlation_id)?;
        let raw_role = header_value(parts, ACTOR_ROLE_HEADER, &correlation_id)?;
        let role: ActorRole = raw_role.parse().map_err(|_| {
            ApiError::bad_request(format!("unknown actor role `{raw_role}`"), &correlation_id)
        })?;

        Ok(Identity(Actor { id, role }))
    }
}

fn header_value(parts: &Parts, name: &str, correlation_id: &str) -> Result<String, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::bad_request(format!("missing `{name}` header"), correlation_id))?;
    let value = value.to_str().map_err(|_| {
        ApiError::bad_request(format!("`{name}` header is not valid UTF-8"), correlation_id)
    })?;

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(format!("`{name}` header is empty"), correlation_id));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::util::ServiceExt;

    use super::Identity;

    async fn whoami(Identity(actor): Identity) -> String {
        format!("{}:{}", actor.role.as_str(), actor.id)
    }

    fn app() -> Router {
        Router::new().route("/whoami", get(whoami))
    }

    #[tokio::test]
    async fn headers_resolve_to_an_actor() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("x-actor-id", "tailor-7")
                    .header("x-actor-role", "tailor")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], b"tailor:tailor-7");
    }

    #[tokio::test]
    async fn missing_headers_are_a_bad_request() {
        let response = app()
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_role_is_a_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header("x-actor-id", "user-1")
                    .header("x-actor-role", "moderator")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
