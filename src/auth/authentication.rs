use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::db::{get_session_by_token, get_user};

use super::User;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let span = tracing::info_span!("session_auth");
        let _guard = span.enter();

        // A missing token is a hard 401; unknown or expired tokens forward
        // so a lower-ranked route can still answer.
        let Some(cookie) = request.cookies().get_private("session_token") else {
            return Outcome::Error((Status::Unauthorized, ()));
        };
        let token = cookie.value().to_string();

        let Some(db) = request.rocket().state::<SqlitePool>() else {
            tracing::error!("database pool missing from managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        };

        let session = match get_session_by_token(db, &token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = ?err, "session token rejected");
                return Outcome::Forward(Status::Unauthorized);
            }
        };

        if !session.is_valid() {
            tracing::warn!(user_id = session.user_id, "session token expired");
            return Outcome::Forward(Status::Unauthorized);
        }

        match get_user(db, session.user_id).await {
            Ok(user) => {
                tracing::info!(email = %user.email, role = %user.role.as_str(), "request authenticated");
                Outcome::Success(user)
            }
            Err(err) => {
                tracing::error!(user_id = session.user_id, error = ?err, "user lookup failed for live session");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    Custom(
        Status::Unauthorized,
        Json(json!({
            "error": "Unauthorized",
            "message": "Authentication required"
        })),
    )
}
