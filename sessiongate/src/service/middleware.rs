//! Session gate
//!
//! Admits only requests carrying a valid session cookie. Anything else is redirected to the login
//! page, without telling whether the cookie was missing, unknown or expired.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::ErrorInternalServerError;
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{Error, HttpMessage, HttpResponse};
use tracing::debug;

use crate::model::Model;
use crate::model::sessions::SessionToken;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session_id";

/// Where unauthenticated requests are sent
pub const LOGIN_PATH: &str = "/auth/login";

/// Gate middleware, to be wrapped with `actix_web::middleware::from_fn`
///
/// On success the session owner `Email` is stored in the request extensions, so the handlers can
/// extract it with `ReqData<Email>`.
pub async fn gate<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    B: MessageBody + 'static,
{
    let Some(cookie) = req.cookie(SESSION_COOKIE) else {
        debug!(path = req.path(), "No session cookie");
        return Ok(redirect_to_login(req));
    };

    let model: Data<Model> = req
        .app_data()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("Missing model"))?;

    let token = SessionToken::from(cookie.value().to_owned());
    match model.validate(&token).await {
        Ok(owner) => {
            debug!(%owner, path = req.path(), "Session validated");
            req.extensions_mut().insert(owner);
            next.call(req).await.map(|res| res.map_into_left_body())
        }
        Err(err) if err.is_unauthenticated() => {
            debug!(%err, path = req.path(), "Session rejected");
            Ok(redirect_to_login(req))
        }
        Err(err) => Err(err.into()),
    }
}

fn redirect_to_login<B>(req: ServiceRequest) -> ServiceResponse<EitherBody<B>> {
    let response = HttpResponse::SeeOther()
        .insert_header((header::LOCATION, LOGIN_PATH))
        .finish();
    req.into_response(response).map_into_right_body()
}
