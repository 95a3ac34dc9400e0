//! Authentication endpoints

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::cookie::time::Duration;
use actix_web::http::header::{CACHE_CONTROL, ContentType};
use actix_web::web::{self, Data, ServiceConfig};
use actix_web::{HttpResponse, get, post};
use chrono::Utc;
use serde_json::json;
use tracing::info;


mod middleware;

pub use middleware::{LOGIN_PATH, SESSION_COOKIE, gate};

use crate::error::Error;
use crate::model::Model;
use crate::model::users::{Credentials, Registration};
use crate::views::{Part, Renderer, View};

/// Static assets embedded into the binary: name, content type and content
const RESOURCES: &[(&str, &str, &[u8])] = &[
    (
        "auth.css",
        "text/css; charset=utf-8",
        include_bytes!("../resources/static/auth.css"),
    ),
    (
        "auth.js",
        "text/javascript; charset=utf-8",
        include_bytes!("../resources/static/auth.js"),
    ),
];

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(body)
}

/// Registration page
#[get("/register")]
async fn register_page(views: Data<dyn Renderer>) -> HttpResponse {
    html(views.render(View::Register, Part::Page, None))
}

/// Creates an user, answering with the login form
#[post("/register")]
async fn register(
    model: Data<Model>,
    views: Data<dyn Renderer>,
    form: web::Form<Registration>,
) -> Result<HttpResponse, Error> {
    let email = model.register(form.into_inner()).await?;
    info!(%email, "User registered");

    let data = json!({ "message": "Account created, you can log in now" });
    Ok(html(views.render(View::Login, Part::Content, Some(&data))))
}

/// Login page
#[get("/login")]
async fn login_page(views: Data<dyn Renderer>) -> HttpResponse {
    html(views.render(View::Login, Part::Page, None))
}

/// Verifies credentials and sets the session cookie
#[post("/login")]
async fn login(model: Data<Model>, form: web::Form<Credentials>) -> Result<HttpResponse, Error> {
    let owner = model.verify(form.into_inner()).await?;
    let session = model.issue(owner).await?;
    info!(owner = %session.owner, expires_at = %session.expires_at, "Session issued");

    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    let cookie = Cookie::build(SESSION_COOKIE, session.token.as_str().to_owned())
        .path("/")
        .http_only(true)
        .max_age(Duration::seconds(max_age))
        .finish();

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .content_type(ContentType::plaintext())
        .body("Logged in"))
}

/// Serves the embedded stylesheet and script used by the views
#[get("/resources/{file}")]
async fn resource(file: web::Path<String>) -> HttpResponse {
    match RESOURCES.iter().find(|(name, ..)| *name == file.as_str()) {
        Some(&(_, content_type, content)) => HttpResponse::Ok()
            .content_type(content_type)
            .insert_header((CACHE_CONTROL, "public, max-age=3600"))
            .body(content),
        None => HttpResponse::NotFound().finish(),
    }
}

/// Returns configuration function registering the authentication endpoints under `/auth`
///
/// Routes to be protected should be wrapped with the `gate` middleware. The configuration provides
/// the `Model` the gate relies on.
pub fn configure(
    model: Model,
    views: Arc<dyn Renderer>,
) -> impl Fn(&mut ServiceConfig) + Clone {
    move |cfg: &mut ServiceConfig| {
        let auth = web::scope("/auth")
            .service(register_page)
            .service(register)
            .service(login_page)
            .service(login)
            .service(resource);

        cfg.app_data(Data::new(model.clone()))
            .app_data(Data::from(views.clone()))
            .service(auth);
    }
}
