//! Drop-in credentials and session gate for ActixWeb services
//!
//! Users register with an email and a password, log in to obtain a `session_id` cookie, and the
//! `gate` middleware admits only requests carrying a valid, unexpired session. Users and sessions
//! are stored in SQLite.
//!
//! ```ignore
//! let model = Model::with_config(config.db, config.auth).await?;
//! let auth = service::configure(model, Arc::new(StaticViews::new()));
//!
//! HttpServer::new(move || {
//!     App::new().configure(auth.clone()).service(
//!         web::resource("/")
//!             .wrap(middleware::from_fn(gate))
//!             .to(index),
//!     )
//! })
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod service;
pub mod views;

pub use error::Error;
pub use model::Model;
pub use model::sessions::{Session, SessionToken};
pub use model::users::{Credentials, Email, Registration};
pub use service::{LOGIN_PATH, SESSION_COOKIE, configure, gate};
pub use views::{Part, Renderer, StaticViews, View};
