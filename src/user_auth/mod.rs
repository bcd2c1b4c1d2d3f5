//! User authentication
//!
//! Telegram Web App login issuing HS256 JWTs, and the middleware that turns
//! a bearer token into an [`AuthenticatedUser`](crate::identity::AuthenticatedUser).

pub mod handlers;
pub mod middleware;
pub mod service;

pub use service::{AuthError, AuthSettings, Claims, UserAuthService, sign_init_data};
