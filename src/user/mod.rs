//! Users and session tokens.

pub mod auth;
pub mod schema;
pub mod store;

pub use auth::{AuthToken, AuthTokenValue};
pub use store::{SqliteUserStore, UserStore};
