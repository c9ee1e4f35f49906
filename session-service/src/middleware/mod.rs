pub mod auth;
pub mod csrf;
pub mod session;

pub use auth::{identity_middleware, require_auth_middleware, AuthSession, AuthUser, MaybeAuthUser};
pub use csrf::csrf_validation_middleware;
pub use session::session_revocation_middleware;
