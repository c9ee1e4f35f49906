pub mod blacklist;
pub mod csrf;
pub mod jwt;
pub mod session;
pub mod store;

pub use blacklist::{MemoryBlacklist, RedisService, SessionBlacklist};
pub use csrf::CsrfService;
pub use jwt::{AccessTokenClaims, JwtService};
pub use session::SessionService;
pub use store::{MemorySessionStore, PgSessionStore, SessionStore};
