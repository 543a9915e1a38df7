pub mod auth;
pub mod jwt;
pub mod password;

pub use auth::{CurrentUser, MaybeUser};
pub use jwt::{is_administrator, SessionClaims, SessionKeys, SessionSubject, ADMIN_ROLE_ID};
pub use password::{hash_password, verify_password};
