//! Authentication module
//!
//! Session tokens, password hashing and per-request identity.

pub mod jwt;
pub mod password;
pub mod session;

pub use jwt::{Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use password::{check_password, hash_password, verify_password, PasswordCheck};
pub use session::{
    clear_session_cookie, resolve_identity, session_cookie, Identity, SESSION_COOKIE,
};
