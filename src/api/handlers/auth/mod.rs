//! Auth handlers and supporting modules.
//!
//! This module coordinates registration, password login, access-token
//! issuance, refresh-token rotation, and role administration.
//!
//! ## Signing Domains
//!
//! Access tokens are HMAC-SHA256 signed under one of two independent domains:
//!
//! - **`access-api`**: ordinary bearer tokens returned by login and refresh.
//! - **`admin-ops`**: tokens accepted by the role-management endpoints,
//!   minted only for principals holding the `Admin` role.
//!
//! The two keys must differ and each must be at least 32 bytes; startup fails
//! otherwise. A token signed for one domain never verifies under the other.
//!
//! ## Refresh Rotation
//!
//! Refresh tokens are opaque random values, stored server-side and usable
//! exactly once. Each rotation revokes the presented token and inserts its
//! successor inside one transaction. Tokens carry a `family_id` naming the
//! login that started the chain; replaying an already-rotated token revokes
//! the whole family.
//!
//! ## Rate Limiting
//!
//! Credential endpoints are fixed-window rate limited per client IP before
//! any payload validation runs: `/register` and `/login` share the login
//! class, `/refresh-token`, `/logout`, and the role endpoints share the
//! refresh class.
//!
//! > **Warning:** Rotating a signing key invalidates every outstanding token
//! > in that domain. Refresh tokens survive, so sessions recover on the next
//! > `/refresh-token` call.

mod error;
pub(crate) mod login;
pub(crate) mod logout;
mod password;
mod principal;
mod rate_limit;
pub(crate) mod refresh;
pub(crate) mod register;
pub(crate) mod roles;
mod state;
mod storage;
mod token;
pub(crate) mod types;
mod utils;

pub use rate_limit::{FixedWindowRateLimiter, NoopRateLimiter, WindowPolicy};
pub use state::{AuthConfig, AuthState};
pub use token::KeyRegistry;
