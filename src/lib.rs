//! # Aliro (Authentication & Token Lifecycle)
//!
//! `aliro` issues, validates, and rotates credentials for an HTTP API:
//! password-based login, short-lived signed access tokens, rotating refresh
//! tokens, and fixed-window rate limiting on the credential endpoints.
//!
//! ## Token Model
//!
//! - **Access tokens** are compact HS256 JWTs carrying `sub`, `jti`, `roles`,
//!   and the usual time claims. They are never stored server-side; validity
//!   is proven by signature and expiry alone.
//! - **Refresh tokens** are opaque random values persisted in PostgreSQL and
//!   usable exactly once: each use revokes the token and mints a successor in
//!   the same family. Replaying a spent token revokes the whole family.
//! - Two signing domains keep ordinary API access (`access-api`) and role
//!   administration (`admin-ops`) cryptographically separate; admin tokens are
//!   minted only for principals holding the `Admin` role.
//!
//! ## Passwords
//!
//! Password hashes are self-describing PBKDF2-HMAC-SHA256 records: the salt,
//! iteration count, and PRF travel inside the stored value, so parameters can
//! change without a migration.
//!
//! ## Storage
//!
//! PostgreSQL holds principals, roles, and refresh tokens. `sql/schema.sql`
//! is idempotent and applied out of band.

pub mod api;
pub mod cli;

pub use api::GIT_COMMIT_HASH;
