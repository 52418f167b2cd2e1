//! API handlers for Aliro.
//!
//! Route handlers are grouped by concern: `auth` carries the credential and
//! token lifecycle endpoints, `health` the liveness probe, `root` the banner.

pub mod auth;
pub mod health;
pub mod root;
