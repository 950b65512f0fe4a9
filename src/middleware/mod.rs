//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Short-circuit requests (reject unauthorized or non-admin callers)

/// JWT authentication and the admin gate
pub mod auth;
