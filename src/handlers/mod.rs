//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, auth context)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

pub mod admin;
pub mod auth;
pub mod funds;
pub mod health;
pub mod notifications;
pub mod packages;
pub mod payments;
pub mod payouts;
pub mod recharge;
pub mod social;
pub mod users;
pub mod wallet;
