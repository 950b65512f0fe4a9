//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and money movement.

pub mod auth_service;
pub mod commission_service;
pub mod fund_service;
pub mod notification_hub;
pub mod notification_service;
pub mod otp_service;
pub mod package_service;
pub mod payment_service;
pub mod payout_service;
pub mod purchase_service;
pub mod recharge_provider;
pub mod recharge_service;
pub mod social_service;
pub mod user_service;
pub mod wallet_service;
