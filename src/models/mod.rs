//! Data models representing database entities and API payloads.

/// Deposit requests
pub mod fund;
/// Notification records
pub mod notification;
/// One-time passwords
pub mod otp;
/// Packages and commission tables
pub mod package;
/// Manual payment verification
pub mod payment;
/// Withdrawals
pub mod payout;
/// Purchases and commission credits
pub mod purchase;
/// Mobile and DTH recharges
pub mod recharge;
/// Social tasks and actions
pub mod social;
/// Members, auth payloads and KYC
pub mod user;
/// Balances and ledger
pub mod wallet;
