//! Multi-account management.
//!
//! Holds one venue client per configured account and fails over between
//! them when an account saturates its hourly or daily trade ceiling.

mod rotator;

pub use rotator::{Account, AccountRotator, ClientFactory, RotationDecision};
