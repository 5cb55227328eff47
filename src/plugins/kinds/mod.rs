//! Built-in test kinds

pub mod compliance;
pub mod performance;
pub mod security_adv;
pub mod security_basic;
pub mod stability;
