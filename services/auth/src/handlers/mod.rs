pub mod client;
pub mod health;
pub mod login;
pub mod mfa;
pub mod password_reset;
pub mod principal;
pub mod rate_limit;
pub mod sessions;
pub mod unlock;
