pub mod authenticate;
pub mod credentials;
pub mod lockout;
pub mod login;
pub mod otp;
pub mod password_reset;
pub mod rate_limit;
pub mod session;
pub mod token;
