mod lockout_test;
mod login_test;
mod otp_test;
mod session_test;
