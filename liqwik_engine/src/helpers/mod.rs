mod codes;
mod password;
mod validation;

pub use codes::{
    generate_verification_code,
    random_token,
    LOGIN_OTP_TTL_MINUTES,
    PAYMENT_APPROVAL_WINDOW_HOURS,
    REGISTRATION_CODE_TTL_HOURS,
    RESEND_CODE_TTL_MINUTES,
};
pub use password::{hash_password, verify_password, PasswordError};
pub use validation::{is_valid_email, MIN_PASSWORD_LENGTH};
