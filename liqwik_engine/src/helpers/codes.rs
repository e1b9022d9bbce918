//! Short-lived codes and opaque tokens.
//!
//! Verification codes and login OTPs are six-digit numbers drawn uniformly from `100000..=999999`. Tokens embedded in
//! emailed links (bill-to-party validation, buyer payment approval) are 32 random bytes, hex encoded.
use rand::{rngs::OsRng, Rng, RngCore};

/// Lifetime of the code issued at registration.
pub const REGISTRATION_CODE_TTL_HOURS: i64 = 24;
/// Lifetime of a code issued by a resend request.
pub const RESEND_CODE_TTL_MINUTES: i64 = 15;
pub const LOGIN_OTP_TTL_MINUTES: i64 = 10;
/// How long a buyer has to approve payment after their bid is accepted.
pub const PAYMENT_APPROVAL_WINDOW_HOURS: i64 = 24;

pub fn generate_verification_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    code.to_string()
}

pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
