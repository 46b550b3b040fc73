//! Opaque token minting: base-62 assessment links and session tokens,
//! 6-digit OTP codes.

use rand::Rng;

const BASE62: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Public assessment-link length.
pub const ASSESSMENT_LINK_LEN: usize = 12;
/// Session-token body length (after the `sess_` prefix).
pub const SESSION_TOKEN_LEN: usize = 32;
pub const SESSION_TOKEN_PREFIX: &str = "sess_";

pub fn mint_base62(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

pub fn mint_assessment_link() -> String {
    mint_base62(ASSESSMENT_LINK_LEN)
}

pub fn mint_session_token() -> String {
    format!("{SESSION_TOKEN_PREFIX}{}", mint_base62(SESSION_TOKEN_LEN))
}

/// Zero-padded 6-digit code.
pub fn mint_otp_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}
