use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a generated token (hex-encoded to 64 chars).
const TOKEN_LENGTH: usize = 32;

/// Generate a random opaque token from the operating system CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Sign a token against a session identifier.
///
/// Format: HMAC-SHA256(token || session_id, secret), hex-encoded. Binding
/// the session id into the MAC means a token lifted from one session
/// cannot be replayed against another.
pub fn sign(secret: &[u8], token: &str, session_id: &str) -> String {
    // HMAC-SHA256 accepts keys of any length.
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(token.as_bytes());
    mac.update(session_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a token/signature pair against a session identifier using
/// constant-time comparison.
///
/// Returns `false` on any malformed input (empty token, empty signature,
/// empty session id) rather than erroring.
pub fn verify(secret: &[u8], token: &str, signature: &str, session_id: &str) -> bool {
    if token.is_empty() || signature.is_empty() || session_id.is_empty() {
        return false;
    }

    let expected = sign(secret, token, session_id);

    let expected_bytes = expected.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(signature_bytes).into()
}
