//! Object identifier validation.

/// Length of a hex-encoded SHA-256 digest.
pub const OID_HEX_LEN: usize = 64;

/// Returns true when `oid` is a lowercase hex SHA-256 digest.
///
/// Equivalent to `^[a-f0-9]{64}$`: no uppercase, no surrounding whitespace.
pub fn is_valid_oid(oid: &str) -> bool {
    oid.len() == OID_HEX_LEN && oid.bytes().all(|b| matches!(b, b'a'..=b'f' | b'0'..=b'9'))
}
