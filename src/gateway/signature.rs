//! Canonicalization and HMAC signing/verification of gateway parameters.
//!
//! Signing and verifying must use byte-identical canonicalization or the
//! local and remote computations diverge, so both go through
//! [`canonicalize`]. The encoding matches `application/x-www-form-urlencoded`
//! (space becomes `+`, `[A-Za-z0-9*._-]` pass through), which is what the
//! gateway computes on its side.

use std::collections::{BTreeMap, HashMap};

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Field carrying the signature in callbacks and redirect URLs.
pub const SIGNATURE_FIELD: &str = "vnp_SecureHash";
/// Field naming the signature algorithm; excluded from the signed set.
pub const SIGNATURE_TYPE_FIELD: &str = "vnp_SecureHashType";

/// ASCII-safe form-urlencoding of a single value.
pub fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn is_signature_field(key: &str) -> bool {
    key.eq_ignore_ascii_case(SIGNATURE_FIELD) || key.eq_ignore_ascii_case(SIGNATURE_TYPE_FIELD)
}

/// Serializes a parameter mapping into the exact byte string that gets
/// signed: signature fields and blank values dropped, remaining keys sorted
/// ascending, joined as `key=<encoded value>` with `&`.
pub fn canonicalize(params: &HashMap<String, String>) -> String {
    let filtered: BTreeMap<&str, &str> = params
        .iter()
        .filter(|(key, value)| !is_signature_field(key) && !value.trim().is_empty())
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    let mut data = String::new();
    for (key, value) in filtered {
        if !data.is_empty() {
            data.push('&');
        }
        data.push_str(key);
        data.push('=');
        data.push_str(&url_encode(value));
    }
    data
}

fn hmac_sha512_hex(secret: &[u8], data: &[u8]) -> String {
    // Infallible for HMAC (any key length), but stay on the fail-closed path
    // rather than panicking on adversarial input.
    let Ok(mut mac) = HmacSha512::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Computes the lowercase-hex HMAC-SHA-512 signature over the canonical form
/// of `params`, keyed by the raw bytes of `secret`.
pub fn sign(params: &HashMap<String, String>, secret: &str) -> String {
    hmac_sha512_hex(secret.as_bytes(), canonicalize(params).as_bytes())
}

/// Verifies the signature carried in `params` against a recomputation over
/// the remaining parameters. Fails closed: a missing or blank signature, or
/// any failure while recomputing, yields `false` rather than an error.
pub fn verify(params: &HashMap<String, String>, secret: &str) -> bool {
    let Some(supplied) = params
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(SIGNATURE_FIELD))
        .map(|(_, value)| value)
    else {
        return false;
    };
    if supplied.trim().is_empty() {
        return false;
    }

    let expected = sign(params, secret);
    if expected.is_empty() {
        return false;
    }

    // The gateway sends uppercase hex; comparison is case-insensitive.
    constant_time_eq(&expected, &supplied.to_ascii_lowercase())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
