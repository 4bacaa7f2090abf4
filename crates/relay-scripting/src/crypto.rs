//! Crypto helpers backing the `ph` bridge namespace.
//!
//! Two fixed primitives: a SHA-256 content digest in base64 form, and RS256
//! token signing. The signing helper merges caller claims with host-injected
//! timing claims; the host claims always win on collision.

use crate::error::ScriptError;
use base64::{engine::general_purpose, Engine as _};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Clock-skew allowance subtracted from `iat` and `nbf`.
pub const CLOCK_SKEW_SECS: i64 = 5;

/// Token lifetime: `exp` is issued this far past now.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Base64-encoded SHA-256 digest of `body`. Pure function of its input.
pub fn body_digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Sign a JWT over `additional_claims` with the given RSA private key (PEM).
///
/// The algorithm is pinned to RS256 regardless of what `header` requests.
/// Host timing claims are injected on top of the caller's claim set:
/// `iat = nbf = now - CLOCK_SKEW_SECS`, `exp = now + TOKEN_TTL_SECS`.
pub fn sign_jwt(
    header: &Value,
    additional_claims: &Value,
    private_key: &str,
) -> Result<String, ScriptError> {
    let Value::Object(header_fields) = header else {
        return Err(ScriptError::crypto("JWT header must be an object"));
    };
    let Value::Object(additional) = additional_claims else {
        return Err(ScriptError::crypto("JWT claims must be an object"));
    };

    let mut header_fields = header_fields.clone();
    header_fields.insert("alg".into(), json!("RS256"));
    let mut header: Header = serde_json::from_value(Value::Object(header_fields))
        .map_err(|e| ScriptError::crypto(format!("invalid JWT header: {}", e)))?;
    header.alg = Algorithm::RS256;

    let now = unix_now();
    let mut claim_set = additional.clone();
    claim_set.insert("iat".into(), json!(now - CLOCK_SKEW_SECS));
    claim_set.insert("nbf".into(), json!(now - CLOCK_SKEW_SECS));
    claim_set.insert("exp".into(), json!(now + TOKEN_TTL_SECS));

    let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
        .map_err(|e| ScriptError::crypto(format!("invalid RSA private key: {}", e)))?;

    encode(&header, &Value::Object(claim_set), &key)
        .map_err(|e| ScriptError::crypto(format!("JWT signing failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    const RSA_PRIVATE_PEM: &str = include_str!("../tests/fixtures/rsa_private.pem");
    const RSA_PUBLIC_PEM: &str = include_str!("../tests/fixtures/rsa_public.pem");

    #[test]
    fn digest_matches_known_vectors() {
        assert_eq!(body_digest(""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
        assert_eq!(body_digest("abc"), "ungWv48Bz+pBQUDeXa4iI7ADYaOWF3qctBD/YfIAFa0=");
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(body_digest("{\"plan\":\"pro\"}"), body_digest("{\"plan\":\"pro\"}"));
    }

    #[test]
    fn sign_rejects_non_object_header_and_claims() {
        let err = sign_jwt(&json!("nope"), &json!({}), RSA_PRIVATE_PEM).unwrap_err();
        assert!(err.to_string().contains("header must be an object"));

        let err = sign_jwt(&json!({}), &json!(42), RSA_PRIVATE_PEM).unwrap_err();
        assert!(err.to_string().contains("claims must be an object"));
    }

    #[test]
    fn sign_rejects_garbage_keys() {
        let err = sign_jwt(&json!({}), &json!({}), "not a pem").unwrap_err();
        assert!(matches!(err, ScriptError::CryptoError { .. }));
    }

    #[test]
    fn host_timing_claims_override_caller_claims() {
        let token = sign_jwt(
            &json!({"typ": "JWT"}),
            &json!({"sub": "user-1", "iat": 0, "exp": 1}),
            RSA_PRIVATE_PEM,
        )
        .unwrap();

        let key = DecodingKey::from_rsa_pem(RSA_PUBLIC_PEM.as_bytes()).unwrap();
        let data = decode::<Value>(&token, &key, &Validation::new(Algorithm::RS256)).unwrap();

        assert_eq!(data.header.alg, Algorithm::RS256);
        assert_eq!(data.claims["sub"], "user-1");

        let iat = data.claims["iat"].as_i64().unwrap();
        let nbf = data.claims["nbf"].as_i64().unwrap();
        let exp = data.claims["exp"].as_i64().unwrap();
        assert_ne!(iat, 0);
        assert!(nbf <= iat);
        assert!(iat < exp);
        assert_eq!(exp - iat, TOKEN_TTL_SECS + CLOCK_SKEW_SECS);
    }

    #[test]
    fn algorithm_is_pinned_even_when_header_requests_another() {
        let token = sign_jwt(&json!({"alg": "HS256"}), &json!({}), RSA_PRIVATE_PEM).unwrap();
        let key = DecodingKey::from_rsa_pem(RSA_PUBLIC_PEM.as_bytes()).unwrap();
        let data = decode::<Value>(&token, &key, &Validation::new(Algorithm::RS256)).unwrap();
        assert_eq!(data.header.alg, Algorithm::RS256);
    }
}
