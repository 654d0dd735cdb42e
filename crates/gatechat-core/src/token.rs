use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired credential")]
    InvalidToken,
    #[error("internal error: {0}")]
    Internal(String),
}

/// Verified payload of the bearer token. Issued by the external entitlement
/// service; this subsystem only ever validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// User id (wallet address in the original deployment).
    pub sub: String,
    #[serde(default, rename = "nftCount")]
    pub nft_count: i64,
    #[serde(default, rename = "isAdmin")]
    pub is_admin: bool,
    /// Target room. Absent on credentials issued before multi-room support.
    #[serde(default)]
    pub room: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

/// HS256 verification: three base64url parts, HMAC-SHA256 signature compared
/// in constant time, expiry checked with zero leeway. Any failure collapses
/// to `InvalidToken`; the token contents are never logged.
pub fn verify_token(token: &str, secret: &str) -> Result<Claim, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claim>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

/// Counterpart to `verify_token`, shared with the issuance service and tests
/// so the claim layout has a single definition.
pub fn create_token(
    user_id: &str,
    nft_count: i64,
    is_admin: bool,
    room: Option<&str>,
    secret: &str,
    expiry_secs: u64,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claim = Claim {
        sub: user_id.to_string(),
        nft_count,
        is_admin,
        room: room.map(str::to_string),
        iat: now,
        exp: now + expiry_secs as usize,
    };
    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-signing-secret";

    #[test]
    fn valid_token_round_trips_every_claim_field() {
        let token = create_token("0xabc", 50, true, Some("whale"), SECRET, 600).expect("token");
        let claim = verify_token(&token, SECRET).expect("verify");
        assert_eq!(claim.sub, "0xabc");
        assert_eq!(claim.nft_count, 50);
        assert!(claim.is_admin);
        assert_eq!(claim.room.as_deref(), Some("whale"));
    }

    #[test]
    fn mutated_signature_is_rejected() {
        let token = create_token("0xabc", 1, false, None, SECRET, 600).expect("token");
        let (rest, sig) = token.rsplit_once('.').expect("three parts");
        // Flip one character of the signature.
        let mut sig_bytes: Vec<u8> = sig.bytes().collect();
        sig_bytes[0] = if sig_bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!("{rest}.{}", String::from_utf8(sig_bytes).expect("utf8"));
        assert!(verify_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("0xabc", 1, false, None, SECRET, 600).expect("token");
        assert!(verify_token(&token, "some-other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = chrono::Utc::now().timestamp() as usize;
        let claim = Claim {
            sub: "0xabc".to_string(),
            nft_count: 1,
            is_admin: false,
            room: None,
            iat: now - 600,
            exp: now - 120,
        };
        let token = encode(
            &Header::default(),
            &claim,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode");
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(verify_token("not-a-token", SECRET).is_err());
        assert!(verify_token("a.b", SECRET).is_err());
        assert!(verify_token("", SECRET).is_err());
    }
}
