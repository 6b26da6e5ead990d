/// Token issuance and verification
///
/// Tokens are `header.payload.signature`, each segment URL-safe base64
/// without padding, signed with HMAC-SHA256 over `header.payload`.
/// Access and refresh tokens carry the same claims and differ only in
/// `exp`. There is no server-side session state: a token is valid until it
/// expires or the signing secret changes.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, Identity};
use crate::auth::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Access/refresh pair produced by one issuance
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies session tokens with a process-wide secret.
///
/// Keys are derived once at startup and shared read-only across workers.
#[derive(Clone)]
pub struct TokenService {
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(settings: &JwtSettings, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against `clock` below, without leeway.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            header: Header::new(Algorithm::HS256),
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            access_token_expiry: settings.access_token_expiry,
            refresh_token_expiry: settings.refresh_token_expiry,
            clock,
        }
    }

    /// Mint an access/refresh pair for `identity`, both stamped with the same `iat`
    ///
    /// # Errors
    /// Returns an internal error if claim serialization fails
    pub fn issue(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        let now = self.clock.now();

        let access_token = self.sign(&Claims::new(identity, now, self.access_token_expiry))?;
        let refresh_token = self.sign(&Claims::new(identity, now, self.refresh_token_expiry))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Return the embedded claims if `token` is well-formed, correctly signed
    /// and not expired. Every failure collapses to `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        if token.split('.').count() != 3 {
            tracing::debug!("Token rejected: wrong segment count");
            return None;
        }

        let claims = match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "Token rejected");
                return None;
            }
        };

        if claims.is_expired_at(self.clock.now()) {
            tracing::debug!(user_id = claims.subject_id, "Token rejected: expired");
            return None;
        }

        Some(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&self.header, claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use crate::auth::clock::ManualClock;

    const START: i64 = 1_700_000_000;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        }
    }

    fn service() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        (TokenService::new(&get_test_config(), clock.clone()), clock)
    }

    fn student() -> Identity {
        Identity {
            subject_id: 1,
            email: "a@u.edu".to_string(),
            role: Role::Student,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let (tokens, _) = service();
        let pair = tokens.issue(&student()).expect("Failed to issue tokens");

        let claims = tokens.verify(&pair.access_token).expect("Access token rejected");
        assert_eq!(claims.subject_id, 1);
        assert_eq!(claims.email, "a@u.edu");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.issued_at, START);
        assert_eq!(claims.expires_at, START + 900);

        let refresh = tokens.verify(&pair.refresh_token).expect("Refresh token rejected");
        assert_eq!(refresh.expires_at, START + 604800);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[test]
    fn test_three_base64url_segments() {
        let (tokens, _) = service();
        let pair = tokens.issue(&student()).unwrap();

        let segments: Vec<&str> = pair.access_token.split('.').collect();
        assert_eq!(segments.len(), 3);
        for segment in segments {
            assert!(!segment.contains('='));
            assert!(!segment.contains('+'));
            assert!(!segment.contains('/'));
        }
    }

    #[test]
    fn test_access_token_expires_after_fifteen_minutes() {
        let (tokens, clock) = service();
        let pair = tokens.issue(&student()).unwrap();

        clock.advance(900);
        assert!(tokens.verify(&pair.access_token).is_some());

        clock.advance(1);
        assert!(tokens.verify(&pair.access_token).is_none());
        assert!(tokens.verify(&pair.refresh_token).is_some());
    }

    #[test]
    fn test_refresh_token_expires_after_seven_days() {
        let (tokens, clock) = service();
        let pair = tokens.issue(&student()).unwrap();

        clock.advance(604800 + 1);
        assert!(tokens.verify(&pair.refresh_token).is_none());
    }

    #[test]
    fn test_malformed_tokens() {
        let (tokens, _) = service();

        assert!(tokens.verify("").is_none());
        assert!(tokens.verify("invalid.token.here").is_none());
        assert!(tokens.verify("only.two").is_none());
        assert!(tokens.verify("a.b.c.d").is_none());
    }

    #[test]
    fn test_tampered_signature() {
        let (tokens, _) = service();
        let pair = tokens.issue(&student()).unwrap();

        let (unsigned, signature) = pair.access_token.rsplit_once('.').unwrap();
        let first = signature.chars().next().unwrap();
        let replacement = if first == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}{}", unsigned, replacement, &signature[1..]);

        assert!(tokens.verify(&tampered).is_none());
    }

    #[test]
    fn test_forged_payload_with_original_signature() {
        let (tokens, _) = service();
        let pair = tokens.issue(&student()).unwrap();
        let admin = tokens
            .issue(&Identity {
                role: Role::Admin,
                ..student()
            })
            .unwrap();

        let original: Vec<&str> = pair.access_token.split('.').collect();
        let forged: Vec<&str> = admin.access_token.split('.').collect();
        let spliced = format!("{}.{}.{}", original[0], forged[1], original[2]);

        assert!(tokens.verify(&spliced).is_none());
    }

    #[test]
    fn test_wrong_secret() {
        let (tokens, clock) = service();
        let pair = tokens.issue(&student()).unwrap();

        let mut other = get_test_config();
        other.secret = "a-different-secret-that-is-also-32-bytes".to_string();
        let rotated = TokenService::new(&other, clock);

        assert!(rotated.verify(&pair.access_token).is_none());
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let (tokens, _) = service();
        let pair = tokens.issue(&student()).unwrap();
        let payload = pair.access_token.split('.').nth(1).unwrap();

        // {"alg":"none","typ":"JWT"}
        let none_header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";
        assert!(tokens.verify(&format!("{}.{}.", none_header, payload)).is_none());
    }
}
