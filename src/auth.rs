//! Bearer-token authentication and role-based authorization.
//!
//! Tokens are JWTs signed with an asymmetric key. Every token names its key in
//! the `kid` header; the verifier resolves that id against a [`KeyRing`]
//! built once at startup from the same id/public-key pairing the issuer used.
//!
//! Verification walks a fixed sequence and stops at the first failure:
//!
//! ```text
//! header parsed → kid present → kid known → alg matches → signature → exp
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Role granted to operators. Required by the readiness probe.
pub const ROLE_ADMIN: &str = "ADMIN";

/// Role granted to ordinary API users.
pub const ROLE_USER: &str = "USER";

/// Default algorithm for issued and accepted tokens.
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

// ── Claims ────────────────────────────────────────────────────────────────────

/// The verified payload of a bearer token.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    /// Issued at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expires at, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    /// Claims issued now and valid for `ttl`.
    pub fn new(issuer: &str, subject: &str, roles: Vec<String>, ttl: Duration) -> Self {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            iss: issuer.to_owned(),
            sub: subject.to_owned(),
            iat: now,
            exp: now.saturating_add(ttl),
            roles,
        }
    }

    /// True if the claims hold at least one of `roles`.
    pub fn authorized<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles
            .iter()
            .any(|want| self.roles.iter().any(|have| have == want.as_ref()))
    }
}

// ── KeyRing ───────────────────────────────────────────────────────────────────

/// Key id → verification key. Built once at startup, read-only afterwards.
#[derive(Clone, Default)]
pub struct KeyRing {
    keys: HashMap<String, DecodingKey>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self { keys: HashMap::new() }
    }

    pub fn insert(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }

    /// Adds a PEM-encoded RSA public key (`PUBLIC KEY` or `RSA PUBLIC KEY`).
    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(AuthError::InvalidKey)?;
        Ok(self.insert(kid, key))
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize { self.keys.len() }
    pub fn is_empty(&self) -> bool { self.keys.is_empty() }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a token was not accepted, or why a token could not be issued.
///
/// The text is for logs. Clients only ever see a fixed 401 message.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("malformed token header: {0}")]
    MalformedHeader(#[source] jsonwebtoken::errors::Error),

    #[error("token header has no kid")]
    MissingKid,

    #[error("no public key for kid {0:?}")]
    UnknownKid(String),

    #[error("token signed with {found:?}, expected {expected:?}")]
    AlgorithmMismatch { expected: Algorithm, found: Algorithm },

    #[error("invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("no private key for kid {0:?}")]
    UnknownSigningKey(String),

    #[error("signing token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

// ── Auth ──────────────────────────────────────────────────────────────────────

/// Verifies (and optionally issues) bearer tokens.
///
/// Shared read-only across every request; wrap it in an `Arc`.
pub struct Auth {
    algorithm: Algorithm,
    key_ring: KeyRing,
    signing_keys: HashMap<String, EncodingKey>,
    validation: Validation,
}

impl Auth {
    /// Builds a verifier for tokens signed with `algorithm` (e.g. `"RS256"`).
    pub fn new(algorithm: &str, key_ring: KeyRing) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| AuthError::UnsupportedAlgorithm(algorithm.to_owned()))?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;

        Ok(Self { algorithm, key_ring, signing_keys: HashMap::new(), validation })
    }

    /// Registers a private key so [`generate_token`](Auth::generate_token) can
    /// sign with `kid`.
    pub fn with_signing_key(mut self, kid: impl Into<String>, key: EncodingKey) -> Self {
        self.signing_keys.insert(kid.into(), key);
        self
    }

    pub fn algorithm(&self) -> Algorithm { self.algorithm }

    /// Signs `claims` with the private key registered under `kid` and writes
    /// `kid` into the token header.
    pub fn generate_token(&self, kid: &str, claims: &Claims) -> Result<String, AuthError> {
        let key = self
            .signing_keys
            .get(kid)
            .ok_or_else(|| AuthError::UnknownSigningKey(kid.to_owned()))?;

        let mut header = Header::new(self.algorithm);
        header.kid = Some(kid.to_owned());

        jsonwebtoken::encode(&header, claims, key).map_err(AuthError::Signing)
    }

    /// Verifies `token` and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let header = jsonwebtoken::decode_header(token).map_err(AuthError::MalformedHeader)?;

        let kid = header.kid.ok_or(AuthError::MissingKid)?;
        let key = self
            .key_ring
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownKid(kid.clone()))?;

        // Checked before touching the signature so a token cannot pick a
        // weaker algorithm than the one configured.
        if header.alg != self.algorithm {
            return Err(AuthError::AlgorithmMismatch { expected: self.algorithm, found: header.alg });
        }

        let data = jsonwebtoken::decode::<Claims>(token, key, &self.validation)
            .map_err(AuthError::InvalidToken)?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorized_is_any_overlap() {
        let claims = Claims::new("garrison", "123", vec![ROLE_USER.into()], Duration::from_secs(60));
        assert!(claims.authorized(&[ROLE_USER]));
        assert!(claims.authorized(&[ROLE_ADMIN, ROLE_USER]));
        assert!(!claims.authorized(&[ROLE_ADMIN]));
        assert!(!claims.authorized::<&str>(&[]));
    }

    #[test]
    fn claims_window() {
        let claims = Claims::new("garrison", "123", vec![], Duration::from_secs(3600));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = Auth::new("RS999", KeyRing::new()).err().unwrap();
        assert!(matches!(err, AuthError::UnsupportedAlgorithm(a) if a == "RS999"));
    }

    #[test]
    fn garbage_token_fails_at_the_header() {
        let auth = Auth::new("RS256", KeyRing::new()).unwrap();
        assert!(matches!(auth.validate_token("not-a-jwt"), Err(AuthError::MalformedHeader(_))));
    }

    #[test]
    fn hmac_round_trip_through_key_ring() {
        // Symmetric keys exercise the same kid lookup without PEM fixtures.
        let ring = KeyRing::new().insert("k1", DecodingKey::from_secret(b"s3cret"));
        let auth = Auth::new("HS256", ring)
            .unwrap()
            .with_signing_key("k1", EncodingKey::from_secret(b"s3cret"));

        let claims = Claims::new("garrison", "42", vec![ROLE_ADMIN.into()], Duration::from_secs(60));
        let token = auth.generate_token("k1", &claims).unwrap();
        assert_eq!(auth.validate_token(&token).unwrap(), claims);

        assert!(matches!(auth.generate_token("k2", &claims), Err(AuthError::UnknownSigningKey(_))));
    }

    const PUBLIC_PEM: &[u8] = include_bytes!("../tests/fixtures/public.pem");
    const PRIVATE_PEM: &[u8] = include_bytes!("../tests/fixtures/private.pem");

    fn rs256() -> Auth {
        let ring = KeyRing::new().with_rsa_pem("k1", PUBLIC_PEM).unwrap();
        Auth::new("RS256", ring).unwrap()
    }

    fn claims() -> Claims {
        Claims::new("garrison", "42", vec![ROLE_ADMIN.into()], Duration::from_secs(60))
    }

    #[test]
    fn declared_algorithm_must_match_the_configured_one() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("k1".to_owned());
        // HMAC keyed with the public key bytes: the classic downgrade attempt.
        let token = jsonwebtoken::encode(&header, &claims(), &EncodingKey::from_secret(PUBLIC_PEM)).unwrap();

        let err = rs256().validate_token(&token).unwrap_err();
        assert!(matches!(
            err,
            AuthError::AlgorithmMismatch { expected: Algorithm::RS256, found: Algorithm::HS256 }
        ));
    }

    #[test]
    fn token_without_kid_is_rejected() {
        let key = EncodingKey::from_rsa_pem(PRIVATE_PEM).unwrap();
        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims(), &key).unwrap();

        assert!(matches!(rs256().validate_token(&token), Err(AuthError::MissingKid)));
    }

    #[test]
    fn rsa_round_trip() {
        let auth = rs256().with_signing_key("k1", EncodingKey::from_rsa_pem(PRIVATE_PEM).unwrap());
        let claims = claims();
        let token = auth.generate_token("k1", &claims).unwrap();
        assert_eq!(auth.validate_token(&token).unwrap(), claims);
    }
}
