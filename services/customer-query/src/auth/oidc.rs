//! JWT bearer validation against a cached JWKS.
//!
//! # Purpose
//! Validate inbound access tokens issued by the configured OAuth authorization
//! server using the keys it publishes at its JWKS URI.
//!
//! # Key invariants
//! - The token header algorithm must equal the configured signing algorithm.
//! - The `kid` must resolve to a JWK whose key type fits that algorithm.
//! - `iss`, `aud`, `exp` and `sub` are all required and checked.
//! - The JWKS cache is time-bounded and refreshed once when a `kid` is unknown,
//!   which covers key rotation without refetching on every request.
//!
//! # Concurrency model
//! The JWKS cache lives in a `DashMap` shared by every clone of the verifier.
//!
//! # Security model
//! Claims are decoded without verification only to compare the issuer before
//! any network work; they are trusted only after signature verification.
use crate::auth::{AuthError, Principal, TokenVerifier};
use crate::config::OidcConfig;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use dashmap::DashMap;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(600);
const DEFAULT_CLOCK_SKEW_SECONDS: u64 = 60;

/// Verifier for bearer tokens issued by a single OAuth issuer.
///
/// # Examples
/// ```rust,no_run
/// use customer_query::auth::oidc::JwtVerifier;
/// use customer_query::config::OidcConfig;
///
/// fn build(config: OidcConfig) -> JwtVerifier {
///     JwtVerifier::new(config)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JwtVerifier {
    client: reqwest::Client,
    config: OidcConfig,
    jwks_cache: Arc<DashMap<String, CachedJwks>>,
    jwks_ttl: Duration,
    clock_skew_seconds: u64,
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

impl JwtVerifier {
    pub fn new(config: OidcConfig) -> Self {
        Self::with_cache_ttl(config, DEFAULT_JWKS_TTL, DEFAULT_CLOCK_SKEW_SECONDS)
    }

    pub fn with_cache_ttl(
        config: OidcConfig,
        jwks_ttl: Duration,
        clock_skew_seconds: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            jwks_cache: Arc::new(DashMap::new()),
            jwks_ttl,
            clock_skew_seconds,
        }
    }

    /// Validate a bearer token and return the verified caller.
    ///
    /// # Errors
    /// - `AuthError::UnsupportedAlgorithm` if the header algorithm is not the configured one.
    /// - `AuthError::IssuerNotAllowed` if `iss` is not the configured issuer.
    /// - `AuthError::MissingKeyId` / `AuthError::JwksKeyNotFound` when no key can be resolved.
    /// - `AuthError::Jwt` for signature, audience, or expiry failures.
    pub async fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token)?;
        if header.alg != self.config.algorithm {
            return Err(AuthError::UnsupportedAlgorithm);
        }
        let kid = header.kid.as_deref().ok_or(AuthError::MissingKeyId)?;

        // Reject foreign issuers before touching the network.
        let unverified = decode_unverified_claims(token)?;
        match extract_string_claim(&unverified, "iss") {
            Some(issuer) if issuer == self.config.issuer => {}
            _ => return Err(AuthError::IssuerNotAllowed),
        }

        let jwks_uri = self.config.jwks_uri.as_str();
        let jwks = self.get_jwks(jwks_uri).await?;
        let decoding_key = match find_jwk(&jwks, kid) {
            Some(key) => decoding_key_for(key, header.alg)?,
            None => {
                let refreshed = self.refresh_jwks(jwks_uri).await?;
                let key = find_jwk(&refreshed, kid).ok_or(AuthError::JwksKeyNotFound)?;
                decoding_key_for(key, header.alg)?
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);
        validation
            .required_spec_claims
            .extend(["iss".to_string(), "aud".to_string()]);
        validation.leeway = self.clock_skew_seconds;

        let token = decode::<Value>(token, &decoding_key, &validation)?;
        validate_iat(&token.claims, self.clock_skew_seconds)?;
        let subject =
            extract_string_claim(&token.claims, "sub").ok_or(AuthError::MissingSubject)?;

        Ok(Principal {
            issuer: self.config.issuer.clone(),
            subject,
        })
    }

    async fn get_jwks(&self, jwks_uri: &str) -> Result<JwkSet, AuthError> {
        if let Some(entry) = self.jwks_cache.get(jwks_uri)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks.clone());
        }
        self.refresh_jwks(jwks_uri).await
    }

    async fn refresh_jwks(&self, jwks_uri: &str) -> Result<JwkSet, AuthError> {
        let jwks: JwkSet = self
            .client
            .get(jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(keys = jwks.keys.len(), "jwks refreshed");
        self.jwks_cache.insert(
            jwks_uri.to_string(),
            CachedJwks {
                jwks: jwks.clone(),
                expires_at: Instant::now() + self.jwks_ttl,
            },
        );
        Ok(jwks)
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        self.validate(token).await
    }
}

fn decoding_key_for(jwk: &Jwk, alg: Algorithm) -> Result<DecodingKey, AuthError> {
    ensure_jwk_matches_algorithm(jwk, alg)?;
    Ok(DecodingKey::from_jwk(jwk)?)
}

fn ensure_jwk_matches_algorithm(jwk: &Jwk, alg: Algorithm) -> Result<(), AuthError> {
    // `alg` is optional in a JWK; when present it has to agree with the token.
    if let Some(key_alg) = jwk.common.key_algorithm
        && !key_algorithm_matches(key_alg, alg)
    {
        return Err(AuthError::InvalidJwk("alg mismatch".to_string()));
    }
    match (&jwk.algorithm, alg) {
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => Ok(()),
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            expect_curve(params.curve.clone(), EllipticCurve::P256)
        }
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES384) => {
            expect_curve(params.curve.clone(), EllipticCurve::P384)
        }
        _ => Err(AuthError::InvalidJwk("kty mismatch".to_string())),
    }
}

fn expect_curve(actual: EllipticCurve, expected: EllipticCurve) -> Result<(), AuthError> {
    if actual != expected {
        return Err(AuthError::InvalidJwk("unexpected EC curve".to_string()));
    }
    Ok(())
}

fn key_algorithm_matches(key_alg: KeyAlgorithm, alg: Algorithm) -> bool {
    matches!(
        (key_alg, alg),
        (KeyAlgorithm::RS256, Algorithm::RS256)
            | (KeyAlgorithm::RS384, Algorithm::RS384)
            | (KeyAlgorithm::RS512, Algorithm::RS512)
            | (KeyAlgorithm::PS256, Algorithm::PS256)
            | (KeyAlgorithm::PS384, Algorithm::PS384)
            | (KeyAlgorithm::PS512, Algorithm::PS512)
            | (KeyAlgorithm::ES256, Algorithm::ES256)
            | (KeyAlgorithm::ES384, Algorithm::ES384)
    )
}

fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}

fn decode_unverified_claims(token: &str) -> Result<Value, AuthError> {
    let mut parts = token.split('.');
    let _header = parts.next();
    let payload = parts
        .next()
        .ok_or_else(|| AuthError::InvalidClaim("token format".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::InvalidClaim("token payload".to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| AuthError::InvalidClaim(format!("token payload: {err}")))
}

fn extract_string_claim(claims: &Value, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
}

fn validate_iat(claims: &Value, leeway_seconds: u64) -> Result<(), AuthError> {
    // `iat` is optional; when present it must not be in the future.
    let Some(iat) = claims.get("iat") else {
        return Ok(());
    };
    let iat = iat
        .as_i64()
        .ok_or_else(|| AuthError::InvalidClaim("iat".to_string()))?;
    if iat > Utc::now().timestamp() + leeway_seconds as i64 {
        return Err(AuthError::InvalidClaim("iat in future".to_string()));
    }
    Ok(())
}
