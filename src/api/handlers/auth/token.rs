//! Compact HS256 tokens signed under one of two isolated domains.
//!
//! Domain isolation is purely cryptographic: each domain has its own key, and
//! the registry refuses to start when the keys are shared or too short for
//! HMAC-SHA256.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const MIN_KEY_LEN: usize = 32;

/// Named key under which a class of tokens is signed and verified. A token
/// minted for one domain never verifies under the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningDomain {
    /// Ordinary bearer credentials for API calls.
    AccessApi,
    /// Role-management endpoints.
    AdminOps,
}

impl SigningDomain {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessApi => "access-api",
            Self::AdminOps => "admin-ops",
        }
    }
}

impl std::fmt::Display for SigningDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claim set carried by an issued token. `iss` and `aud` are copied from
/// configuration when present and carried but not validated on receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    pub jti: String,
    pub roles: Vec<String>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unsupported token type: {0}")]
    UnsupportedType(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid signing key")]
    Key,
    #[error("signing key for domain {0} is shorter than {MIN_KEY_LEN} bytes")]
    KeyTooShort(SigningDomain),
    #[error("signing domains must not share a key")]
    SharedKey,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(key: &SecretString, input: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac =
        HmacSha256::new_from_slice(key.expose_secret().as_bytes()).map_err(|_| Error::Key)?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Immutable signing-key set, loaded once at startup and never mutated.
pub struct KeyRegistry {
    access: SecretString,
    admin: SecretString,
}

impl KeyRegistry {
    /// Build the registry, rejecting keys shorter than the HMAC-SHA256
    /// minimum or shared between domains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyTooShort`] or [`Error::SharedKey`]; both are fatal
    /// configuration mistakes.
    pub fn new(access: SecretString, admin: SecretString) -> Result<Self, Error> {
        for (domain, key) in [
            (SigningDomain::AccessApi, &access),
            (SigningDomain::AdminOps, &admin),
        ] {
            if key.expose_secret().len() < MIN_KEY_LEN {
                return Err(Error::KeyTooShort(domain));
            }
        }

        let shared: bool = access
            .expose_secret()
            .as_bytes()
            .ct_eq(admin.expose_secret().as_bytes())
            .into();
        if shared {
            return Err(Error::SharedKey);
        }

        Ok(Self { access, admin })
    }

    fn key(&self, domain: SigningDomain) -> &SecretString {
        match domain {
            SigningDomain::AccessApi => &self.access,
            SigningDomain::AdminOps => &self.admin,
        }
    }

    /// Sign a claim set under a domain, producing the compact form
    /// `base64url(header).base64url(claims).base64url(mac)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or claims cannot be encoded.
    pub fn sign(&self, domain: SigningDomain, claims: &TokenClaims) -> Result<String, Error> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature = mac(self.key(domain), signing_input.as_bytes())?;
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a compact token under a domain and return its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the token is malformed or contains invalid base64/json,
    /// - the header declares anything but HS256/JWT,
    /// - the MAC does not match the domain key,
    /// - the claims are expired or not yet valid.
    pub fn verify(
        &self,
        domain: SigningDomain,
        token: &str,
        now_unix_seconds: i64,
    ) -> Result<TokenClaims, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
        if parts.next().is_some() {
            return Err(Error::TokenFormat);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(Error::UnsupportedAlg(header.alg));
        }
        if header.typ != "JWT" {
            return Err(Error::UnsupportedType(header.typ));
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        let expected = mac(self.key(domain), signing_input.as_bytes())?;
        let provided = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
        let valid: bool = expected.ct_eq(&provided).into();
        if !valid {
            return Err(Error::InvalidSignature);
        }

        let claims: TokenClaims = b64d_json(claims_b64)?;
        if claims.exp <= now_unix_seconds {
            return Err(Error::Expired);
        }
        if claims.nbf > now_unix_seconds {
            return Err(Error::NotYetValid);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const ACCESS_KEY: &str = "access-domain-key-0123456789abcdef";
    const ADMIN_KEY: &str = "admin-domain-key-0123456789abcdefg";

    fn registry() -> KeyRegistry {
        KeyRegistry::new(
            SecretString::from(ACCESS_KEY.to_string()),
            SecretString::from(ADMIN_KEY.to_string()),
        )
        .expect("valid registry")
    }

    fn test_claims() -> TokenClaims {
        TokenClaims {
            sub: "alice".to_string(),
            jti: "jti-1".to_string(),
            roles: vec!["User".to_string()],
            iat: NOW,
            nbf: NOW,
            exp: NOW + 3_600,
            iss: Some("https://aliro.dev".to_string()),
            aud: Some("aliro".to_string()),
        }
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<(), Error> {
        let registry = registry();
        let token = registry.sign(SigningDomain::AccessApi, &test_claims())?;

        // {"alg":"HS256","typ":"JWT"} in base64url.
        assert!(token.starts_with("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9."));

        let claims = registry.verify(SigningDomain::AccessApi, &token, NOW)?;
        assert_eq!(claims, test_claims());
        Ok(())
    }

    #[test]
    fn domains_are_isolated() -> Result<(), Error> {
        let registry = registry();
        let access = registry.sign(SigningDomain::AccessApi, &test_claims())?;
        let admin = registry.sign(SigningDomain::AdminOps, &test_claims())?;

        assert!(matches!(
            registry.verify(SigningDomain::AdminOps, &access, NOW),
            Err(Error::InvalidSignature)
        ));
        assert!(matches!(
            registry.verify(SigningDomain::AccessApi, &admin, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn expired_token_rejected() -> Result<(), Error> {
        let registry = registry();
        let token = registry.sign(SigningDomain::AccessApi, &test_claims())?;

        let result = registry.verify(SigningDomain::AccessApi, &token, NOW + 3_600);
        assert!(matches!(result, Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn not_yet_valid_token_rejected() -> Result<(), Error> {
        let registry = registry();
        let mut claims = test_claims();
        claims.nbf = NOW + 60;
        let token = registry.sign(SigningDomain::AccessApi, &claims)?;

        let result = registry.verify(SigningDomain::AccessApi, &token, NOW);
        assert!(matches!(result, Err(Error::NotYetValid)));
        Ok(())
    }

    #[test]
    fn tampered_claims_rejected() -> Result<(), Error> {
        let registry = registry();
        let token = registry.sign(SigningDomain::AccessApi, &test_claims())?;

        let mut claims = test_claims();
        claims.roles = vec!["Admin".to_string()];
        let forged_claims = b64e_json(&claims)?;

        let mut parts = token.split('.');
        let header = parts.next().expect("header segment");
        let _ = parts.next();
        let signature = parts.next().expect("signature segment");
        let forged = format!("{header}.{forged_claims}.{signature}");

        let result = registry.verify(SigningDomain::AccessApi, &forged, NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn unsupported_algorithm_rejected() -> Result<(), Error> {
        let registry = registry();
        let header = TokenHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        };
        let token = format!("{}.{}.sig", b64e_json(&header)?, b64e_json(&test_claims())?);

        let result = registry.verify(SigningDomain::AccessApi, &token, NOW);
        assert!(matches!(result, Err(Error::UnsupportedAlg(alg)) if alg == "none"));
        Ok(())
    }

    #[test]
    fn malformed_tokens_rejected() {
        let registry = registry();

        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(matches!(
                registry.verify(SigningDomain::AccessApi, token, NOW),
                Err(Error::TokenFormat)
            ));
        }

        assert!(matches!(
            registry.verify(SigningDomain::AccessApi, "!!!.x.y", NOW),
            Err(Error::Base64)
        ));
    }

    #[test]
    fn optional_issuer_and_audience_omitted() -> Result<(), Error> {
        let registry = registry();
        let mut claims = test_claims();
        claims.iss = None;
        claims.aud = None;

        let token = registry.sign(SigningDomain::AccessApi, &claims)?;
        let claims_b64 = token.split('.').nth(1).ok_or(Error::TokenFormat)?;
        let json = Base64UrlUnpadded::decode_vec(claims_b64).map_err(|_| Error::Base64)?;
        let text = String::from_utf8(json).expect("claims are utf8");
        assert!(!text.contains("iss"));
        assert!(!text.contains("aud"));

        let verified = registry.verify(SigningDomain::AccessApi, &token, NOW)?;
        assert_eq!(verified.iss, None);
        assert_eq!(verified.aud, None);
        Ok(())
    }

    #[test]
    fn short_key_rejected() {
        let result = KeyRegistry::new(
            SecretString::from("too-short".to_string()),
            SecretString::from(ADMIN_KEY.to_string()),
        );
        assert!(matches!(
            result,
            Err(Error::KeyTooShort(SigningDomain::AccessApi))
        ));
    }

    #[test]
    fn shared_key_rejected() {
        let result = KeyRegistry::new(
            SecretString::from(ACCESS_KEY.to_string()),
            SecretString::from(ACCESS_KEY.to_string()),
        );
        assert!(matches!(result, Err(Error::SharedKey)));
    }
}
