//! Client assertion signing
//!
//! The token endpoint authenticates the client with an RS256-signed JWT whose
//! issuer is the redirect domain registered with the certificate and whose
//! subject is the client id. The assertion is long-lived; sign it once and
//! hand the result to [`crate::ClientCredentials`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;

use crate::constants::ASSERTION_AUDIENCE;
use crate::error::{Error, Result};

/// Lifetime used when the caller has no preference.
pub const DEFAULT_ASSERTION_LIFETIME: Duration = Duration::from_secs(90 * 24 * 60 * 60);

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Sign a client assertion with a PEM-encoded RSA private key.
pub fn sign_assertion(
    private_key_pem: &[u8],
    issuer: &str,
    client_id: &str,
    lifetime: Duration,
) -> Result<String> {
    if issuer.is_empty() || client_id.is_empty() {
        return Err(Error::Signing("issuer and client id are required".into()));
    }
    let key = EncodingKey::from_rsa_pem(private_key_pem)
        .map_err(|e| Error::Signing(format!("loading private key: {e}")))?;

    let iat = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let claims = AssertionClaims {
        iss: issuer,
        sub: client_id,
        aud: ASSERTION_AUDIENCE,
        iat,
        exp: iat.saturating_add(lifetime.as_secs()),
    };

    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| Error::Signing(format!("encoding assertion: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde::Deserialize;

    const PRIVATE_KEY: &[u8] = include_bytes!("../tests/fixtures/assertion_key.pem");
    const PUBLIC_KEY: &[u8] = include_bytes!("../tests/fixtures/assertion_key.pub.pem");

    #[derive(Debug, Deserialize)]
    struct Decoded {
        iss: String,
        sub: String,
        aud: String,
        iat: u64,
        exp: u64,
    }

    #[test]
    fn assertion_verifies_with_public_key() {
        let token =
            sign_assertion(PRIVATE_KEY, "example.com", "client-123", DEFAULT_ASSERTION_LIFETIME).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[ASSERTION_AUDIENCE]);
        validation.set_issuer(&["example.com"]);
        let decoded = decode::<Decoded>(
            &token,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, "example.com");
        assert_eq!(decoded.claims.sub, "client-123");
        assert_eq!(decoded.claims.aud, "https://revolut.com");
        assert_eq!(
            decoded.claims.exp - decoded.claims.iat,
            DEFAULT_ASSERTION_LIFETIME.as_secs()
        );
    }

    #[test]
    fn header_names_rs256() {
        let token = sign_assertion(PRIVATE_KEY, "example.com", "client-123", Duration::from_secs(60)).unwrap();
        let header = token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn bad_key_is_a_signing_error() {
        let err = sign_assertion(b"not a key", "example.com", "client-123", Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[test]
    fn missing_identity_is_rejected() {
        let err = sign_assertion(PRIVATE_KEY, "", "client-123", Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }
}
