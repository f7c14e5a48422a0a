use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::app_error::{AppError, AppResult};

/// Header names the gateway may use for the callback signature, in lookup order.
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-toyyibpay-signature", "toyyibpay-signature"];

/// Query parameter carrying the signature on the GET callback path.
pub const SIGNATURE_QUERY_PARAM: &str = "signature";

/// `hex(sha256(payload || secret))`, lowercase.
pub fn sign_callback_payload(payload: &[u8], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a body signature. Hex case is ignored; the comparison is constant-time.
pub fn verify(raw_body: &[u8], signature: Option<&str>, secret: &str) -> bool {
    let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };

    let expected = sign_callback_payload(raw_body, secret);
    let provided = signature.to_ascii_lowercase();

    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Verifies gateway callback signatures against the configured shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    pub fn verify_body(&self, raw_body: &[u8], signature: Option<&str>) -> AppResult<()> {
        if verify(raw_body, signature, self.secret.expose_secret()) {
            Ok(())
        } else {
            Err(AppError::InvalidSignature)
        }
    }

    /// Verify a GET callback whose signature travels as a query parameter.
    ///
    /// The signed payload is the raw query string with the `signature` pair removed and
    /// the remaining pairs kept in their original order.
    pub fn verify_query(&self, raw_query: &str) -> AppResult<()> {
        let (unsigned, signature) = split_query_signature(raw_query);
        self.verify_body(unsigned.as_bytes(), signature.as_deref())
    }
}

/// Split a raw query string into (query without signature, signature value).
fn split_query_signature(raw_query: &str) -> (String, Option<String>) {
    let mut signature = None;
    let mut kept = Vec::new();

    for pair in raw_query.split('&').filter(|p| !p.is_empty()) {
        let key = pair.split_once('=').map_or(pair, |(k, _)| k);
        if key == SIGNATURE_QUERY_PARAM {
            signature = pair.split_once('=').map(|(_, v)| v.to_string());
        } else {
            kept.push(pair);
        }
    }

    (kept.join("&"), signature)
}
