use crate::core::errors::ExchangeError;
use base64::engine::general_purpose;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::{Digest, Sha1};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Result type for REST signing: the ordered query parameters to send
pub type SignatureResult = Result<Vec<(String, String)>, ExchangeError>;

/// Signed fields presented in a socket authentication request.
///
/// Built fresh for every attempt; the timestamp is part of what is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub access_key: String,
    pub signature_method: String,
    pub signature_version: String,
    pub timestamp: String,
    pub signature: String,
}

impl SignedRequest {
    /// The five fields as query parameters, in wire order
    pub fn into_pairs(self) -> Vec<(String, String)> {
        vec![
            ("accessKey".to_string(), self.access_key),
            ("signatureMethod".to_string(), self.signature_method),
            ("signatureVersion".to_string(), self.signature_version),
            ("timestamp".to_string(), self.timestamp),
            ("signature".to_string(), self.signature),
        ]
    }
}

/// Signer trait for request authentication
///
/// Implementations hold the credentials and know the exchange's canonical
/// payload format. Signing is a pure computation; credentials are validated
/// when the signer is constructed.
pub trait Signer: Send + Sync {
    /// Sign a REST request and return the query parameters to send
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        params: &[(String, String)],
    ) -> SignatureResult;

    /// Build the signed parameter set for a socket handshake, stamped now
    fn sign_ws_auth(&self, method: &str, endpoint: &str) -> Result<SignedRequest, ExchangeError>;
}

/// Percent-encode parameters into a query string, keeping the given order.
///
/// Everything outside `A-Z a-z 0-9 - _ . ~` is escaped, so a space becomes
/// `%20` rather than `+`.
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 over `payload`, base64 encoded
pub fn hmac_sha256_base64(secret: &[u8], payload: &[u8]) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;

    mac.update(payload);
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Plain SHA1 digest, hex encoded
pub fn sha1_hex(payload: &[u8]) -> String {
    hex::encode(Sha1::digest(payload))
}
