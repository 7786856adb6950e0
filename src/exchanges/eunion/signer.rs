use crate::core::config::{ConfigError, ExchangeConfig};
use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{
    encode_query, hmac_sha256_base64, sha1_hex, SignatureResult, SignedRequest, Signer,
};
use secrecy::{ExposeSecret, Secret};

pub const EUNION_HOST_NAME: &str = "api.eunion.pro";
pub const SIGNATURE_METHOD: &str = "HmacSHA256";
pub const SIGNATURE_VERSION: &str = "2.1";

/// Timestamp layout for socket signatures: UTC, second precision, no zone suffix
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Eunion request signer
///
/// Carries two unrelated schemes:
/// - socket handshake: HMAC-SHA256 over `METHOD\nHOST\nPATH\nQUERY`, base64
/// - legacy REST: SHA1 hex over `api_id=KEY&QUERY&secret_key=SECRET`
#[derive(Debug, Clone)]
pub struct EunionAuth {
    api_key: Secret<String>,
    secret_key: Secret<String>,
    hostname: String,
}

impl EunionAuth {
    /// Fails with a configuration error when either credential is empty.
    pub fn new(api_key: String, secret_key: String) -> Result<Self, ExchangeError> {
        if api_key.is_empty() {
            return Err(
                ConfigError::InvalidConfiguration("Eunion API key is empty".to_string()).into(),
            );
        }
        if secret_key.is_empty() {
            return Err(
                ConfigError::InvalidConfiguration("Eunion secret key is empty".to_string()).into(),
            );
        }

        Ok(Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            hostname: EUNION_HOST_NAME.to_string(),
        })
    }

    pub fn from_config(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        Self::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        )
    }

    /// Override the host name that goes into the signed payload
    pub fn with_hostname(mut self, hostname: String) -> Self {
        self.hostname = hostname;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Current UTC time in the layout the socket handshake expects
    pub fn utc_timestamp() -> String {
        chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Lexicographic key order, for endpoints that require sorted parameters.
    ///
    /// Signing never sorts on its own; callers opt in explicitly.
    pub fn keysort(params: &[(String, String)]) -> Vec<(String, String)> {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        sorted
    }

    /// Add authentication fields to `args`, stamped with the current time
    pub fn add_auth_to_params(
        &self,
        method: &str,
        path_url: &str,
        args: &[(String, String)],
        is_ws: bool,
    ) -> SignatureResult {
        self.add_auth_to_params_at(method, path_url, args, is_ws, &Self::utc_timestamp())
    }

    /// Same as [`add_auth_to_params`](Self::add_auth_to_params) with a fixed timestamp
    pub fn add_auth_to_params_at(
        &self,
        method: &str,
        path_url: &str,
        args: &[(String, String)],
        is_ws: bool,
        timestamp: &str,
    ) -> SignatureResult {
        if !is_ws {
            let check_sum = format!(
                "api_id={}&{}&secret_key={}",
                self.api_key.expose_secret(),
                encode_query(args),
                self.secret_key.expose_secret()
            );

            let mut params = vec![
                ("api_id".to_string(), self.api_key.expose_secret().clone()),
                ("sign".to_string(), sha1_hex(check_sum.as_bytes())),
            ];
            params.extend_from_slice(args);
            return Ok(params);
        }

        let mut params = self.ws_auth_params_at(method, path_url, timestamp)?.into_pairs();
        params.extend_from_slice(args);
        Ok(params)
    }

    /// Signed handshake fields for the socket endpoint at `timestamp`
    pub fn ws_auth_params_at(
        &self,
        method: &str,
        path_url: &str,
        timestamp: &str,
    ) -> Result<SignedRequest, ExchangeError> {
        let params = [
            ("accessKey".to_string(), self.api_key.expose_secret().clone()),
            ("signatureMethod".to_string(), SIGNATURE_METHOD.to_string()),
            ("signatureVersion".to_string(), SIGNATURE_VERSION.to_string()),
            ("timestamp".to_string(), timestamp.to_string()),
        ];
        let signature = self.generate_signature(method, path_url, &params, true)?;

        let [access_key, signature_method, signature_version, timestamp] =
            params.map(|(_, value)| value);
        Ok(SignedRequest {
            access_key,
            signature_method,
            signature_version,
            timestamp,
            signature,
        })
    }

    /// Signature for a request on this signer's host.
    ///
    /// REST paths are versioned under `/v1`; socket paths are used as given.
    pub fn generate_signature(
        &self,
        method: &str,
        path_url: &str,
        params: &[(String, String)],
        is_ws: bool,
    ) -> Result<String, ExchangeError> {
        let query_endpoint = if is_ws {
            path_url.to_string()
        } else {
            format!("/v1{}", path_url)
        };

        self.compute_signature(method, &self.hostname, &query_endpoint, params)
    }

    /// HMAC-SHA256 of `METHOD\nHOSTNAME\nPATH\nENCODED_PARAMS` with the secret key, base64
    ///
    /// The payload layout is a wire contract with the exchange and must stay
    /// byte-for-byte stable: parameters are encoded in the order given.
    pub fn compute_signature(
        &self,
        method: &str,
        hostname: &str,
        path: &str,
        params: &[(String, String)],
    ) -> Result<String, ExchangeError> {
        let payload = [
            method.to_uppercase().as_str(),
            hostname,
            path,
            encode_query(params).as_str(),
        ]
        .join("\n");

        hmac_sha256_base64(
            self.secret_key.expose_secret().as_bytes(),
            payload.as_bytes(),
        )
    }

    pub fn format_get_param_url(url: &str, params: &[(String, String)]) -> String {
        format!("{}?{}", url, encode_query(params))
    }
}

impl Signer for EunionAuth {
    fn sign_request(
        &self,
        method: &str,
        endpoint: &str,
        params: &[(String, String)],
    ) -> SignatureResult {
        self.add_auth_to_params(method, endpoint, params, false)
    }

    fn sign_ws_auth(&self, method: &str, endpoint: &str) -> Result<SignedRequest, ExchangeError> {
        self.ws_auth_params_at(method, endpoint, &Self::utc_timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: &str = "2021-03-04T05:06:07";

    fn auth() -> EunionAuth {
        EunionAuth::new("K".to_string(), "S".to_string()).unwrap()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_ws_auth_golden_vector() {
        let signed = auth().ws_auth_params_at("get", "/ws/v2", T).unwrap();

        assert_eq!(signed.access_key, "K");
        assert_eq!(signed.signature_method, "HmacSHA256");
        assert_eq!(signed.signature_version, "2.1");
        assert_eq!(signed.timestamp, T);
        assert_eq!(
            signed.signature,
            "uV6ezlmws7an2XogNAGtfJbOjMBrgVoFiXvxpGk5F+Q="
        );
    }

    #[test]
    fn test_ws_signature_is_deterministic_for_fixed_timestamp() {
        let first = auth().ws_auth_params_at("GET", "/ws/v2", T).unwrap();
        let second = auth().ws_auth_params_at("GET", "/ws/v2", T).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ws_signature_changes_with_timestamp_and_method() {
        let later = auth()
            .ws_auth_params_at("GET", "/ws/v2", "2021-03-04T05:06:08")
            .unwrap();
        assert_eq!(
            later.signature,
            "KK0zkywpmdBD1Ru2qZU6AoDNbFxlNx08rL++Ccrk2UI="
        );

        let post = auth().ws_auth_params_at("POST", "/ws/v2", T).unwrap();
        assert_eq!(
            post.signature,
            "ud9WyUv8MxRIfHVreBNATwDSmA/t3PCB1v7D1j+Sy5E="
        );
    }

    #[test]
    fn test_rest_signature_uses_versioned_path() {
        let params = pairs(&[("symbol", "ethusdt"), ("states", "filled")]);
        let signature = auth()
            .generate_signature("GET", "/order/orders", &params, false)
            .unwrap();
        assert_eq!(signature, "IJBaQZTMszAaaEvpW70jYu7LOiX7yOS/WCBcsYrEqto=");
    }

    #[test]
    fn test_param_order_changes_signature() {
        let forward = pairs(&[("symbol", "ethusdt"), ("states", "filled")]);
        let reversed = pairs(&[("states", "filled"), ("symbol", "ethusdt")]);

        let a = auth()
            .generate_signature("GET", "/order/orders", &forward, false)
            .unwrap();
        let b = auth()
            .generate_signature("GET", "/order/orders", &reversed, false)
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(b, "lUYyif6zIm28LrYoqTgdArt3wLD8YwbKnzffs23jTIY=");
    }

    #[test]
    fn test_add_auth_to_params_ws_form() {
        let params = auth().add_auth_to_params_at("GET", "/ws/v2", &[], true, T).unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "accessKey",
                "signatureMethod",
                "signatureVersion",
                "timestamp",
                "signature"
            ]
        );
        assert_eq!(params[4].1, "uV6ezlmws7an2XogNAGtfJbOjMBrgVoFiXvxpGk5F+Q=");
    }

    #[test]
    fn test_add_auth_to_params_ws_form_puts_args_after_signature() {
        let args = pairs(&[("symbol", "ethusdt")]);
        let params = auth().add_auth_to_params_at("GET", "/ws/v2", &args, true, T).unwrap();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(
            keys,
            vec![
                "accessKey",
                "signatureMethod",
                "signatureVersion",
                "timestamp",
                "signature",
                "symbol"
            ]
        );
        // args travel alongside the handshake fields but are not signed
        assert_eq!(params[4].1, "uV6ezlmws7an2XogNAGtfJbOjMBrgVoFiXvxpGk5F+Q=");
        assert_eq!(params[5].1, "ethusdt");
    }

    #[test]
    fn test_add_auth_to_params_rest_form() {
        let args = pairs(&[("symbol", "ethusdt"), ("amount", "1.5")]);
        let params = auth().add_auth_to_params("POST", "/order/place", &args, false).unwrap();

        assert_eq!(params[0], ("api_id".to_string(), "K".to_string()));
        assert_eq!(
            params[1],
            (
                "sign".to_string(),
                "00becf2f1e5807bde1f3543415cf725ef0a37897".to_string()
            )
        );
        assert_eq!(&params[2..], args.as_slice());
    }

    #[test]
    fn test_rest_sign_without_args() {
        let params = auth().sign_request("GET", "/account", &[]).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].1, "5219fbf7f7fdfea990b8c72df9ce6de6aeda330c");
    }

    #[test]
    fn test_sign_ws_auth_stamps_now() {
        let signed = auth().sign_ws_auth("GET", "/ws/v2").unwrap();
        assert_eq!(signed.timestamp.len(), T.len());
        assert!(chrono::NaiveDateTime::parse_from_str(&signed.timestamp, TIMESTAMP_FORMAT).is_ok());

        let expected = auth()
            .ws_auth_params_at("GET", "/ws/v2", &signed.timestamp)
            .unwrap();
        assert_eq!(signed, expected);
    }

    #[test]
    fn test_keysort_is_explicit() {
        let params = pairs(&[("b", "2"), ("c", "3"), ("a", "1")]);
        let sorted = EunionAuth::keysort(&params);
        assert_eq!(sorted, pairs(&[("a", "1"), ("b", "2"), ("c", "3")]));
        // input untouched
        assert_eq!(params[0].0, "b");
    }

    #[test]
    fn test_format_get_param_url() {
        let params = pairs(&[("symbol", "eth usdt"), ("size", "10")]);
        assert_eq!(
            EunionAuth::format_get_param_url("https://api.eunion.pro/v1/market/trade", &params),
            "https://api.eunion.pro/v1/market/trade?symbol=eth%20usdt&size=10"
        );
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let err = EunionAuth::new(String::new(), "S".to_string()).unwrap_err();
        assert!(matches!(err, ExchangeError::ConfigError(_)));

        let err = EunionAuth::new("K".to_string(), String::new()).unwrap_err();
        assert!(err.to_string().contains("secret key"));
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let auth = EunionAuth::new("K".to_string(), "hunter2".to_string()).unwrap();
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("hunter2"));
    }
}
