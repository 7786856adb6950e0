use crate::core::kernel::signer::SignedRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response code the exchange uses for a successful `req`/`sub`
pub const SUCCESS_CODE: i64 = 200;

/// `{"action":"req","ch":"auth","params":{...}}`
#[derive(Debug, Clone, Serialize)]
pub struct EunionAuthRequest {
    pub action: String,
    pub ch: String,
    pub params: EunionAuthParams,
}

impl EunionAuthRequest {
    pub fn new(signed: SignedRequest) -> Self {
        Self {
            action: "req".to_string(),
            ch: "auth".to_string(),
            params: EunionAuthParams {
                auth_type: "api".to_string(),
                signed,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EunionAuthParams {
    pub auth_type: String,
    #[serde(flatten)]
    pub signed: SignedRequest,
}

/// `{"action":"sub","ch":<topic>}`
#[derive(Debug, Clone, Serialize)]
pub struct EunionSubscribeRequest {
    pub action: String,
    pub ch: String,
}

impl EunionSubscribeRequest {
    pub fn new(topic: &str) -> Self {
        Self {
            action: "sub".to_string(),
            ch: topic.to_string(),
        }
    }
}

/// `{"action":"pong","data":<echoed>}`
#[derive(Debug, Clone, Serialize)]
pub struct EunionPong {
    pub action: String,
    pub data: Value,
}

impl EunionPong {
    pub fn new(data: Value) -> Self {
        Self {
            action: "pong".to_string(),
            data,
        }
    }
}

/// Answer to an auth or subscribe request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NegotiationResponse {
    pub code: i64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub ch: Option<String>,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

impl NegotiationResponse {
    pub const fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}
