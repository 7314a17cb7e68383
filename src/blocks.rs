//! Logical envelopes carried inside the structured payload.
//!
//! A call's payload is a codec-encoded [`Request`]; the reply's payload is a
//! codec-encoded [`Response`]. Both are decoded in two phases on the
//! receiving side: first into a head struct that carries only what routing
//! and error handling need ([`RequestHead`], [`ResponseHead`]), then into
//! the full block with the application's concrete `params`/`result` type.

use serde::{Deserialize, Serialize};

/// Request block: method name, application parameters, optional credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request<P> {
    pub method: String,
    pub params: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
}

/// Phase-one view of a request: everything except `params`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestHead {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub auth: Option<Auth>,
}

/// Response block: empty `error` means success; a non-empty `error`
/// supersedes `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<R> {
    pub error: String,
    pub result: R,
}

/// Phase-one view of a response: just the error field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseHead {
    #[serde(default)]
    pub error: String,
}

/// Credentials block. Opaque to the core; interpreted by the application's
/// authentication middleware. See [`crate::auth`] for the standard salted
/// hash helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    #[serde(with = "serde_bytes")]
    pub ident: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
}

/// Placeholder parameters for methods that take none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyParams {}

/// Placeholder result for error responses and methods that return nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResult {}

impl<P> Request<P> {
    /// Build a request block.
    pub fn new(method: &str, params: P, auth: Option<Auth>) -> Self {
        Self {
            method: method.to_string(),
            params,
            auth,
        }
    }
}

impl<R> Response<R> {
    /// Whether the block reports a handler failure.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, JsonCodec, MsgPackCodec};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct HelloParams {
        message: String,
    }

    fn sample_auth() -> Auth {
        Auth {
            ident: b"qwert".to_vec(),
            salt: vec![1, 2, 3, 4],
            hash: vec![9, 8, 7],
        }
    }

    #[test]
    fn test_two_phase_request_decode_json() {
        let block = Request::new(
            "hello",
            HelloParams {
                message: "hello server!".to_string(),
            },
            Some(sample_auth()),
        );
        let bytes = JsonCodec::encode(&block).unwrap();

        // Phase one: method and auth only.
        let head: RequestHead = JsonCodec::decode(&bytes).unwrap();
        assert_eq!(head.method, "hello");
        assert_eq!(head.auth, Some(sample_auth()));

        // Phase two: concrete params.
        let full: Request<HelloParams> = JsonCodec::decode(&bytes).unwrap();
        assert_eq!(full.params.message, "hello server!");
    }

    #[test]
    fn test_two_phase_request_decode_msgpack() {
        let block = Request::new(
            "save",
            HelloParams {
                message: "save data!".to_string(),
            },
            None,
        );
        let bytes = MsgPackCodec::encode(&block).unwrap();

        let head: RequestHead = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(head.method, "save");
        assert!(head.auth.is_none());

        let full: Request<HelloParams> = MsgPackCodec::decode(&bytes).unwrap();
        assert_eq!(full.params.message, "save data!");
    }

    #[test]
    fn test_error_response_binds_without_result_type() {
        // An error response carries an EmptyResult; the head decode must
        // succeed even though the caller expected a different result shape.
        let block = Response {
            error: "auth mismatch".to_string(),
            result: EmptyResult {},
        };
        let bytes = JsonCodec::encode(&block).unwrap();

        let head: ResponseHead = JsonCodec::decode(&bytes).unwrap();
        assert_eq!(head.error, "auth mismatch");
    }

    #[test]
    fn test_success_response_roundtrip() {
        let block = Response {
            error: String::new(),
            result: HelloParams {
                message: "hello, client!".to_string(),
            },
        };
        let bytes = JsonCodec::encode(&block).unwrap();

        let head: ResponseHead = JsonCodec::decode(&bytes).unwrap();
        assert!(head.error.is_empty());

        let full: Response<HelloParams> = JsonCodec::decode(&bytes).unwrap();
        assert!(!full.is_error());
        assert_eq!(full.result.message, "hello, client!");
    }

    #[test]
    fn test_request_without_auth_omits_field() {
        let block = Request::new("hello", EmptyParams {}, None);
        let json = serde_json::to_string(&block).unwrap();
        assert!(!json.contains("auth"));
    }
}
