// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # Payload Codec
//!
//! This module frames RPC bodies on the wire. Every request and reply body
//! is a JSON document; the same codec runs on both sides of a call, so a
//! handler's declared argument type either decodes cleanly or the message is
//! rejected as undecodable before the handler runs.

use crate::errors::RpcError;
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

/// Content type stamped on every request and reply envelope
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Serializes a payload into wire bytes.
pub fn encode<T>(payload: &T) -> Result<Vec<u8>, RpcError>
where
    T: Serialize + ?Sized,
{
    match serde_json::to_vec(payload) {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            error!(error = err.to_string(), "error encoding payload");
            Err(RpcError::EncodeError(err.to_string()))
        }
    }
}

/// Deserializes wire bytes into the expected payload type.
///
/// A mismatch between the bytes and the expected type surfaces here as a
/// `DecodeError`, never as a corrupt value handed to a handler.
pub fn decode<T>(bytes: &[u8]) -> Result<T, RpcError>
where
    T: DeserializeOwned,
{
    match serde_json::from_slice(bytes) {
        Ok(payload) => Ok(payload),
        Err(err) => {
            error!(error = err.to_string(), "error decoding payload");
            Err(RpcError::DecodeError(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct LoginReply {
        id: i64,
        email: String,
    }

    #[test]
    fn encoded_payload_decodes_to_the_same_value() {
        let reply = LoginReply {
            id: 42,
            email: "a@b.com".to_owned(),
        };

        let bytes = encode(&reply).unwrap();
        let decoded: LoginReply = decode(&bytes).unwrap();

        assert_eq!(decoded, reply);
    }

    #[test]
    fn decode_rejects_bytes_of_another_type() {
        let bytes = encode(&vec![1, 2, 3]).unwrap();

        let result: Result<LoginReply, RpcError> = decode(&bytes);

        assert!(matches!(result, Err(RpcError::DecodeError(_))));
    }

    #[test]
    fn decode_rejects_garbage_bytes() {
        let result: Result<LoginReply, RpcError> = decode(b"\x00\x01not json");

        assert!(matches!(result, Err(RpcError::DecodeError(_))));
    }
}
