// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # Error Types for the RPC Substrate
//!
//! This module provides the error type shared by the dispatcher, the client,
//! and the broker topology helpers. The `RpcError` enum covers configuration
//! mistakes caught at registration time, broker connectivity and topology
//! failures, payload (de)serialization failures, and the client-side timeout.

use std::time::Duration;
use thiserror::Error;

/// Represents errors that can occur across the RPC request/reply layer.
///
/// Configuration variants are fatal at startup. Transport variants are
/// reported to the caller as typed failures. A `Timeout` means the remote
/// outcome is unknown, not that the remote operation failed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RpcError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// Error establishing a connection to the broker
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// A required configuration value is absent
    #[error("missing configuration value `{0}`")]
    MissingConfigError(String),

    /// A configuration value could not be parsed
    #[error("invalid configuration value `{0}`")]
    InvalidConfigError(String),

    /// A handler binding carries an unusable topic or queue name
    #[error("invalid handler binding `{0}`: {1}")]
    InvalidBindingError(String, String),

    /// Two handlers were registered on the same (topic, queue) pair
    #[error("duplicate handler binding `{0}`")]
    DuplicateBindingError(String),

    /// A route string does not follow the `<topic>.<queue>` convention
    #[error("malformed route key `{0}`")]
    MalformedRouteKeyError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{1}` to exchange `{0}`")]
    BindQueueError(String, String),

    /// Error starting a consumer on a queue
    #[error("failure to declare consumer on `{0}`")]
    CreateConsumerError(String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error serializing a payload
    #[error("failure to encode payload: {0}")]
    EncodeError(String),

    /// Payload bytes don't match the expected type
    #[error("failure to decode payload: {0}")]
    DecodeError(String),

    /// No matching reply arrived within the deadline; the remote outcome
    /// is unknown
    #[error("no reply within {0:?}")]
    TimeoutError(Duration),

    /// A handler raised an error while processing a request
    #[error("handler invocation failed: {0}")]
    HandlerError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error consuming a message
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),
}
