// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # Handler Registry
//!
//! This module provides the registration surface of the dispatcher. Each
//! service declares its remote operations up front by registering a handler
//! under a `(topic, queue)` pair; the registry rejects malformed names and
//! duplicate pairs before anything touches the broker.
//!
//! Handlers are registered at the byte level through [`RpcHandler`]. Typed
//! handlers implement [`RequestHandler`] and are adapted with
//! [`TypedHandler`], which pushes payload (de)serialization into the binding
//! so an argument-type mismatch surfaces as a decode failure instead of a
//! corrupt invocation.

use crate::{codec, errors::RpcError};
use async_trait::async_trait;
use opentelemetry::Context;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// A request handler bound to a queue, operating on raw body bytes.
///
/// Implementations must be safe to invoke concurrently for different
/// messages; the dispatcher runs one worker per delivery.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// Processes a request body and returns the encoded reply body.
    async fn exec(&self, ctx: &Context, body: &[u8]) -> Result<Vec<u8>, RpcError>;
}

/// A typed request handler.
///
/// The request type decodes the inbound body and the reply type encodes the
/// outbound one. Operations without a payload use `Request = ()`.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    type Request: DeserializeOwned + Send;
    type Reply: Serialize + Send;

    async fn handle(&self, ctx: &Context, request: Self::Request) -> Result<Self::Reply, RpcError>;
}

/// Adapts a [`RequestHandler`] to the byte-level [`RpcHandler`] contract.
pub struct TypedHandler<H> {
    inner: H,
}

impl<H> TypedHandler<H> {
    pub fn new(inner: H) -> Arc<TypedHandler<H>> {
        Arc::new(TypedHandler { inner })
    }
}

#[async_trait]
impl<H> RpcHandler for TypedHandler<H>
where
    H: RequestHandler,
{
    async fn exec(&self, ctx: &Context, body: &[u8]) -> Result<Vec<u8>, RpcError> {
        // An absent body reads as a null document, so `Request = ()` accepts
        // requests published without a payload.
        let request = if body.is_empty() {
            codec::decode(b"null")?
        } else {
            codec::decode(body)?
        };

        let reply = self.inner.handle(ctx, request).await?;

        codec::encode(&reply)
    }
}

/// A handler bound to its `(topic, queue)` pair.
///
/// Immutable once registered; the dispatcher binds one private broker queue
/// per binding for the process lifetime.
#[derive(Clone)]
pub struct HandlerBinding {
    pub(crate) topic: String,
    pub(crate) queue: String,
    pub(crate) handler: Arc<dyn RpcHandler>,
}

impl HandlerBinding {
    /// Creates a binding, validating both names.
    ///
    /// The topic must not contain a dot: the client derives the exchange
    /// from the segment of the route string before the first dot, so a
    /// dotted topic could never be addressed.
    pub fn new(
        topic: &str,
        queue: &str,
        handler: Arc<dyn RpcHandler>,
    ) -> Result<HandlerBinding, RpcError> {
        if topic.is_empty() || queue.is_empty() {
            return Err(RpcError::InvalidBindingError(
                format!("{topic}.{queue}"),
                "topic and queue must be non-empty".to_owned(),
            ));
        }

        if topic.contains('.') {
            return Err(RpcError::InvalidBindingError(
                format!("{topic}.{queue}"),
                "topic must not contain `.`".to_owned(),
            ));
        }

        Ok(HandlerBinding {
            topic: topic.to_owned(),
            queue: queue.to_owned(),
            handler,
        })
    }

    /// The topic exchange the binding consumes from.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The queue suffix of the binding.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The routing key the private queue is bound with, `<topic>.<queue>`.
    pub fn routing_key(&self) -> String {
        format!("{}.{}", self.topic, self.queue)
    }
}

/// The in-memory table of handler bindings a dispatcher serves.
///
/// Built once at startup; no network I/O happens here.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    bindings: Vec<Arc<HandlerBinding>>,
}

impl HandlerRegistry {
    pub fn new() -> HandlerRegistry {
        HandlerRegistry::default()
    }

    /// Registers a handler under a `(topic, queue)` pair.
    ///
    /// Registering two handlers on the same pair is a configuration error.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn register(
        mut self,
        topic: &str,
        queue: &str,
        handler: Arc<dyn RpcHandler>,
    ) -> Result<Self, RpcError> {
        let binding = HandlerBinding::new(topic, queue, handler)?;

        if self
            .bindings
            .iter()
            .any(|b| b.topic == binding.topic && b.queue == binding.queue)
        {
            return Err(RpcError::DuplicateBindingError(binding.routing_key()));
        }

        self.bindings.push(Arc::new(binding));

        Ok(self)
    }

    pub fn bindings(&self) -> &[Arc<HandlerBinding>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct LoginRequest {
        id: i64,
    }

    #[derive(Debug, Serialize)]
    struct LoginReply {
        id: i64,
        email: String,
    }

    struct LoginHandler;

    #[async_trait]
    impl RequestHandler for LoginHandler {
        type Request = LoginRequest;
        type Reply = LoginReply;

        async fn handle(
            &self,
            _ctx: &Context,
            request: Self::Request,
        ) -> Result<Self::Reply, RpcError> {
            Ok(LoginReply {
                id: request.id,
                email: "a@b.com".to_owned(),
            })
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl RequestHandler for FailingHandler {
        type Request = LoginRequest;
        type Reply = LoginReply;

        async fn handle(
            &self,
            _ctx: &Context,
            _request: Self::Request,
        ) -> Result<Self::Reply, RpcError> {
            Err(RpcError::HandlerError("credential store down".to_owned()))
        }
    }

    struct PingHandler;

    #[async_trait]
    impl RequestHandler for PingHandler {
        type Request = ();
        type Reply = String;

        async fn handle(&self, _ctx: &Context, _request: ()) -> Result<String, RpcError> {
            Ok("pong".to_owned())
        }
    }

    #[test]
    fn registering_the_same_pair_twice_is_a_configuration_error() {
        let result = HandlerRegistry::new()
            .register("users", "login", TypedHandler::new(LoginHandler))
            .unwrap()
            .register("users", "login", TypedHandler::new(LoginHandler));

        assert_eq!(
            result.err(),
            Some(RpcError::DuplicateBindingError("users.login".to_owned()))
        );
    }

    #[test]
    fn distinct_pairs_register_side_by_side() {
        let registry = HandlerRegistry::new()
            .register("users", "login", TypedHandler::new(LoginHandler))
            .unwrap()
            .register("users", "register", TypedHandler::new(LoginHandler))
            .unwrap()
            .register("auth", "login", TypedHandler::new(LoginHandler))
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.bindings()[2].routing_key(), "auth.login");
    }

    #[test]
    fn dotted_topics_are_rejected() {
        let result =
            HandlerRegistry::new().register("users.v2", "login", TypedHandler::new(LoginHandler));

        assert!(matches!(
            result.err(),
            Some(RpcError::InvalidBindingError(_, _))
        ));
    }

    #[test]
    fn empty_names_are_rejected() {
        let registry = HandlerRegistry::new();

        assert!(registry
            .clone()
            .register("", "login", TypedHandler::new(LoginHandler))
            .is_err());
        assert!(registry
            .register("users", "", TypedHandler::new(LoginHandler))
            .is_err());
    }

    #[tokio::test]
    async fn typed_handler_decodes_invokes_and_encodes() {
        let handler = TypedHandler::new(LoginHandler);
        let body = codec::encode(&serde_json::json!({ "id": 42 })).unwrap();

        let reply = handler.exec(&Context::current(), &body).await.unwrap();

        let reply: serde_json::Value = codec::decode(&reply).unwrap();
        assert_eq!(reply, serde_json::json!({ "id": 42, "email": "a@b.com" }));
    }

    #[tokio::test]
    async fn mismatched_request_bytes_surface_as_a_decode_failure() {
        let handler = TypedHandler::new(LoginHandler);
        let body = codec::encode(&serde_json::json!({ "id": "not-a-number" })).unwrap();

        let result = handler.exec(&Context::current(), &body).await;

        assert!(matches!(result, Err(RpcError::DecodeError(_))));
    }

    #[tokio::test]
    async fn handler_failure_produces_no_reply_bytes() {
        let handler = TypedHandler::new(FailingHandler);
        let body = codec::encode(&serde_json::json!({ "id": 7 })).unwrap();

        let result = handler.exec(&Context::current(), &body).await;

        assert_eq!(
            result,
            Err(RpcError::HandlerError("credential store down".to_owned()))
        );
    }

    #[tokio::test]
    async fn a_handler_without_payload_accepts_an_empty_body() {
        let handler = TypedHandler::new(PingHandler);

        let reply = handler.exec(&Context::current(), b"").await.unwrap();

        let reply: String = codec::decode(&reply).unwrap();
        assert_eq!(reply, "pong");
    }
}
