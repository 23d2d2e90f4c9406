// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # RPC Client
//!
//! The client side of the request/reply protocol. `call` publishes a request
//! to a `"<topic>.<queue>"` route with a fresh correlation id and a private
//! reply queue, then waits on that queue until the matching reply arrives or
//! the deadline passes. Concurrent calls never cross-deliver: every call
//! owns its reply queue and filters on its own correlation id.

use crate::{
    codec,
    config::DEFAULT_CALL_TIMEOUT,
    envelope::{self, RouteKey},
    errors::RpcError,
    otel, topology,
};
use futures_util::StreamExt;
use lapin::{
    options::{
        BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    Channel,
};
use opentelemetry::Context;
use serde::{de::DeserializeOwned, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Issues RPC requests over a shared channel.
///
/// Cheap to share; every in-flight call keeps its own correlation id and
/// reply queue, so one client serves concurrent callers.
pub struct RpcClient {
    channel: Arc<Channel>,
    call_timeout: Duration,
}

impl RpcClient {
    /// Creates a new client with the default reply timeout.
    pub fn new(channel: Arc<Channel>) -> Arc<RpcClient> {
        RpcClient::with_timeout(channel, DEFAULT_CALL_TIMEOUT)
    }

    /// Creates a new client with the given reply timeout.
    pub fn with_timeout(channel: Arc<Channel>, call_timeout: Duration) -> Arc<RpcClient> {
        Arc::new(RpcClient {
            channel,
            call_timeout,
        })
    }

    /// Calls a remote operation and waits for its reply.
    pub async fn call<T, R>(&self, ctx: &Context, route: &str, payload: &T) -> Result<R, RpcError>
    where
        T: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        self.call_with_timeout(ctx, route, payload, self.call_timeout)
            .await
    }

    /// Calls a remote operation, waiting at most `timeout` for the reply.
    ///
    /// A `TimeoutError` means the remote outcome is unknown: the dispatcher
    /// may still process the request after the caller stops waiting. Callers
    /// with at-least-once side effects downstream must not read a timeout as
    /// a failure of the remote operation.
    pub async fn call_with_timeout<T, R>(
        &self,
        ctx: &Context,
        route: &str,
        payload: &T,
        timeout: Duration,
    ) -> Result<R, RpcError>
    where
        T: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let route = RouteKey::parse(route)?;
        let correlation_id = Uuid::new_v4().to_string();
        let body = codec::encode(payload)?;

        // Same idempotent declaration the dispatcher side makes, so the two
        // services can start in any order.
        topology::declare_topic_exchange(&self.channel, route.exchange()).await?;

        let queue = match self
            .channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    passive: false,
                    durable: false,
                    exclusive: true,
                    auto_delete: true,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to declare the reply queue");
                Err(RpcError::DeclareQueueError("reply".to_owned()))
            }
            Ok(queue) => Ok(queue),
        }?;

        let reply_queue = queue.name().as_str().to_owned();

        // The consumer starts before the request goes out so a fast reply
        // cannot slip past it.
        let mut consumer = match self
            .channel
            .basic_consume(
                &reply_queue,
                &correlation_id,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: true,
                    exclusive: true,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the reply consumer");
                Err(RpcError::CreateConsumerError(reply_queue.clone()))
            }
            Ok(c) => Ok(c),
        }?;

        let props = envelope::request_properties(&correlation_id, &reply_queue)
            .with_headers(FieldTable::from(otel::inject_headers(ctx)));

        if let Err(err) = self
            .channel
            .basic_publish(
                route.exchange(),
                route.routing_key(),
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &body,
                props,
            )
            .await
        {
            error!(error = err.to_string(), "error publishing message");
            self.release_consumer(&correlation_id).await;
            return Err(RpcError::PublishingError);
        }

        let deadline = Instant::now() + timeout;

        let result = loop {
            match timeout_at(deadline, consumer.next()).await {
                Err(_) => break Err(RpcError::TimeoutError(timeout)),
                Ok(None) => break Err(RpcError::ConsumerError(reply_queue.clone())),
                Ok(Some(Err(err))) => {
                    error!(error = err.to_string(), "errors consume msg");
                    break Err(RpcError::ConsumerError(reply_queue.clone()));
                }
                Ok(Some(Ok(delivery))) => {
                    if !envelope::matches_correlation(&delivery.properties, &correlation_id) {
                        // Stale delivery from an earlier call; drop it and
                        // keep waiting against the same deadline.
                        debug!("discarding reply with foreign correlation id");
                        continue;
                    }

                    break codec::decode(&delivery.data);
                }
            }
        };

        self.release_consumer(&correlation_id).await;

        result
    }

    /// Cancels a reply consumer so the broker reclaims its auto-delete
    /// queue. A late reply dies with the queue.
    async fn release_consumer(&self, consumer_tag: &str) {
        if let Err(err) = self
            .channel
            .basic_cancel(consumer_tag, BasicCancelOptions { nowait: false })
            .await
        {
            warn!(error = err.to_string(), "failure to cancel reply consumer");
        }
    }
}
