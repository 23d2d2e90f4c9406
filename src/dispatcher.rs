// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # RPC Request Dispatcher
//!
//! The server side of the request/reply protocol. For every registered
//! handler binding the dispatcher installs the broker topology, starts a
//! consumer on the binding's private queue, and hands each delivery to a
//! worker task. Handlers for different messages run concurrently; no
//! ordering is guaranteed across correlation ids.

use crate::{consumer::consume, errors::RpcError, registry::HandlerRegistry, topology};
use futures_util::{future::join_all, StreamExt};
use lapin::{options::BasicConsumeOptions, types::FieldTable, Channel};
use opentelemetry::global;
use std::sync::Arc;
use tracing::error;

/// Serves a registry of handler bindings over a shared channel.
pub struct RpcDispatcher {
    channel: Arc<Channel>,
    registry: HandlerRegistry,
}

impl RpcDispatcher {
    /// Creates a new dispatcher.
    ///
    /// # Parameters
    /// * `channel` - A channel to the broker
    /// * `registry` - The handler bindings this dispatcher will serve
    pub fn new(channel: Arc<Channel>, registry: HandlerRegistry) -> RpcDispatcher {
        RpcDispatcher { channel, registry }
    }

    /// Installs the topology and consumes requests for the process lifetime.
    ///
    /// One consumer task runs per binding, and every delivery is processed
    /// on its own worker task, so a slow or failing handler never stalls the
    /// other bindings.
    ///
    /// # Returns
    /// Ok(()) once every consumer stream ends, or RpcError on setup failure
    pub async fn consume_blocking(&self) -> Result<(), RpcError> {
        let mut spawns = vec![];

        for binding in self.registry.bindings() {
            let queue_name = topology::install_rpc_binding(&self.channel, binding).await?;
            let consumer_tag = binding.routing_key();

            let mut consumer = match self
                .channel
                .basic_consume(
                    &queue_name,
                    &consumer_tag,
                    BasicConsumeOptions {
                        no_local: false,
                        no_ack: false,
                        exclusive: false,
                        nowait: false,
                    },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "failure to create the consumer");
                    Err(RpcError::CreateConsumerError(queue_name.clone()))
                }
                Ok(c) => Ok(c),
            }?;

            let binding = binding.clone();
            let channel = self.channel.clone();

            spawns.push(tokio::spawn({
                async move {
                    while let Some(result) = consumer.next().await {
                        match result {
                            Ok(delivery) => {
                                let binding = binding.clone();
                                let channel = channel.clone();

                                tokio::spawn(async move {
                                    if let Err(err) = consume(
                                        &global::tracer("amqp rpc consumer"),
                                        delivery,
                                        &binding,
                                        channel,
                                    )
                                    .await
                                    {
                                        error!(error = err.to_string(), "error consume msg")
                                    }
                                });
                            }

                            Err(err) => error!(error = err.to_string(), "errors consume msg"),
                        }
                    }
                }
            }));
        }

        let spawned = join_all(spawns).await;
        for res in spawned {
            if res.is_err() {
                error!("tokio process error");
                return Err(RpcError::InternalError);
            }
        }

        Ok(())
    }
}
