// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # Broker Topology for Handler Bindings
//!
//! Every handler binding is served by the same broker shape: a topic
//! exchange named after the binding's topic, a private server queue with a
//! broker-generated name, and a binding between the two using the
//! `<topic>.<queue>` routing key. Exchange declaration is idempotent and
//! runs on both sides of a call, so services sharing a topic can start in
//! any order.

use crate::{errors::RpcError, registry::HandlerBinding};
use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, ExchangeKind,
};
use tracing::{debug, error};

/// Declares a topic exchange with the options shared by the dispatcher and
/// the client.
pub(crate) async fn declare_topic_exchange(channel: &Channel, topic: &str) -> Result<(), RpcError> {
    debug!("creating exchange: {}", topic);

    match channel
        .exchange_declare(
            topic,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                passive: false,
                durable: false,
                auto_delete: false,
                internal: false,
                nowait: false,
            },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(
                error = err.to_string(),
                name = topic,
                "error to declare the exchange"
            );
            Err(RpcError::DeclareExchangeError(topic.to_owned()))
        }
        _ => Ok(()),
    }
}

/// Declares the exchange, queue, and binding serving one handler binding.
///
/// # Returns
/// The broker-generated name of the private server queue.
pub async fn install_rpc_binding(
    channel: &Channel,
    binding: &HandlerBinding,
) -> Result<String, RpcError> {
    let routing_key = binding.routing_key();

    declare_topic_exchange(channel, binding.topic()).await?;

    let queue = match channel
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
            error!(
                error = err.to_string(),
                key = routing_key,
                "error to declare the server queue"
            );
            Err(RpcError::DeclareQueueError(routing_key.clone()))
        }
        Ok(queue) => Ok(queue),
    }?;

    let queue_name = queue.name().as_str().to_owned();

    debug!(
        "binding queue: {} to the exchange: {} with the key: {}",
        queue_name,
        binding.topic(),
        routing_key
    );

    match channel
        .queue_bind(
            &queue_name,
            binding.topic(),
            &routing_key,
            QueueBindOptions { nowait: false },
            FieldTable::default(),
        )
        .await
    {
        Err(err) => {
            error!(error = err.to_string(), "error to bind queue to exchange");
            Err(RpcError::BindQueueError(
                binding.topic().to_owned(),
                queue_name.clone(),
            ))
        }
        _ => Ok(()),
    }?;

    Ok(queue_name)
}
