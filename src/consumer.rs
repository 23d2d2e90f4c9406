// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # RPC Request Consumer
//!
//! This module implements the per-message path of the dispatcher: invoke the
//! bound handler, publish the reply to the caller's reply queue with the
//! inbound correlation id, and acknowledge the request only once the reply
//! has been handed to the broker. A failed handler produces no reply
//! envelope and leaves the message for broker-level redelivery.

use crate::{envelope, errors::RpcError, registry::HandlerBinding};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions, BasicPublishOptions},
    Channel,
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::{borrow::Cow, sync::Arc};
use tracing::{debug, error};

pub(crate) async fn consume(
    tracer: &BoxedTracer,
    delivery: Delivery,
    binding: &HandlerBinding,
    channel: Arc<Channel>,
) -> Result<(), RpcError> {
    let routing_key = binding.routing_key();

    let (ctx, mut span) = crate::otel::new_span(&delivery.properties, tracer, &routing_key);

    debug!(
        "received: {} - exchange: {}",
        routing_key,
        delivery.exchange.to_string(),
    );

    let reply_to = delivery.properties.reply_to().clone();
    let correlation_id = delivery.properties.correlation_id().clone();

    let reply = match binding.handler.exec(&ctx, &delivery.data).await {
        Ok(reply) => reply,
        Err(err) => {
            error!(
                error = err.to_string(),
                key = routing_key,
                "handler failed, message left for redelivery"
            );
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("handler invocation failed"),
            });

            // First failure goes back to the queue; a redelivered message
            // follows the broker's dead-letter policy instead.
            let requeue = !delivery.redelivered;

            return match delivery
                .nack(BasicNackOptions {
                    multiple: false,
                    requeue,
                })
                .await
            {
                Ok(_) => Ok(()),
                Err(e) => {
                    error!("error whiling nack msg");
                    span.record_error(&e);
                    span.set_status(Status::Error {
                        description: Cow::from("error to nack msg"),
                    });
                    Err(RpcError::NackMessageError)
                }
            };
        }
    };

    // A request without a reply queue is fire-and-forget.
    if let Some(reply_to) = reply_to {
        if let Err(e) = channel
            .basic_publish(
                "",
                reply_to.as_str(),
                BasicPublishOptions::default(),
                &reply,
                envelope::reply_properties(correlation_id),
            )
            .await
        {
            // Not acknowledged, so the broker redelivers the request.
            error!(error = e.to_string(), "error publishing the reply");
            span.record_error(&e);
            span.set_status(Status::Error {
                description: Cow::from("error to publish reply"),
            });
            return Err(RpcError::PublishingError);
        }
    }

    match delivery.ack(BasicAckOptions { multiple: false }).await {
        Err(e) => {
            error!("error whiling ack msg");
            span.record_error(&e);
            span.set_status(Status::Error {
                description: Cow::from("error to ack msg"),
            });
            Err(RpcError::AckMessageError)
        }
        _ => {
            span.set_status(Status::Ok);
            Ok(())
        }
    }
}
