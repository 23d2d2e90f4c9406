// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # RPC Envelopes and Route Keys
//!
//! This module owns the wire conventions of the request/reply protocol: the
//! `"<topic>.<queue>"` route string, and the AMQP properties that frame a
//! request (correlation id plus reply queue) and a reply (the same
//! correlation id, nothing else).

use crate::{codec::JSON_CONTENT_TYPE, errors::RpcError};
use lapin::{protocol::basic::AMQPProperties, types::ShortString, BasicProperties};

/// A parsed `"<topic>.<queue>"` route string.
///
/// The exchange is the segment before the first dot; the routing key is the
/// whole string, which is also the key handlers bind their private queue
/// with. `"users.login"` publishes to the `users` topic exchange with key
/// `users.login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteKey {
    pub(crate) exchange: String,
    pub(crate) routing_key: String,
}

impl RouteKey {
    /// Parses a route string, rejecting anything without a topic segment.
    pub fn parse(route: &str) -> Result<RouteKey, RpcError> {
        match route.split_once('.') {
            Some((topic, queue)) if !topic.is_empty() && !queue.is_empty() => Ok(RouteKey {
                exchange: topic.to_owned(),
                routing_key: route.to_owned(),
            }),
            _ => Err(RpcError::MalformedRouteKeyError(route.to_owned())),
        }
    }

    /// The topic exchange the request is published to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// The routing key the request is published with.
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

/// Builds the properties of a request envelope.
pub(crate) fn request_properties(correlation_id: &str, reply_to: &str) -> BasicProperties {
    BasicProperties::default()
        .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
        .with_correlation_id(ShortString::from(correlation_id))
        .with_reply_to(ShortString::from(reply_to))
}

/// Builds the properties of a reply envelope, echoing the correlation id of
/// the request it answers.
pub(crate) fn reply_properties(correlation_id: Option<ShortString>) -> BasicProperties {
    let props = BasicProperties::default().with_content_type(ShortString::from(JSON_CONTENT_TYPE));

    match correlation_id {
        Some(id) => props.with_correlation_id(id),
        None => props,
    }
}

/// Checks whether a delivery's correlation id matches the one a caller is
/// waiting on. Deliveries without a correlation id never match.
pub(crate) fn matches_correlation(props: &AMQPProperties, correlation_id: &str) -> bool {
    match props.correlation_id() {
        Some(id) => id.as_str() == correlation_id,
        None => false,
    }
}
