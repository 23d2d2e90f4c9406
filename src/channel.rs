// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation and management of AMQP connections and
//! channels. The connection is shared process-wide; the dispatcher and the
//! client each receive the channel wrapped in `Arc`. Without a reachable
//! broker neither side can run, so startup failures are fatal.

use crate::{config::BrokerConfig, errors::RpcError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Creates a new AMQP connection and channel for the RPC substrate.
///
/// The connection is named after the owning service so it can be told apart
/// in the broker's management view. A connection error after startup is
/// reported through the error hook rather than silently swallowed.
///
/// # Parameters
/// * `cfg` - Configuration containing the broker URI and the service name
///
/// # Returns
/// * `Result<(Arc<Connection>, Arc<Channel>), RpcError>` -
///   A tuple containing the connection and channel on success, or an error on failure.
pub async fn new_amqp_channel(cfg: &BrokerConfig) -> Result<(Arc<Connection>, Arc<Channel>), RpcError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app_name.clone()));

    let conn = match Connection::connect(&cfg.amqp_uri, options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(RpcError::ConnectionError)
        }
    }?;
    debug!("amqp connected");

    conn.on_error(|err| {
        error!(error = err.to_string(), "amqp connection failure");
    });

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(RpcError::ChannelError)
        }
    }
}

/// Connects to the broker or terminates the process.
///
/// The dispatcher cannot run without a broker, so an unreachable broker at
/// startup is fatal: the failure is logged and the process exits.
pub async fn connect_or_exit(cfg: &BrokerConfig) -> (Arc<Connection>, Arc<Channel>) {
    match new_amqp_channel(cfg).await {
        Ok(pair) => pair,
        Err(err) => {
            error!(
                error = err.to_string(),
                "could not connect to the message broker"
            );
            std::process::exit(1);
        }
    }
}
