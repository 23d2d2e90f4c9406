// Copyright (c) 2025, The NestedApi Authors
// MIT License
// All rights reserved.

//! # Collaborator Contracts
//!
//! The interfaces the RPC handlers of the Authentication and Users services
//! delegate to, and the records those services exchange over the wire. The
//! transport does not interpret any of this: handlers encode their own
//! outcomes into reply payloads, and a collaborator failure inside a handler
//! surfaces as a handler invocation error with no reply envelope.

use crate::errors::RpcError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A platform user, as exchanged by the `users` operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub telephone: String,
    /// Epoch milliseconds
    pub birthday: i64,
    pub country: String,
    pub password: String,
    pub address: Option<String>,
    pub address_information: Option<String>,
}

/// A login credential held by the Authentication service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub user_id: i64,
    pub username: String,
    pub password: String,
}

/// A refresh token held by the Authentication service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    pub user_id: i64,
    pub token: String,
    /// Epoch milliseconds
    pub valid_from: i64,
}

/// A successful token grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSuccess {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: String,
}

/// Parsed JWT claims.
pub type Claims = serde_json::Map<String, serde_json::Value>;

/// Failures raised by collaborators inside handler bodies.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServiceError {
    /// The requested record does not exist
    #[error("record not found: {0}")]
    NotFound(String),

    /// The backing store failed
    #[error("storage failure: {0}")]
    Storage(String),

    /// The presented token is expired or tampered
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The mail transport failed
    #[error("mail delivery failure: {0}")]
    Mail(String),
}

impl From<ServiceError> for RpcError {
    fn from(err: ServiceError) -> RpcError {
        RpcError::HandlerError(err.to_string())
    }
}

/// Credential persistence of the Authentication service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Credential>, ServiceError>;
    async fn insert(&self, credential: Credential) -> Result<Credential, ServiceError>;
    async fn remove(&self, user_id: i64) -> Result<(), ServiceError>;
}

/// Refresh-token persistence of the Authentication service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, ServiceError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, ServiceError>;
    async fn remove(&self, token: &str) -> Result<(), ServiceError>;
}

/// User persistence of the Users service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: User) -> Result<User, ServiceError>;
    async fn update(&self, user: User) -> Result<User, ServiceError>;
    async fn remove(&self, id: i64) -> Result<(), ServiceError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, ServiceError>;
}

/// Outbound mail for password and registration workflows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, title: &str, body: &str)
        -> Result<(), ServiceError>;
}

/// Token parsing for request authorization.
#[cfg_attr(test, mockall::automock)]
pub trait JwtCodec: Send + Sync {
    fn parse(&self, token: &str) -> Result<Claims, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec,
        registry::{RequestHandler, RpcHandler, TypedHandler},
    };
    use mockall::predicate::eq;
    use opentelemetry::Context;
    use std::sync::Arc;

    fn sample_user(id: i64) -> User {
        User {
            id,
            name: "Ada".to_owned(),
            surname: "Lovelace".to_owned(),
            email: "a@b.com".to_owned(),
            telephone: "+34600000000".to_owned(),
            birthday: 490320000000,
            country: "Spain".to_owned(),
            password: "secret".to_owned(),
            address: None,
            address_information: None,
        }
    }

    /// The `users.login` operation: id in, stored user out.
    struct LoginHandler {
        users: Arc<dyn UserStore>,
    }

    #[async_trait]
    impl RequestHandler for LoginHandler {
        type Request = i64;
        type Reply = User;

        async fn handle(&self, _ctx: &Context, id: i64) -> Result<User, RpcError> {
            match self.users.find_by_id(id).await? {
                Some(user) => Ok(user),
                None => Err(ServiceError::NotFound(format!("user {id}")).into()),
            }
        }
    }

    #[tokio::test]
    async fn login_handler_replies_with_the_stored_user() {
        let mut users = MockUserStore::new();
        users
            .expect_find_by_id()
            .with(eq(42))
            .returning(|id| Ok(Some(sample_user(id))));

        let handler = TypedHandler::new(LoginHandler {
            users: Arc::new(users),
        });

        let body = codec::encode(&42).unwrap();
        let reply = handler.exec(&Context::current(), &body).await.unwrap();

        let user: User = codec::decode(&reply).unwrap();
        assert_eq!(user, sample_user(42));
    }

    #[tokio::test]
    async fn a_missing_user_surfaces_as_a_handler_error() {
        let mut users = MockUserStore::new();
        users.expect_find_by_id().returning(|_| Ok(None));

        let handler = TypedHandler::new(LoginHandler {
            users: Arc::new(users),
        });

        let body = codec::encode(&7).unwrap();
        let result = handler.exec(&Context::current(), &body).await;

        assert_eq!(
            result,
            Err(RpcError::HandlerError("record not found: user 7".to_owned()))
        );
    }

    #[tokio::test]
    async fn a_storage_failure_surfaces_as_a_handler_error() {
        let mut users = MockUserStore::new();
        users
            .expect_find_by_id()
            .returning(|_| Err(ServiceError::Storage("connection reset".to_owned())));

        let handler = TypedHandler::new(LoginHandler {
            users: Arc::new(users),
        });

        let body = codec::encode(&7).unwrap();
        let result = handler.exec(&Context::current(), &body).await;

        assert!(matches!(result, Err(RpcError::HandlerError(_))));
    }

    #[test]
    fn user_records_round_trip_with_camel_case_fields() {
        let user = sample_user(1);

        let bytes = codec::encode(&user).unwrap();
        let raw: serde_json::Value = codec::decode(&bytes).unwrap();

        assert!(raw.get("addressInformation").is_some());
        assert_eq!(codec::decode::<User>(&bytes).unwrap(), user);
    }
}
