//! The narrow interface to the remote offsetting service.
//!
//! The pipeline only ever talks to the outside world through
//! [`OffsetService`]. The production implementation is
//! [`LuneClient`](crate::lune::LuneClient); tests substitute an in-memory fake.

use crate::quantity::Kilograms;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Whether the credentials in use operate on test or live accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountMode {
    Test,
    Live,
}

/// A remote account representing one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub mode: AccountMode,
}

/// Everything needed to place one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub entity_id: String,
    pub quantity: Kilograms,
    pub timestamp: String,
    /// Deterministic per row, so a replayed request maps to the same order.
    pub idempotency_key: String,
}

/// Failures reported by the remote service.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Connection problems, timeouts, undecodable bodies
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error status
    #[error("API error (status {status}, code {}, request id {}): {}",
        .code.as_deref().unwrap_or("-"),
        .request_id.as_deref().unwrap_or("-"),
        .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        code: Option<String>,
        message: Option<String>,
        request_id: Option<String>,
    },

    /// A status the client does not know how to handle
    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    /// Several remote accounts share the name, so the lookup is ambiguous
    #[error("Found {count} accounts named {name:?}; names must be unique")]
    AmbiguousEntity { name: String, count: usize },

    /// The configured bundle portfolio does not exist or is not unique
    #[error("Bundle portfolio {label:?} not found or not unique (available: {available})")]
    PortfolioNotFound { label: String, available: String },

    /// The logo could not be read
    #[error("Failed to read logo file: {0}")]
    Logo(#[source] std::io::Error),
}

impl RemoteError {
    /// The API's machine-readable error code, when there is one.
    pub fn code(&self) -> Option<&str> {
        match self {
            RemoteError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Api { status, .. } | RemoteError::UnexpectedStatus { status } => {
                Some(*status)
            }
            RemoteError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Operations the pipeline needs from the remote service.
///
/// All calls are blocking. Implementations must not retry non-idempotent
/// requests blindly; `place_purchase` relies on the request's idempotency key.
pub trait OffsetService {
    /// Mode of the credentials in use.
    fn account_mode(&mut self) -> Result<AccountMode, RemoteError>;

    /// Looks up the customer account called `name` under `beneficiary`.
    fn find_entity(&mut self, name: &str, beneficiary: &str)
        -> Result<Option<Entity>, RemoteError>;

    /// Creates a customer account tagged with `name` and `beneficiary`.
    fn create_entity(&mut self, name: &str, beneficiary: &str) -> Result<Entity, RemoteError>;

    /// Makes sure the entity's public page exists and carries the branding
    /// asset, returning the page URL. Safe to call repeatedly.
    fn configure_page(
        &mut self,
        entity: &Entity,
        beneficiary: &str,
        branding: Option<&Path>,
    ) -> Result<String, RemoteError>;

    /// Places one order and returns its id.
    fn place_purchase(&mut self, request: &PurchaseRequest) -> Result<String, RemoteError>;
}

impl<T: OffsetService + ?Sized> OffsetService for &mut T {
    fn account_mode(&mut self) -> Result<AccountMode, RemoteError> {
        (**self).account_mode()
    }

    fn find_entity(&mut self, name: &str, beneficiary: &str)
        -> Result<Option<Entity>, RemoteError> {
        (**self).find_entity(name, beneficiary)
    }

    fn create_entity(&mut self, name: &str, beneficiary: &str) -> Result<Entity, RemoteError> {
        (**self).create_entity(name, beneficiary)
    }

    fn configure_page(
        &mut self,
        entity: &Entity,
        beneficiary: &str,
        branding: Option<&Path>,
    ) -> Result<String, RemoteError> {
        (**self).configure_page(entity, beneficiary, branding)
    }

    fn place_purchase(&mut self, request: &PurchaseRequest) -> Result<String, RemoteError> {
        (**self).place_purchase(request)
    }
}
