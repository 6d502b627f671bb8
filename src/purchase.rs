//! Placing the order for a row.
//!
//! Orders are not naturally idempotent, so this stage runs at most once per
//! row: the pipeline checkpoints right after it, and a row with an order id
//! never reaches it again. Each request also carries a key derived from the
//! row itself, which lets the service recognise a replay of an order whose
//! checkpoint was lost.

use crate::quantity::Kilograms;
use crate::remote::{OffsetService, PurchaseRequest, RemoteError};
use crate::row::Row;
use log::info;
use sha2::{Digest, Sha256};

/// Places exactly one order per call.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseExecutor {
    default_quantity: Kilograms,
}

impl PurchaseExecutor {
    pub fn new(default_quantity: Kilograms) -> Self {
        PurchaseExecutor { default_quantity }
    }

    /// Builds the request for `row` against the account `entity_id`.
    ///
    /// Blank quantities are replaced with the default here.
    pub fn request_for(&self, row: &Row, entity_id: &str) -> PurchaseRequest {
        let quantity = row.effective_quantity(self.default_quantity);
        PurchaseRequest {
            entity_id: entity_id.to_string(),
            quantity,
            timestamp: row.timestamp.clone(),
            idempotency_key: idempotency_key(&row.timestamp, &row.recipient_name, quantity),
        }
    }

    /// Places the order and returns its id, recording the quantity used
    /// on the row.
    pub fn purchase<S: OffsetService>(
        &self,
        service: &mut S,
        row: &mut Row,
        entity_id: &str,
    ) -> Result<String, RemoteError> {
        let request = self.request_for(row, entity_id);
        info!(
            "Row {}: placing order for {} kg on account {} (key {})",
            row.line, request.quantity, request.entity_id, request.idempotency_key
        );

        let order_id = service.place_purchase(&request)?;
        row.quantity = Some(request.quantity);
        Ok(order_id)
    }
}

/// Stable key for one row's order: same row, same key, across runs.
///
/// SHA-256 hex of `"{timestamp} {name} {quantity}kg"`. Sheets left half
/// written by the Python version of this tool used SHA-1 of
/// `"{timestamp} {name} 2kg"` whatever the quantity, so an order placed by
/// that tool and never recorded is not recognised here and gets placed
/// again. Record such orders in the sheet by hand before switching tools.
pub fn idempotency_key(timestamp: &str, name: &str, quantity: Kilograms) -> String {
    let digest = Sha256::digest(format!("{} {} {}kg", timestamp, name, quantity).as_bytes());
    format!("{:x}", digest)
}
