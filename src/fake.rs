//! In-memory `OffsetService` for unit tests.

use crate::remote::{AccountMode, Entity, OffsetService, PurchaseRequest, RemoteError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub mode: usize,
    pub find: usize,
    pub create: usize,
    pub configure: usize,
    pub purchase: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.mode + self.find + self.create + self.configure + self.purchase
    }
}

#[derive(Debug)]
pub struct FakeService {
    pub mode: AccountMode,
    pub calls: CallCounts,
    pub purchases: Vec<PurchaseRequest>,
    pub last_branding: Option<PathBuf>,
    pub fail_create_for: Option<String>,
    /// 1-based purchase call that fails.
    pub fail_purchase_at: Option<usize>,
    entities: HashMap<String, (Entity, String)>,
    orders: HashMap<String, String>,
    next_id: usize,
}

impl FakeService {
    pub fn new() -> Self {
        FakeService {
            mode: AccountMode::Test,
            calls: CallCounts::default(),
            purchases: Vec::new(),
            last_branding: None,
            fail_create_for: None,
            fail_purchase_at: None,
            entities: HashMap::new(),
            orders: HashMap::new(),
            next_id: 0,
        }
    }

    /// Registers an account as if an earlier run had created it.
    pub fn seed_entity(&mut self, name: &str, beneficiary: &str) -> Entity {
        let entity = Entity {
            id: self.fresh_id("acc"),
            name: name.to_string(),
            mode: self.mode,
        };
        self.entities
            .insert(name.to_string(), (entity.clone(), beneficiary.to_string()));
        entity
    }

    pub fn entity_beneficiary(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(|(_, b)| b.as_str())
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }
}

fn rejected(status: u16, code: &str) -> RemoteError {
    RemoteError::Api {
        status,
        code: Some(code.to_string()),
        message: None,
        request_id: None,
    }
}

impl OffsetService for FakeService {
    fn account_mode(&mut self) -> Result<AccountMode, RemoteError> {
        self.calls.mode += 1;
        Ok(self.mode)
    }

    fn find_entity(
        &mut self,
        name: &str,
        beneficiary: &str,
    ) -> Result<Option<Entity>, RemoteError> {
        self.calls.find += 1;
        Ok(self
            .entities
            .get(name)
            .filter(|(_, b)| b == beneficiary)
            .map(|(e, _)| e.clone()))
    }

    fn create_entity(&mut self, name: &str, beneficiary: &str) -> Result<Entity, RemoteError> {
        self.calls.create += 1;
        if self.fail_create_for.as_deref() == Some(name) {
            return Err(rejected(422, "validation_error"));
        }
        Ok(self.seed_entity(name, beneficiary))
    }

    fn configure_page(
        &mut self,
        entity: &Entity,
        _beneficiary: &str,
        branding: Option<&Path>,
    ) -> Result<String, RemoteError> {
        self.calls.configure += 1;
        self.last_branding = branding.map(Path::to_path_buf);
        Ok(format!("https://pages.example.com/test/{}", entity.id))
    }

    fn place_purchase(&mut self, request: &PurchaseRequest) -> Result<String, RemoteError> {
        self.calls.purchase += 1;
        if self.fail_purchase_at == Some(self.calls.purchase) {
            return Err(rejected(503, "service_unavailable"));
        }
        self.purchases.push(request.clone());
        if let Some(existing) = self.orders.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }
        let order_id = self.fresh_id("ord");
        self.orders
            .insert(request.idempotency_key.clone(), order_id.clone());
        Ok(order_id)
    }
}
