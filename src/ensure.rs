//! Making sure a customer's remote account and page exist.

use crate::config::RunConfig;
use crate::remote::{Entity, OffsetService, RemoteError};
use log::{debug, info};
use std::path::PathBuf;

/// A customer account that is ready to receive orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub entity: Entity,
    pub page_url: String,
}

/// Idempotently brings a customer's account and page into the desired state.
///
/// Safe to run against accounts left behind by an interrupted run: the
/// account is only created when the lookup finds nothing, and the page
/// configuration is re-applied every time.
#[derive(Debug, Clone)]
pub struct EntityEnsurer {
    beneficiary: String,
    branding: Option<PathBuf>,
}

impl EntityEnsurer {
    pub fn new(config: &RunConfig) -> Self {
        EntityEnsurer {
            beneficiary: config.beneficiary.clone(),
            branding: config.branding.clone(),
        }
    }

    /// Looks up or creates the account for `name` and configures its page.
    ///
    /// Errors propagate untouched; an account created before a failure is
    /// picked up by the lookup on the next run.
    pub fn ensure<S: OffsetService>(
        &self,
        service: &mut S,
        name: &str,
    ) -> Result<ResolvedEntity, RemoteError> {
        let entity = match service.find_entity(name, &self.beneficiary)? {
            Some(entity) => {
                debug!("Found existing account {} for {:?}", entity.id, name);
                entity
            }
            None => {
                info!("Creating account for {:?}", name);
                let entity = service.create_entity(name, &self.beneficiary)?;
                debug!("Created account {} for {:?}", entity.id, name);
                entity
            }
        };

        let page_url =
            service.configure_page(&entity, &self.beneficiary, self.branding.as_deref())?;
        debug!("Page for {:?} is {}", name, page_url);

        Ok(ResolvedEntity { entity, page_url })
    }
}
