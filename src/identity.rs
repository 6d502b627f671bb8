//! Per-run mapping from recipient names to remote accounts.

use crate::ensure::{EntityEnsurer, ResolvedEntity};
use crate::remote::{OffsetService, RemoteError};
use log::debug;
use std::collections::HashMap;

/// Caches one resolved account per distinct recipient name.
///
/// Owned by the pipeline and scoped to a single run. Nothing here is
/// persisted: every run rebuilds the mapping from the remote state, which
/// is the source of truth.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    cache: HashMap<String, ResolvedEntity>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the account for `name`, ensuring it on first use.
    ///
    /// Each distinct name reaches the remote service at most once per run, so
    /// rows sharing a name never trigger a second creation.
    pub fn resolve<S: OffsetService>(
        &mut self,
        name: &str,
        ensurer: &EntityEnsurer,
        service: &mut S,
    ) -> Result<&ResolvedEntity, RemoteError> {
        if self.cache.contains_key(name) {
            debug!("Reusing cached account for {:?}", name);
        } else {
            let resolved = ensurer.ensure(service, name)?;
            self.cache.insert(name.to_string(), resolved);
        }
        // Present: either cached already or inserted above.
        Ok(&self.cache[name])
    }

    /// Number of distinct names resolved so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::fake::FakeService;

    #[test]
    fn test_same_name_resolves_once() {
        let mut service = FakeService::new();
        let ensurer = EntityEnsurer::new(&RunConfig::new("Acme"));
        let mut resolver = IdentityResolver::new();

        let first = resolver.resolve("Alice", &ensurer, &mut service).unwrap().clone();
        let second = resolver.resolve("Alice", &ensurer, &mut service).unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(service.calls.find, 1);
        assert_eq!(service.calls.create, 1);
        assert_eq!(resolver.len(), 1);
    }

    #[test]
    fn test_distinct_names_get_distinct_entities() {
        let mut service = FakeService::new();
        let ensurer = EntityEnsurer::new(&RunConfig::new("Acme"));
        let mut resolver = IdentityResolver::new();

        let alice = resolver.resolve("Alice", &ensurer, &mut service).unwrap().entity.id.clone();
        let bob = resolver.resolve("Bob", &ensurer, &mut service).unwrap().entity.id.clone();

        assert_ne!(alice, bob);
        assert_eq!(service.calls.create, 2);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let mut service = FakeService::new();
        service.fail_create_for = Some("Alice".to_string());
        let ensurer = EntityEnsurer::new(&RunConfig::new("Acme"));
        let mut resolver = IdentityResolver::new();

        assert!(resolver.resolve("Alice", &ensurer, &mut service).is_err());
        assert!(resolver.is_empty());

        service.fail_create_for = None;
        assert!(resolver.resolve("Alice", &ensurer, &mut service).is_ok());
        assert_eq!(resolver.len(), 1);
    }
}
