// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//!
//! The service registry: an indexed catalog of registered services, keyed
//! by id and by normalized display name, with an optional file-system
//! backing store for persistence across process restarts.

use std::collections::HashMap;

use tracing::warn;
use tw_model::{
    normalize_name, resolve_address, AddressHint, Error, Result, ServiceAddress, ServiceDefinition,
};

/// File-system persistence for the registry.
pub mod store;

pub use store::FileSystemStore;

/// Attribute overrides accepted by [`Registry::update`].
#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub service_address: Option<(String, Option<AddressHint>)>,
    pub category: Option<Vec<String>>,
}

/// An in-memory, optionally persisted catalog of [`ServiceDefinition`]s.
pub struct Registry {
    services: HashMap<String, ServiceDefinition>,
    normalized_name: HashMap<String, String>,
    backing_store: Option<FileSystemStore>,
}

impl Registry {
    /// Creates an empty, non-persistent registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
            normalized_name: HashMap::new(),
            backing_store: None,
        }
    }

    /// Creates a registry backed by a file-system store at `root`.
    #[must_use]
    pub fn with_backing_store(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            services: HashMap::new(),
            normalized_name: HashMap::new(),
            backing_store: Some(FileSystemStore::new(root)),
        }
    }

    /// Registers a service. Fails [`Error::DuplicateId`] on id collision.
    /// A name collision with a different id is tolerated: the prior
    /// name-index entry is overwritten and a warning logged, since
    /// human-authored display names repeat.
    pub fn add(&mut self, service: ServiceDefinition) -> Result<()> {
        if self.services.contains_key(&service.id) {
            return Err(Error::DuplicateId(service.id.clone()));
        }
        let normalized = service.normalized_name();
        if let Some(existing_id) = self.normalized_name.get(&normalized) {
            if existing_id != &service.id {
                warn!(
                    name = %normalized,
                    existing_id = %existing_id,
                    new_id = %service.id,
                    "service name collision; overwriting name index"
                );
            }
        }
        self.normalized_name.insert(normalized, service.id.clone());

        if let Some(store) = &self.backing_store {
            store.save(&service)?;
        }
        self.services.insert(service.id.clone(), service);
        Ok(())
    }

    /// Looks up a service by id or normalized display name. On an in-memory
    /// miss, if a backing store is configured it is queried and the result
    /// hydrated into memory.
    pub fn get(&mut self, id_or_name: &str) -> Result<&ServiceDefinition> {
        if self.services.contains_key(id_or_name) {
            return Ok(&self.services[id_or_name]);
        }
        let normalized = normalize_name(id_or_name);
        if let Some(id) = self.normalized_name.get(&normalized).cloned() {
            if self.services.contains_key(&id) {
                return Ok(&self.services[&id]);
            }
        }
        if let Some(store) = &self.backing_store {
            let candidate_id = self
                .normalized_name
                .get(&normalized)
                .cloned()
                .unwrap_or_else(|| id_or_name.to_string());
            let hydrated = store.load(&candidate_id)?;
            let normalized_hydrated = hydrated.normalized_name();
            self.normalized_name.insert(normalized_hydrated, hydrated.id.clone());
            self.services.insert(hydrated.id.clone(), hydrated);
            return Ok(&self.services[&candidate_id]);
        }
        Err(Error::NotFound(id_or_name.to_string()))
    }

    /// Applies attribute overrides to a registered service.
    /// `service_address` strings are re-parsed through the resolver;
    /// `display_name` updates both the record and the name index
    /// atomically.
    pub fn update(&mut self, id_or_name: &str, changes: ServiceUpdate) -> Result<()> {
        let id = self.resolve_id(id_or_name)?;
        let old_normalized = self.services[&id].normalized_name();

        let service = self.services.get_mut(&id).expect("resolved id must exist");
        if let Some(display_name) = changes.display_name {
            service.display_name = display_name;
        }
        if let Some(description) = changes.description {
            service.description = description;
        }
        if let Some((raw, hint)) = changes.service_address {
            service.service_address = resolve_address(&raw, hint);
        }
        if let Some(category) = changes.category {
            service.category = Some(category);
        }

        let new_normalized = service.normalized_name();
        if new_normalized != old_normalized {
            self.normalized_name.remove(&old_normalized);
            self.normalized_name.insert(new_normalized, id.clone());
        }

        if let Some(store) = &self.backing_store {
            store.save(&self.services[&id])?;
        }
        Ok(())
    }

    /// Removes a service and purges all index entries and, if configured,
    /// the backing store.
    pub fn remove(&mut self, id_or_name: &str) -> Result<ServiceDefinition> {
        let id = self.resolve_id(id_or_name)?;
        let service = self.services.remove(&id).expect("resolved id must exist");
        self.normalized_name.remove(&service.normalized_name());
        if let Some(store) = &self.backing_store {
            store.delete(&id)?;
        }
        Ok(service)
    }

    /// Lists every registered service, filtered by an optional predicate.
    #[must_use]
    pub fn list(&self, filter: impl Fn(&ServiceDefinition) -> bool) -> Vec<&ServiceDefinition> {
        self.services.values().filter(|s| filter(s)).collect()
    }

    /// Groups registered services by their `family_id`, omitting services
    /// with no family.
    #[must_use]
    pub fn group_by_family(&self) -> HashMap<String, Vec<&ServiceDefinition>> {
        let mut groups: HashMap<String, Vec<&ServiceDefinition>> = HashMap::new();
        for service in self.services.values() {
            if let Some(family) = &service.family_id {
                groups.entry(family.clone()).or_default().push(service);
            }
        }
        groups
    }

    fn resolve_id(&self, id_or_name: &str) -> Result<String> {
        if self.services.contains_key(id_or_name) {
            return Ok(id_or_name.to_string());
        }
        let normalized = normalize_name(id_or_name);
        self.normalized_name
            .get(&normalized)
            .cloned()
            .ok_or_else(|| Error::NotFound(id_or_name.to_string()))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// A fallback generic address used when constructing services in tests and
/// examples elsewhere in the workspace.
#[must_use]
pub fn generic_address(url: &str) -> ServiceAddress {
    resolve_address(url, Some(AddressHint::Generic))
}
