//! In-memory preparation backends for testing and embedding.
//!
//! Both stores keep everything in a `BTreeMap` behind a `RwLock`. Data is
//! lost when they are dropped.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{RefError, Result};
use crate::traits::{PreparationLocker, PreparationRepository};
use crate::types::{Preparation, PreparationId};

fn poisoned(e: impl std::fmt::Display) -> RefError {
    RefError::Unavailable(format!("lock poisoned: {e}"))
}

/// An in-memory implementation of [`PreparationRepository`].
#[derive(Debug, Default)]
pub struct InMemoryPreparationRepository {
    preparations: RwLock<BTreeMap<PreparationId, Preparation>>,
}

impl InMemoryPreparationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreparationRepository for InMemoryPreparationRepository {
    fn get(&self, id: &PreparationId) -> Result<Option<Preparation>> {
        let map = self.preparations.read().map_err(poisoned)?;
        Ok(map.get(id).cloned())
    }

    fn insert(&self, preparation: &Preparation) -> Result<()> {
        let mut map = self.preparations.write().map_err(poisoned)?;
        if map.contains_key(&preparation.id) {
            return Err(RefError::AlreadyExists(preparation.id.clone()));
        }
        map.insert(preparation.id.clone(), preparation.clone());
        Ok(())
    }

    fn update(&self, preparation: &Preparation) -> Result<()> {
        let mut map = self.preparations.write().map_err(poisoned)?;
        match map.get_mut(&preparation.id) {
            Some(slot) => {
                *slot = preparation.clone();
                Ok(())
            }
            None => Err(RefError::NotFound(preparation.id.clone())),
        }
    }

    fn remove(&self, id: &PreparationId) -> Result<bool> {
        let mut map = self.preparations.write().map_err(poisoned)?;
        Ok(map.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<Preparation>> {
        let map = self.preparations.read().map_err(poisoned)?;
        Ok(map.values().cloned().collect())
    }
}

/// An in-memory implementation of [`PreparationLocker`].
#[derive(Debug, Default)]
pub struct InMemoryPreparationLocker {
    holders: RwLock<BTreeMap<PreparationId, String>>,
}

impl InMemoryPreparationLocker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreparationLocker for InMemoryPreparationLocker {
    fn lock(&self, preparation: &PreparationId, owner: &str) -> Result<()> {
        let mut holders = self.holders.write().map_err(poisoned)?;
        match holders.get(preparation) {
            Some(current) if current == owner => Ok(()),
            Some(current) => Err(RefError::Locked {
                preparation: preparation.clone(),
                owner: current.clone(),
            }),
            None => {
                debug!(preparation = %preparation, owner, "locked");
                holders.insert(preparation.clone(), owner.to_string());
                Ok(())
            }
        }
    }

    fn unlock(&self, preparation: &PreparationId, owner: &str) -> Result<()> {
        let mut holders = self.holders.write().map_err(poisoned)?;
        if holders.get(preparation).is_some_and(|current| current == owner) {
            holders.remove(preparation);
            debug!(preparation = %preparation, owner, "unlocked");
        }
        Ok(())
    }

    fn holder(&self, preparation: &PreparationId) -> Result<Option<String>> {
        let holders = self.holders.read().map_err(poisoned)?;
        Ok(holders.get(preparation).cloned())
    }
}
