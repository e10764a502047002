//! Bulk loading of the ChEBI archive into a store.

use log::{debug, info};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::canonical::{Canonicalizer, SmilesCanonicalizer};
use crate::config::ServiceConfig;
use crate::data::{ChebiArchive, LoadCounts};
use crate::error::Result;
use crate::lease::LeaseLock;
use crate::source;
use crate::store::{Leases, MemoryStore, TwoLevelStore};

pub const LOAD_LEASE: &str = "name-lock";

/// What `load` did. Serializes as `false` when skipped and as the per-map
/// counts otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Skipped,
    Loaded(LoadCounts),
}

impl Serialize for LoadOutcome {

    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            LoadOutcome::Skipped => serializer.serialize_bool(false),
            LoadOutcome::Loaded(counts) => counts.serialize(serializer),
        }
    }
}

/// Adds a lookup key in this crate's canonical form for every record with a
/// structure, so structure queries do not depend on how the archive spelled
/// it. Existing keys are left alone. Returns the number of keys added.
pub fn add_structure_keys<C: Canonicalizer>(archive: &mut ChebiArchive, canonicalizer: &C) -> usize {

    let mut ids: Vec<_> = archive.data.keys().cloned().collect();
    ids.sort();

    let mut added = 0;
    for id in ids {
        let record = match archive.data.get(&id) {
            Some(record) => record,
            None => continue,
        };
        let structure = match record.smiles.as_ref().or(record.isomeric_smiles.as_ref()) {
            Some(structure) => structure,
            None => continue,
        };

        match canonicalizer.canonicalize(structure) {
            Ok(canonical) => {
                if !archive.lookup.contains_key(&canonical.smiles) {
                    archive.lookup.insert(canonical.smiles, id);
                    added += 1;
                }
            }
            Err(e) => debug!("{} has no usable structure: {}", id, e),
        }
    }

    return added;
}

/// Something that can write the store out once a load lands.
pub trait Snapshot {
    fn save_snapshot(&self, path: &std::path::Path) -> Result<()>;
}

impl Snapshot for MemoryStore {

    fn save_snapshot(&self, path: &std::path::Path) -> Result<()> {
        MemoryStore::save_snapshot(self, path)
    }
}

pub struct ChebiLoader<S: TwoLevelStore + Leases + Snapshot + 'static> {
    store: Arc<S>,
    location: String,
    lock: LeaseLock,
    snapshot: Option<PathBuf>,
}

impl<S: TwoLevelStore + Leases + Snapshot + 'static> ChebiLoader<S> {

    pub fn new(store: Arc<S>, location: &str) -> Self {

        return Self {
            store,
            location: location.to_string(),
            lock: LeaseLock::new(LOAD_LEASE, Duration::from_secs(30), Duration::from_secs(60)),
            snapshot: None,
        };
    }

    pub fn from_config(store: Arc<S>, config: &ServiceConfig) -> Self {

        let mut loader = Self::new(store, &config.chebi_url)
            .with_lease(config.lease_ttl(), config.lease_wait());
        loader.snapshot = config.snapshot.as_ref().map(PathBuf::from);
        return loader;
    }

    pub fn with_lease(mut self, ttl: Duration, wait: Duration) -> Self {
        self.lock = LeaseLock::new(LOAD_LEASE, ttl, wait);
        self
    }

    pub fn with_snapshot(mut self, path: PathBuf) -> Self {
        self.snapshot = Some(path);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn loaded(&self) -> Result<bool> {
        self.store.is_populated()
    }

    pub fn download_data(&self) -> Result<ChebiArchive> {

        let bytes = source::fetch(&self.location)?;
        let archive = ChebiArchive::from_bytes(&bytes)?;

        info!("Archive holds {} lookup, {} data entries.", archive.lookup.len(), archive.data.len());
        return Ok(archive);
    }

    /// Replaces the store with a fresh copy of the archive, unless it is
    /// already populated and `force` is off.
    pub fn load(&self, force: bool) -> Result<LoadOutcome> {

        if !force && self.loaded()? {
            info!("Store already loaded, skipping.");
            return Ok(LoadOutcome::Skipped);
        }

        let _guard = self.lock.acquire(self.store.clone())?;

        // another loader may have finished while we waited
        if !force && self.loaded()? {
            info!("Store loaded while waiting for the lease, skipping.");
            return Ok(LoadOutcome::Skipped);
        }

        let mut archive = self.download_data()?;
        let added = add_structure_keys(&mut archive, &SmilesCanonicalizer);
        info!("Derived {} structure keys.", added);

        let counts = self.store.bulk_replace(archive.lookup, archive.data)?;

        if let Some(path) = &self.snapshot {
            self.store.save_snapshot(path)?;
        }

        info!("Load complete: {:?}", counts);
        return Ok(LoadOutcome::Loaded(counts));
    }

    pub fn flush(&self) -> Result<()> {

        self.store.flush()?;
        info!("Flushed lookup and data.");
        return Ok(());
    }
}
