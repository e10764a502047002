//! The two-level store: a `lookup` map from lookup key to compact identifier
//! and a `data` map from identifier to record.
//!
//! `MemoryStore` keeps both maps behind one `Arc` that is swapped whole on every
//! bulk replace or flush, so a reader holding a version sees either the old
//! pair of maps or the new pair, never one of each. Loads are staged off to the
//! side in fixed size batches before the swap.

use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File};
use std::hash::Hash;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data::{ChebiArchive, CompactId, DataRecord, LoadCounts};
use crate::error::{Error, Result};

/// Lookup maps at or below this size are treated as not loaded.
pub const POPULATED_THRESHOLD: usize = 1000;

pub const BATCH_SIZE: usize = 64;

/// Outcome of reading one lookup key through both maps.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Missing,
    /// The key names an identifier that the data map does not hold.
    Dangling(CompactId),
    Found(CompactId, DataRecord),
}

pub trait TwoLevelStore: Send + Sync {

    fn get_identifier(&self, lookup_key: &str) -> Result<Option<CompactId>>;

    fn get_record(&self, id: &CompactId) -> Result<Option<DataRecord>>;

    /// Replaces both maps. Readers see the old pair until the new pair is
    /// complete.
    fn bulk_replace(&self, lookup: HashMap<String, CompactId>, data: HashMap<CompactId, DataRecord>) -> Result<LoadCounts>;

    fn lookup_len(&self) -> Result<usize>;

    fn flush(&self) -> Result<()>;

    fn is_populated(&self) -> Result<bool> {
        Ok(self.lookup_len()? > POPULATED_THRESHOLD)
    }

    /// Both reads of a lookup. Stores that can pin a version should override
    /// this so the two reads cannot straddle a bulk replace.
    fn lookup(&self, lookup_key: &str) -> Result<Lookup> {

        let id = match self.get_identifier(lookup_key)? {
            Some(id) => id,
            None => return Ok(Lookup::Missing),
        };

        match self.get_record(&id)? {
            Some(record) => Ok(Lookup::Found(id, record)),
            None => Ok(Lookup::Dangling(id)),
        }
    }
}

/// Named, expiring ownership tokens used to keep bulk loads from interleaving.
pub trait Leases: Send + Sync {

    /// Takes the lease if it is free, expired, or already held by `token`.
    fn try_acquire_lease(&self, name: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// Extends a lease still held by `token`. False once it has been lost.
    fn renew_lease(&self, name: &str, token: &str, ttl: Duration) -> Result<bool>;

    fn release_lease(&self, name: &str, token: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct Maps {
    lookup: HashMap<String, CompactId>,
    data: HashMap<CompactId, DataRecord>,
}

#[derive(Debug)]
struct Lease {
    token: String,
    expires: Instant,
}

#[derive(Debug)]
pub struct MemoryStore {
    maps: RwLock<Arc<Maps>>,
    leases: Mutex<HashMap<String, Lease>>,
    batch_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Moves `entries` into `target` `batch_size` at a time and returns the size of
/// every batch written.
fn stage<K: Eq + Hash, V>(target: &mut HashMap<K, V>, entries: HashMap<K, V>, batch_size: usize) -> Vec<usize> {

    let mut sizes = Vec::new();
    let mut batch = Vec::with_capacity(batch_size);

    for entry in entries {
        batch.push(entry);
        if batch.len() == batch_size {
            sizes.push(batch.len());
            target.extend(batch.drain(..));
        }
    }

    sizes.push(batch.len());
    target.extend(batch.drain(..));
    return sizes;
}

impl MemoryStore {

    pub fn new() -> Self {
        Self::with_batch_size(BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {

        return Self {
            maps: RwLock::new(Arc::new(Maps::default())),
            leases: Mutex::new(HashMap::new()),
            batch_size: batch_size.max(1),
        };
    }

    fn current(&self) -> Arc<Maps> {
        self.maps.read().clone()
    }

    pub fn data_len(&self) -> usize {
        self.current().data.len()
    }

    /// Writes both maps to `path` as msgpack, through a temporary file renamed
    /// into place.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {

        let path = path.as_ref();
        let maps = self.current();

        let archive = ChebiArchive {
            data: maps.data.clone(),
            lookup: maps.lookup.clone(),
        };

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            rmp_serde::encode::write_named(&mut writer, &archive)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;

        info!("Snapshot written to {:?}: {} lookup, {} data entries.", path, archive.lookup.len(), archive.data.len());
        return Ok(());
    }

    pub fn open_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {

        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let archive = ChebiArchive::from_bytes(&bytes)?;

        info!("Snapshot read from {:?}: {} lookup, {} data entries.", path, archive.lookup.len(), archive.data.len());

        let store = Self::new();
        *store.maps.write() = Arc::new(Maps {
            lookup: archive.lookup,
            data: archive.data,
        });
        return Ok(store);
    }

    /// Every lookup key, unordered.
    pub fn lookup_keys(&self) -> Vec<String> {
        self.current().lookup.keys().cloned().collect()
    }
}

impl TwoLevelStore for MemoryStore {

    fn get_identifier(&self, lookup_key: &str) -> Result<Option<CompactId>> {
        Ok(self.current().lookup.get(lookup_key).cloned())
    }

    fn get_record(&self, id: &CompactId) -> Result<Option<DataRecord>> {
        Ok(self.current().data.get(id).cloned())
    }

    fn lookup(&self, lookup_key: &str) -> Result<Lookup> {

        let maps = self.current();

        let id = match maps.lookup.get(lookup_key) {
            Some(id) => id,
            None => return Ok(Lookup::Missing),
        };

        match maps.data.get(id) {
            Some(record) => Ok(Lookup::Found(id.clone(), record.clone())),
            None => Ok(Lookup::Dangling(id.clone())),
        }
    }

    fn bulk_replace(&self, lookup: HashMap<String, CompactId>, data: HashMap<CompactId, DataRecord>) -> Result<LoadCounts> {

        let mut staged = Maps {
            lookup: HashMap::with_capacity(lookup.len()),
            data: HashMap::with_capacity(data.len()),
        };

        let mut counts = LoadCounts::new();

        info!("Loading data into store.");
        let sizes = stage(&mut staged.data, data, self.batch_size);
        debug!("data: {} batches", sizes.len());
        counts.insert("data".to_string(), sizes.iter().sum());

        info!("Loading lookup into store.");
        let sizes = stage(&mut staged.lookup, lookup, self.batch_size);
        debug!("lookup: {} batches", sizes.len());
        counts.insert("lookup".to_string(), sizes.iter().sum());

        *self.maps.write() = Arc::new(staged);

        debug!("{:?}", counts);
        return Ok(counts);
    }

    fn lookup_len(&self) -> Result<usize> {
        Ok(self.current().lookup.len())
    }

    fn flush(&self) -> Result<()> {

        info!("Flushing store.");
        *self.maps.write() = Arc::new(Maps::default());
        return Ok(());
    }
}

impl Leases for MemoryStore {

    fn try_acquire_lease(&self, name: &str, token: &str, ttl: Duration) -> Result<bool> {

        let mut leases = self.leases.lock();
        let now = Instant::now();

        if let Some(lease) = leases.get(name) {
            if lease.expires > now && lease.token != token {
                return Ok(false);
            }
        }

        leases.insert(name.to_string(), Lease { token: token.to_string(), expires: now + ttl });
        return Ok(true);
    }

    fn renew_lease(&self, name: &str, token: &str, ttl: Duration) -> Result<bool> {

        let mut leases = self.leases.lock();
        let now = Instant::now();

        match leases.get_mut(name) {
            Some(lease) if lease.token == token && lease.expires > now => {
                lease.expires = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release_lease(&self, name: &str, token: &str) -> Result<()> {

        let mut leases = self.leases.lock();
        if leases.get(name).map_or(false, |lease| lease.token == token) {
            leases.remove(name);
        }
        return Ok(());
    }
}

/// A store that fails every call, standing in for an unreachable backend.
#[derive(Debug, Default)]
pub struct UnavailableStore;

impl UnavailableStore {

    fn fail<T>(&self) -> Result<T> {
        Err(Error::StoreUnavailable("store is not reachable".to_string()))
    }
}

impl TwoLevelStore for UnavailableStore {

    fn get_identifier(&self, _lookup_key: &str) -> Result<Option<CompactId>> {
        self.fail()
    }

    fn get_record(&self, _id: &CompactId) -> Result<Option<DataRecord>> {
        self.fail()
    }

    fn bulk_replace(&self, _lookup: HashMap<String, CompactId>, _data: HashMap<CompactId, DataRecord>) -> Result<LoadCounts> {
        self.fail()
    }

    fn lookup_len(&self) -> Result<usize> {
        self.fail()
    }

    fn flush(&self) -> Result<()> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn generation(tag: &str, n: usize) -> (HashMap<String, CompactId>, HashMap<CompactId, DataRecord>) {

        let mut lookup = HashMap::new();
        let mut data = HashMap::new();
        for i in 0..n {
            let id = CompactId::Int(i as u64);
            lookup.insert(format!("compound-{}", i), id.clone());
            data.insert(id, DataRecord::named(tag));
        }
        return (lookup, data);
    }

    #[test]
    fn replace_and_read() {

        let store = MemoryStore::new();
        let (lookup, data) = generation("old", 200);
        let counts = store.bulk_replace(lookup, data).unwrap();

        assert_eq!(counts.get("data"), Some(&200));
        assert_eq!(counts.get("lookup"), Some(&200));
        assert_eq!(store.get_identifier("compound-7").unwrap(), Some(CompactId::Int(7)));
        assert_eq!(store.get_record(&CompactId::Int(7)).unwrap().unwrap().name.as_deref(), Some("old"));
        assert_eq!(store.get_identifier("compound-700").unwrap(), None);
        assert_eq!(store.lookup("compound-700").unwrap(), Lookup::Missing);
    }

    #[test]
    fn replace_discards_previous_entries() {

        let store = MemoryStore::new();
        let (lookup, data) = generation("old", 50);
        store.bulk_replace(lookup, data).unwrap();

        let (lookup, data) = generation("new", 10);
        store.bulk_replace(lookup, data).unwrap();

        assert_eq!(store.lookup_len().unwrap(), 10);
        assert_eq!(store.data_len(), 10);
        assert_eq!(store.get_identifier("compound-20").unwrap(), None);
    }

    #[test]
    fn dangling_identifier_is_not_a_crash() {

        let store = MemoryStore::new();
        let mut lookup = HashMap::new();
        lookup.insert("ghost".to_string(), CompactId::Int(404));
        store.bulk_replace(lookup, HashMap::new()).unwrap();

        assert_eq!(store.lookup("ghost").unwrap(), Lookup::Dangling(CompactId::Int(404)));
    }

    #[test]
    fn batching_splits_at_batch_size() {

        let mut target: HashMap<usize, usize> = HashMap::new();
        let entries: HashMap<usize, usize> = (0..130).map(|i| (i, i)).collect();
        let sizes = stage(&mut target, entries, 64);

        assert_eq!(sizes, vec![64, 64, 2]);
        assert_eq!(target.len(), 130);
    }

    #[test]
    fn populated_threshold() {

        let store = MemoryStore::new();
        assert!(!store.is_populated().unwrap());

        let (lookup, _) = generation("x", POPULATED_THRESHOLD);
        store.bulk_replace(lookup, HashMap::new()).unwrap();
        assert!(!store.is_populated().unwrap());

        // data map size plays no part
        let (lookup, _) = generation("x", POPULATED_THRESHOLD + 1);
        store.bulk_replace(lookup, HashMap::new()).unwrap();
        assert!(store.is_populated().unwrap());

        let (_, data) = generation("x", 5000);
        store.bulk_replace(HashMap::new(), data).unwrap();
        assert!(!store.is_populated().unwrap());
    }

    #[test]
    fn flush_empties_both_maps() {

        let store = MemoryStore::new();
        let (lookup, data) = generation("old", 20);
        store.bulk_replace(lookup, data).unwrap();
        store.flush().unwrap();

        assert_eq!(store.lookup_len().unwrap(), 0);
        assert_eq!(store.data_len(), 0);
    }

    #[test]
    fn readers_never_see_mixed_generations() {

        let store = Arc::new(MemoryStore::with_batch_size(8));
        let (lookup, data) = generation("old", 500);
        store.bulk_replace(lookup, data).unwrap();

        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4).map(|r| {
            let store = store.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut seen = 0;
                while !done.load(Ordering::Relaxed) {
                    let key = format!("compound-{}", (seen * 7 + r) % 500);
                    // old generation has 500 entries, new has 300
                    match store.lookup(&key).unwrap() {
                        Lookup::Found(_, record) => {
                            let tag = record.name.unwrap();
                            assert!(tag == "old" || tag == "new");
                        }
                        Lookup::Missing => {}
                        Lookup::Dangling(id) => panic!("mixed generations at {}", id),
                    }
                    seen += 1;
                }
                seen
            })
        }).collect();

        for round in 0..20 {
            let (tag, n) = if round % 2 == 0 { ("new", 300) } else { ("old", 500) };
            let (lookup, data) = generation(tag, n);
            // lookup keys of one generation point only at its own data
            let data = data.into_iter().map(|(id, _)| (id, DataRecord::named(tag))).collect();
            store.bulk_replace(lookup, data).unwrap();
        }

        done.store(true, Ordering::Relaxed);
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
    }

    #[test]
    fn snapshot_round_trip() {

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chebi.snapshot");

        let store = MemoryStore::new();
        let (lookup, data) = generation("saved", 30);
        store.bulk_replace(lookup, data).unwrap();
        store.save_snapshot(&path).unwrap();

        let reopened = MemoryStore::open_snapshot(&path).unwrap();
        assert_eq!(reopened.lookup_len().unwrap(), 30);
        assert_eq!(reopened.lookup("compound-3").unwrap(), store.lookup("compound-3").unwrap());
    }

    #[test]
    fn lease_ownership() {

        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);

        assert!(store.try_acquire_lease("name-lock", "a", ttl).unwrap());
        assert!(!store.try_acquire_lease("name-lock", "b", ttl).unwrap());
        assert!(store.renew_lease("name-lock", "a", ttl).unwrap());
        assert!(!store.renew_lease("name-lock", "b", ttl).unwrap());

        // releasing with the wrong token leaves the lease in place
        store.release_lease("name-lock", "b").unwrap();
        assert!(!store.try_acquire_lease("name-lock", "b", ttl).unwrap());

        store.release_lease("name-lock", "a").unwrap();
        assert!(store.try_acquire_lease("name-lock", "b", ttl).unwrap());
    }

    #[test]
    fn expired_lease_can_be_taken_over() {

        let store = MemoryStore::new();
        assert!(store.try_acquire_lease("name-lock", "a", Duration::from_millis(10)).unwrap());
        thread::sleep(Duration::from_millis(30));

        assert!(!store.renew_lease("name-lock", "a", Duration::from_secs(1)).unwrap());
        assert!(store.try_acquire_lease("name-lock", "b", Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn unavailable_store_fails_hard() {

        let store = UnavailableStore;
        assert!(matches!(store.lookup("water"), Err(Error::StoreUnavailable(_))));
        assert!(matches!(store.is_populated(), Err(Error::StoreUnavailable(_))));
    }
}
