//! Free-text query resolution: structure first, then name.

use log::debug;
use std::sync::Arc;

use crate::canonical::{Canonicalizer, SmilesCanonicalizer};
use crate::data::ResolvedResult;
use crate::error::{Error, Result};
use crate::store::{Lookup, TwoLevelStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// First whitespace token, canonicalized, looked up as is.
    Structure,
    /// Whole query, lowercased.
    Name,
}

pub const STRATEGIES: [Strategy; 2] = [Strategy::Structure, Strategy::Name];

pub struct Resolver<S: TwoLevelStore + ?Sized, C: Canonicalizer = SmilesCanonicalizer> {
    store: Arc<S>,
    canonicalizer: C,
}

impl<S: TwoLevelStore + ?Sized> Resolver<S, SmilesCanonicalizer> {

    pub fn new(store: Arc<S>) -> Self {
        Self::with_canonicalizer(store, SmilesCanonicalizer)
    }
}

impl<S: TwoLevelStore + ?Sized, C: Canonicalizer> Resolver<S, C> {

    pub fn with_canonicalizer(store: Arc<S>, canonicalizer: C) -> Self {
        Self { store, canonicalizer }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Tries each strategy in turn and returns the first hit. Misses fall
    /// through, store failures do not.
    pub fn resolve(&self, query: &str) -> Result<ResolvedResult> {

        for strategy in STRATEGIES {
            if let Some(result) = self.attempt(strategy, query)? {
                debug!("{:?} resolved {:?} to {}", strategy, query, result.chebi);
                return Ok(result);
            }
        }

        return Err(Error::NotResolvable(query.to_string()));
    }

    pub fn attempt(&self, strategy: Strategy, query: &str) -> Result<Option<ResolvedResult>> {

        match strategy {
            Strategy::Structure => self.by_structure(query),
            Strategy::Name => self.by_name(query),
        }
    }

    fn by_structure(&self, query: &str) -> Result<Option<ResolvedResult>> {

        let token = match query.split_whitespace().next() {
            Some(token) => token,
            None => return Ok(None),
        };

        let canonical = match self.canonicalizer.canonicalize(token) {
            Ok(canonical) => canonical,
            Err(e) => {
                debug!("{:?} is not a structure: {}", token, e);
                return Ok(None);
            }
        };

        let found = self.fetch(&canonical.smiles)?;
        return Ok(found.map(|mut result| {
            result.reordering = Some(canonical.atom_order);
            result
        }));
    }

    fn by_name(&self, query: &str) -> Result<Option<ResolvedResult>> {
        self.fetch(&query.to_lowercase())
    }

    fn fetch(&self, lookup_key: &str) -> Result<Option<ResolvedResult>> {

        match self.store.lookup(lookup_key)? {
            Lookup::Found(chebi, record) => Ok(Some(ResolvedResult { record, chebi, reordering: None })),
            Lookup::Dangling(id) => {
                debug!("{:?} points at {} which has no record", lookup_key, id);
                Ok(None)
            }
            Lookup::Missing => Ok(None),
        }
    }
}
