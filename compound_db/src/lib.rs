//! Chemical compound lookup backed by a two-level key-value store.
//!
//! A free-text query is resolved to a ChEBI record either as a structure (the first token
//! is parsed as SMILES, canonicalized, and looked up exactly) or as a name (the whole query
//! lowercased). The store holds a `lookup` map from key to compact identifier and a `data` map
//! from identifier to record, replaced together by bulk loads that serialize on a lease.
//!
//! Tabular bioassay data (ChEMBL-NTD and arbitrary CSV/TSV uploads) is held alongside as typed
//! collections with schemas guessed at ingestion time.
//!
//! TODO
//! - [x] SMILES canonicalization with atom reordering
//! - [x] structure then name resolution
//! - [x] leased bulk loads with atomic swap
//! - [ ] aromaticity perception so kekule and aromatic inputs agree
//!
pub mod error;
pub mod smiles;
pub mod canonical;
pub mod data;
pub mod source;
pub mod store;
pub mod lease;
pub mod resolver;
pub mod chebi;
pub mod config;
pub mod table;
pub mod schema;
pub mod collection;
