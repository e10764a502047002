//! Typed record collections built from tables, and the catalog that holds them
//! by name.

use log::{info, warn};
use parking_lot::RwLock;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::schema::{normalize_name, CustomSchema, Schema, SchemaRegistry};
use crate::table::{Scalar, Table};

const LOG_EVERY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub pk: String,
    pub fields: Vec<(String, Scalar)>,
}

impl Record {

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, value)| value)
    }
}

impl Serialize for Record {

    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {

        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("pk", &self.pk)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Records of one schema plus equality indices on its indexed fields.
#[derive(Debug)]
pub struct Collection {
    schema: Schema,
    records: HashMap<String, Record>,
    /// field -> rendered value -> pks
    indices: HashMap<String, HashMap<String, Vec<String>>>,
}

impl Collection {

    /// Builds from table rows. Rows that do not fit the schema are skipped and
    /// counted.
    pub fn build(schema: Schema, table: &Table) -> Result<(Self, usize)> {

        let columns = schema.column_map(table)?;

        let mut indices: HashMap<String, HashMap<String, Vec<String>>> = schema
            .fields
            .iter()
            .filter(|f| f.index)
            .map(|f| (f.name.clone(), HashMap::new()))
            .collect();

        let mut records = HashMap::with_capacity(table.rows.len());
        let mut skipped = 0;

        for (line, row) in table.rows.iter().enumerate() {
            let fields = match schema.validate_row(row, &columns) {
                Ok(fields) => fields,
                Err(e) => {
                    warn!("{}: skipping row {}: {}", schema.name, line + 1, e);
                    skipped += 1;
                    continue;
                }
            };

            let pk = Uuid::new_v4().simple().to_string();
            for (name, value) in &fields {
                if let Some(index) = indices.get_mut(name) {
                    index.entry(value.to_string()).or_default().push(pk.clone());
                }
            }
            records.insert(pk.clone(), Record { pk, fields });

            if records.len() % LOG_EVERY == 0 {
                info!("{}: {} cycles executed. Total rows: {}.", schema.name, records.len() / LOG_EVERY, records.len());
            }
        }

        return Ok((Self { schema, records, indices }, skipped));
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {

        let mut keys: Vec<String> = self.records.keys().cloned().collect();
        keys.sort();
        return keys;
    }

    pub fn get(&self, pk: &str) -> Option<&Record> {
        self.records.get(pk)
    }

    /// Records whose indexed `field` renders exactly as `value`.
    pub fn find_eq(&self, field: &str, value: &str) -> Result<Vec<&Record>> {

        let index = self
            .indices
            .get(field)
            .ok_or_else(|| Error::Schema(format!("{} is not indexed on {}", self.schema.name, field)))?;

        let mut found: Vec<&Record> = index
            .get(value)
            .map(|pks| pks.iter().filter_map(|pk| self.records.get(pk)).collect())
            .unwrap_or_default();
        found.sort_by(|a, b| a.pk.cmp(&b.pk));
        return Ok(found);
    }

    /// Records whose full text `field` contains `needle`.
    pub fn find_text(&self, field: &str, needle: &str) -> Result<Vec<&Record>> {

        let searchable = self.schema.field(field).map_or(false, |f| f.full_text_search);
        if !searchable {
            return Err(Error::Schema(format!("{} has no full text search on {}", self.schema.name, field)));
        }

        let mut found: Vec<&Record> = self
            .records
            .values()
            .filter(|r| r.get(field).map_or(false, |v| v.to_string().contains(needle)))
            .collect();
        found.sort_by(|a, b| a.pk.cmp(&b.pk));
        return Ok(found);
    }

    /// Substring search on full text fields, equality on other indexed ones.
    pub fn search(&self, field: &str, value: &str) -> Result<Vec<&Record>> {

        match self.schema.field(field) {
            Some(spec) if spec.full_text_search => self.find_text(field, value),
            _ => self.find_eq(field, value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub status: String,
    pub message: String,
    pub rows: usize,
    pub skipped: usize,
}

/// Owns the schema registry and the live collection for each schema.
#[derive(Debug, Default)]
pub struct Catalog {
    registry: RwLock<SchemaRegistry>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl Catalog {

    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema`, builds its collection from `table` and swaps it in
    /// whole.
    pub fn refresh(&self, mut schema: Schema, table: &Table) -> Result<RefreshSummary> {

        schema.name = normalize_name(&schema.name);
        let (collection, skipped) = Collection::build(schema.clone(), table)?;
        let rows = collection.len();

        let name = self.registry.write().register(schema)?;
        self.collections.write().insert(name.clone(), Arc::new(collection));

        info!("Refreshed {}: {} rows, {} skipped.", name, rows, skipped);
        return Ok(RefreshSummary {
            status: "ok".to_string(),
            message: format!("Data loaded into {}. Total rows: {}.", name, rows),
            rows,
            skipped,
        });
    }

    /// Guesses a schema from `table`, applies `custom`, then refreshes.
    pub fn refresh_custom(&self, name: &str, table: &Table, sample_size: usize, custom: Option<&CustomSchema>) -> Result<RefreshSummary> {

        let schema = Schema::guessed(name, table, sample_size, custom)?;
        self.refresh(schema, table)
    }

    pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {

        self.collections
            .read()
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("collection {}", name)))
    }

    pub fn names(&self) -> Vec<String> {
        self.registry.read().names()
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::table::TableFormat;

    const HARVARD: &str = "\
NUMROW,SID,CID,Bioassay Source,RankScore,Outcome,DepositDate,Luminescence Parasite A,Luminescence Parasite B,Luminescence Liver A,Luminescence Liver B,Parasite (% Control A %),Parasite (% Control B %),Liver (% Control A %),Liver (% Control B %),Activity Parasite A %,Activity Parasite B %,SID SMILES,PubChem Substance Synonym
1,144203552,5280343,Harvard,33,Inactive,2012/06/01,1200,1100,3.5,3.25,90.1,88,101.2,99,10,12,CC(=O)Oc1ccccc1C(=O)O,aspirin
2,144203553,2244,Harvard,40,Active,2012/06/01,200,210,1.5,1.75,10,12,98,97,90,88,CN1C=NC2=C1C(=O)N(C(=O)N2C)C,caffeine
3,144203554,2519,Harvard,x,Active,2012/06/01,200,210,1.5,1.75,10,12,98,97,90,88,CCO,ethanol
";

    fn harvard() -> Table {
        Table::parse(HARVARD.as_bytes(), TableFormat::Csv).unwrap()
    }

    #[test]
    fn chemblntd_refresh() {

        let catalog = Catalog::new();
        let summary = catalog.refresh(Schema::chemblntd(), &harvard()).unwrap();
        dbg!(&summary);

        // row 3 has a non numeric rankscore
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.skipped, 1);

        let collection = catalog.collection("chemblntd").unwrap();
        assert_eq!(collection.keys().len(), 2);

        let active = collection.find_eq("outcome", "Active").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].get("pubchem_substance_synonym"), Some(&Scalar::Str("caffeine".to_string())));

        let hits = collection.find_text("sid_smiles", "c1ccccc1").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("cid"), Some(&Scalar::Str("5280343".to_string())));
    }

    #[test]
    fn unindexed_search_is_an_error() {

        let catalog = Catalog::new();
        catalog.refresh(Schema::chemblntd(), &harvard()).unwrap();
        let collection = catalog.collection("chemblntd").unwrap();

        assert!(collection.find_eq("rankscore", "33").is_err());
        assert!(collection.find_text("sid", "1442").is_err());
        assert_eq!(collection.search("sid", "144203552").unwrap().len(), 1);
        assert_eq!(collection.search("sid_smiles", "N").unwrap().len(), 1);
    }

    #[test]
    fn record_json_puts_pk_first() {

        let record = Record {
            pk: "01h".to_string(),
            fields: vec![("sid".to_string(), Scalar::Str("1".to_string())), ("rankscore".to_string(), Scalar::Int(33))],
        };
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"pk":"01h","sid":"1","rankscore":33}"#);
    }

    #[test]
    fn refresh_replaces_whole_collection() {

        let catalog = Catalog::new();
        let table = Table::parse(b"Name,Score\na,1\nb,2\n", TableFormat::Csv).unwrap();
        catalog.refresh_custom("Scores", &table, 25, None).unwrap();
        let before = catalog.collection("scores").unwrap().keys();

        catalog.refresh_custom("Scores", &table, 25, None).unwrap();
        let after = catalog.collection("SCORES").unwrap().keys();

        assert_eq!(after.len(), 2);
        assert!(before.iter().all(|pk| !after.contains(pk)));
        assert_eq!(catalog.names(), vec!["scores".to_string()]);
    }

    #[test]
    fn unknown_collection() {

        let catalog = Catalog::new();
        assert!(catalog.collection("nothing").unwrap_err().is_not_found());
        assert!(catalog.refresh_custom("chebi", &harvard(), 25, None).is_err());
    }
}
