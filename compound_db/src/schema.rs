//! Record schemas decided once at ingestion time, and the registry that names
//! them.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::table::{Scalar, ScalarType, Table};

/// Names that collide with fixed routes.
pub const RESERVED_NAMES: [&str; 3] = ["chebi", "refresh", "columns"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ScalarType,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub full_text_search: bool,
}

impl FieldSpec {

    pub fn new(name: &str, ty: ScalarType) -> Self {
        Self { name: name.to_string(), ty, index: false, full_text_search: false }
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn full_text(mut self) -> Self {
        self.index = true;
        self.full_text_search = true;
        self
    }
}

/// Per-column overrides a client may send with a custom refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOverride {
    #[serde(rename = "type")]
    pub ty: ScalarType,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub full_text_search: bool,
}

pub type CustomSchema = BTreeMap<String, FieldOverride>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

pub fn normalize_name(name: &str) -> String {

    name.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

impl Schema {

    /// Field types guessed from the table, in column order, with `custom`
    /// applied on top. Override columns the table does not have are an error.
    pub fn guessed(name: &str, table: &Table, sample_size: usize, custom: Option<&CustomSchema>) -> Result<Self> {

        let guesses = table.guess_schema(sample_size);

        let mut fields: Vec<FieldSpec> = table
            .columns
            .iter()
            .map(|column| {
                let ty = guesses.get(column).copied().unwrap_or(ScalarType::Str);
                FieldSpec::new(column, ty)
            })
            .collect();

        if let Some(custom) = custom {
            for (column, over) in custom {
                let column = crate::table::clean_column_name(column);
                let field = fields
                    .iter_mut()
                    .find(|f| f.name == column)
                    .ok_or_else(|| Error::Schema(format!("custom schema names unknown column {:?}", column)))?;

                field.ty = over.ty;
                field.index = over.index || over.full_text_search;
                field.full_text_search = over.full_text_search;
            }
        }

        return Ok(Self { name: normalize_name(name), fields });
    }

    /// The ChEMBL-NTD Harvard liver set.
    pub fn chemblntd() -> Self {

        use ScalarType::*;

        let fields = vec![
            FieldSpec::new("numrow", Str),
            FieldSpec::new("sid", Str).indexed(),
            FieldSpec::new("cid", Str).indexed(),
            FieldSpec::new("bioassay_source", Str).indexed(),
            FieldSpec::new("rankscore", Int),
            FieldSpec::new("outcome", Str).indexed(),
            FieldSpec::new("depositdate", Str).indexed(),
            FieldSpec::new("luminescence_parasite_a", Int),
            FieldSpec::new("luminescence_parasite_b", Int),
            FieldSpec::new("luminescence_liver_a", Float),
            FieldSpec::new("luminescence_liver_b", Float),
            FieldSpec::new("parasite_pct_control_a_pct", Float),
            FieldSpec::new("parasite_pct_control_b_pct", Float),
            FieldSpec::new("liver_pct_control_a_pct", Float),
            FieldSpec::new("liver_pct_control_b_pct", Float),
            FieldSpec::new("activity_parasite_a_pct", Float),
            FieldSpec::new("activity_parasite_b_pct", Float),
            FieldSpec::new("sid_smiles", Str).full_text(),
            FieldSpec::new("pubchem_substance_synonym", Str),
        ];

        return Self { name: "chemblntd".to_string(), fields };
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Table column position of every field. Fields the table lacks are an
    /// error.
    pub fn column_map(&self, table: &Table) -> Result<Vec<usize>> {

        self.fields
            .iter()
            .map(|field| {
                table
                    .column_index(&field.name)
                    .ok_or_else(|| Error::Schema(format!("table has no column {:?} for schema {}", field.name, self.name)))
            })
            .collect()
    }

    /// Coerces one table row to typed values, in field order.
    pub fn validate_row(&self, row: &[String], columns: &[usize]) -> Result<Vec<(String, Scalar)>> {

        let mut values = Vec::with_capacity(self.fields.len());

        for (field, &column) in self.fields.iter().zip(columns) {
            let cell = row.get(column).map(|c| c.as_str()).unwrap_or("");
            let value = field
                .ty
                .parse(cell)
                .ok_or_else(|| Error::Schema(format!("{:?} is not a valid {} for {}", cell, field.ty, field.name)))?;
            values.push((field.name.clone(), value));
        }

        return Ok(values);
    }
}

/// Named schemas known to the ingestion side.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {

    pub fn new() -> Self {
        Self::default()
    }

    /// Registers under the normalized name, replacing any earlier schema.
    pub fn register(&mut self, mut schema: Schema) -> Result<String> {

        let name = normalize_name(&schema.name);
        if name.is_empty() {
            return Err(Error::Schema("schema name is empty".to_string()));
        }
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(Error::Schema(format!("{:?} is a reserved name", name)));
        }

        schema.name = name.clone();
        if self.schemas.insert(name.clone(), schema).is_some() {
            warn!("Replacing schema {}", name);
        }
        return Ok(name);
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(&normalize_name(name))
    }

    pub fn names(&self) -> Vec<String> {

        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        return names;
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::table::TableFormat;

    fn table() -> Table {
        Table::parse(b"Sample Id,Mass (g),Active\nx1,1.5,true\nx2,2,false\n", TableFormat::Csv).unwrap()
    }

    #[test]
    fn guessed_schema_follows_columns() {

        let schema = Schema::guessed("My Assay", &table(), 25, None).unwrap();
        assert_eq!(schema.name, "myassay");

        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["sample_id", "mass_g", "active"]);
        assert_eq!(schema.field("mass_g").unwrap().ty, ScalarType::Float);
        assert!(!schema.field("sample_id").unwrap().index);
    }

    #[test]
    fn custom_overrides_guess() {

        let custom: CustomSchema = serde_json::from_value(serde_json::json!({
            "sample_id": {"type": "str", "index": true},
            "mass_g": {"type": "str", "full_text_search": true},
        }))
        .unwrap();

        let schema = Schema::guessed("assay", &table(), 25, Some(&custom)).unwrap();
        assert!(schema.field("sample_id").unwrap().index);
        let mass = schema.field("mass_g").unwrap();
        assert_eq!(mass.ty, ScalarType::Str);
        assert!(mass.index && mass.full_text_search);

        let mut bad = CustomSchema::new();
        bad.insert("nope".to_string(), FieldOverride { ty: ScalarType::Int, index: false, full_text_search: false });
        assert!(matches!(Schema::guessed("assay", &table(), 25, Some(&bad)), Err(Error::Schema(_))));
    }

    #[test]
    fn chemblntd_fields() {

        let schema = Schema::chemblntd();
        assert_eq!(schema.fields.len(), 19);

        let indexed: Vec<&str> = schema.fields.iter().filter(|f| f.index).map(|f| f.name.as_str()).collect();
        assert_eq!(indexed, vec!["sid", "cid", "bioassay_source", "outcome", "depositdate", "sid_smiles"]);
        assert!(schema.field("sid_smiles").unwrap().full_text_search);
        assert_eq!(schema.field("rankscore").unwrap().ty, ScalarType::Int);
    }

    #[test]
    fn row_validation() {

        let table = table();
        let schema = Schema::guessed("assay", &table, 25, None).unwrap();
        let columns = schema.column_map(&table).unwrap();

        let row = schema.validate_row(&table.rows[0], &columns).unwrap();
        assert_eq!(row[1], ("mass_g".to_string(), Scalar::Float(1.5)));

        let bad = vec!["x3".to_string(), "heavy".to_string(), "true".to_string()];
        assert!(schema.validate_row(&bad, &columns).is_err());

        assert!(Schema::chemblntd().column_map(&table).is_err());
    }

    #[test]
    fn registry_names() {

        let mut registry = SchemaRegistry::new();
        let mut schema = Schema::chemblntd();
        schema.name = " ChEMBL NTD ".to_string();
        assert_eq!(registry.register(schema).unwrap(), "chemblntd");
        assert!(registry.get("ChemblNTD").is_some());

        let mut reserved = Schema::chemblntd();
        reserved.name = "Refresh".to_string();
        assert!(registry.register(reserved).is_err());

        assert_eq!(registry.names(), vec!["chemblntd".to_string()]);
    }
}
