//! Delimited text tables, typed scalars and column type guessing.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use log::debug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int,
    Float,
    Str,
    Bool,
}

impl fmt::Display for ScalarType {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Str => "str",
            ScalarType::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Scalar {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => write!(f, "{}", s),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl ScalarType {

    /// Value an empty cell takes.
    pub fn fill(&self) -> Scalar {

        match self {
            ScalarType::Int => Scalar::Int(0),
            ScalarType::Float => Scalar::Float(0.0),
            ScalarType::Str => Scalar::Str(String::new()),
            ScalarType::Bool => Scalar::Bool(false),
        }
    }

    /// Coerces one cell. Empty cells take the fill value.
    pub fn parse(&self, cell: &str) -> Option<Scalar> {

        let cell = cell.trim();
        if cell.is_empty() {
            return Some(self.fill());
        }

        match self {
            ScalarType::Int => {
                if let Ok(i) = cell.parse::<i64>() {
                    return Some(Scalar::Int(i));
                }
                match cell.parse::<f64>() {
                    Ok(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Some(Scalar::Int(x as i64)),
                    _ => None,
                }
            }
            ScalarType::Float => cell.parse::<f64>().ok().map(Scalar::Float),
            ScalarType::Bool => match cell.to_lowercase().as_str() {
                "true" => Some(Scalar::Bool(true)),
                "false" => Some(Scalar::Bool(false)),
                _ => None,
            },
            ScalarType::Str => Some(Scalar::Str(cell.to_string())),
        }
    }
}

pub fn is_float(s: &str) -> bool {
    s.trim().parse::<f64>().is_ok()
}

/// A float with no fractional part, so "3" and "3.0" both count.
pub fn is_int(s: &str) -> bool {

    match s.trim().parse::<f64>() {
        Ok(x) => x.is_finite() && x.fract() == 0.0,
        Err(_) => false,
    }
}

pub fn is_bool(s: &str) -> bool {

    let lower = s.trim().to_lowercase();
    return lower == "true" || lower == "false";
}

pub fn clean_column_name(name: &str) -> String {

    name.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(&['(', ')'][..], "")
        .replace('%', "pct")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
}

impl TableFormat {

    pub fn from_location(location: &str) -> Self {

        let name = source::file_name(location).to_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);

        if name.ends_with(".tsv") || name.ends_with(".txt") {
            return TableFormat::Tsv;
        }
        return TableFormat::Csv;
    }

    fn delimiter(&self) -> u8 {

        match self {
            TableFormat::Csv => b',',
            TableFormat::Tsv => b'\t',
        }
    }
}

/// Decodes table bytes to text. A byte order mark wins, then valid UTF-8 is
/// taken as is, and anything else goes through charset detection.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {

    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return text;
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    debug!("Table is not UTF-8, decoding as {}", encoding.name());

    let (text, _) = encoding.decode_without_bom_handling(bytes);
    return text;
}

/// A header row plus string cells, all rows padded or cut to the header width.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {

    pub fn parse(bytes: &[u8], format: TableFormat) -> Result<Self> {

        let text = decode_text(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(clean_column_name)
            .collect();

        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(Error::Table("table has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        return Ok(Self { columns, rows });
    }

    /// Fetches and parses a table, picking the delimiter from the file name.
    pub fn fetch(location: &str) -> Result<Self> {

        let bytes = source::decompress(&source::fetch(location)?)?;
        Self::parse(&bytes, TableFormat::from_location(location))
    }

    /// [`Table::fetch`] restricted to http(s) locations.
    pub fn fetch_remote(location: &str) -> Result<Self> {

        let bytes = source::decompress(&source::fetch_remote(location)?)?;
        Self::parse(&bytes, TableFormat::from_location(location))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Guesses a type per column from the first `sample_size` rows.
    pub fn guess_schema(&self, sample_size: usize) -> BTreeMap<String, ScalarType> {

        let sample = &self.rows[..self.rows.len().min(sample_size)];
        let mut schema = BTreeMap::new();

        for (i, column) in self.columns.iter().enumerate() {
            let values: Vec<&str> = sample
                .iter()
                .map(|row| row[i].trim())
                .filter(|v| !v.is_empty())
                .collect();

            let ty = if values.is_empty() {
                ScalarType::Str
            } else if values.iter().all(|v| is_int(v)) {
                ScalarType::Int
            } else if values.iter().all(|v| is_float(v)) {
                ScalarType::Float
            } else if values.iter().all(|v| is_bool(v)) {
                ScalarType::Bool
            } else {
                ScalarType::Str
            };

            schema.insert(column.clone(), ty);
        }

        return schema;
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    const HARVARD: &str = "\
NUMROW,SID,CID,Bioassay Source,RankScore,Outcome,Liver (% Control A %),Active
1,144203552,5280343,Harvard,33,Inactive,12.5,true
2,144203553,,Harvard,40,Active,7,FALSE
3,144203554,2244.0,\"Harvard, Broad\",12,Inactive,,true
";

    #[test]
    fn column_names_are_cleaned() {

        assert_eq!(clean_column_name(" Bioassay Source "), "bioassay_source");
        assert_eq!(clean_column_name("Liver (% Control A %)"), "liver_pct_control_a_pct");
    }

    #[test]
    fn value_checks() {

        assert!(is_int("1"));
        assert!(is_int("1.0"));
        assert!(!is_int("1.5"));
        assert!(is_float("1.5"));
        assert!(!is_float("one"));
        assert!(is_bool("True"));
        assert!(!is_bool("1"));
    }

    #[test]
    fn parse_csv_with_quotes() {

        let table = Table::parse(HARVARD.as_bytes(), TableFormat::Csv).unwrap();
        assert_eq!(table.columns[3], "bioassay_source");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[2][3], "Harvard, Broad");
    }

    #[test]
    fn latin1_table_decodes() {

        let bytes = b"Name,Note\nCaf\xe9ine,d\xe9j\xe0 vu pour le th\xe9\nA\xefoli,pr\xe9f\xe9r\xe9 \xe0 l'\xe9t\xe9\n";
        assert!(std::str::from_utf8(bytes).is_err());

        let table = Table::parse(bytes, TableFormat::Csv).unwrap();
        assert_eq!(table.rows[0][0], "Caf\u{e9}ine");
        assert!(table.rows.iter().flatten().all(|cell| !cell.contains('\u{fffd}')));
    }

    #[test]
    fn utf8_byte_order_mark_is_dropped() {

        let table = Table::parse("\u{feff}SID,Name\n1,Caf\u{e9}ine\n".as_bytes(), TableFormat::Csv).unwrap();
        assert_eq!(table.columns, vec!["sid", "name"]);
        assert_eq!(table.rows[0][1], "Caf\u{e9}ine");
    }

    #[test]
    fn guessed_types() {

        let table = Table::parse(HARVARD.as_bytes(), TableFormat::Csv).unwrap();
        let schema = table.guess_schema(25);
        dbg!(&schema);

        assert_eq!(schema["numrow"], ScalarType::Int);
        assert_eq!(schema["cid"], ScalarType::Int);
        assert_eq!(schema["bioassay_source"], ScalarType::Str);
        assert_eq!(schema["liver_pct_control_a_pct"], ScalarType::Float);
        assert_eq!(schema["active"], ScalarType::Bool);
    }

    #[test]
    fn sample_size_limits_guess() {

        let table = Table::parse(b"a\n1\n2\nx\n", TableFormat::Csv).unwrap();
        assert_eq!(table.guess_schema(2)["a"], ScalarType::Int);
        assert_eq!(table.guess_schema(3)["a"], ScalarType::Str);
    }

    #[test]
    fn empty_column_is_str() {

        let table = Table::parse(b"a,b\n1,\n2,\n", TableFormat::Csv).unwrap();
        assert_eq!(table.guess_schema(25)["b"], ScalarType::Str);
    }

    #[test]
    fn tsv_by_extension() {

        assert_eq!(TableFormat::from_location("https://host/set7.tsv"), TableFormat::Tsv);
        assert_eq!(TableFormat::from_location("/tmp/set7.TXT"), TableFormat::Tsv);
        assert_eq!(TableFormat::from_location("/tmp/Harvard_ALL.csv"), TableFormat::Csv);

        let table = Table::parse(b"a b\tc\n1\t2\n", TableFormat::Tsv).unwrap();
        assert_eq!(table.columns, vec!["a_b".to_string(), "c".to_string()]);
    }

    #[test]
    fn fill_and_coerce() {

        assert_eq!(ScalarType::Int.parse(""), Some(Scalar::Int(0)));
        assert_eq!(ScalarType::Int.parse("2244.0"), Some(Scalar::Int(2244)));
        assert_eq!(ScalarType::Int.parse("2244.5"), None);
        assert_eq!(ScalarType::Float.parse(" "), Some(Scalar::Float(0.0)));
        assert_eq!(ScalarType::Bool.parse("FALSE"), Some(Scalar::Bool(false)));
        assert_eq!(ScalarType::Bool.parse("no"), None);
        assert_eq!(ScalarType::Str.parse(""), Some(Scalar::Str(String::new())));
    }

    #[test]
    fn short_rows_are_padded() {

        let table = Table::parse(b"a,b,c\n1\n", TableFormat::Csv).unwrap();
        assert_eq!(table.rows[0], vec!["1".to_string(), String::new(), String::new()]);
    }
}
