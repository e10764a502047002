use compound_db::chebi::{ChebiLoader, LoadOutcome};
use compound_db::config::ServiceConfig;
use compound_db::data::ChebiArchive;
use compound_db::error::{Error, Result};
use compound_db::store::{MemoryStore, TwoLevelStore};
use compound_db::table::Table;

use kdam::tqdm;
use glob::glob;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;


use clap::Parser;
#[derive(Parser, Debug)] #[command(author, version, about, long_about = None)]
struct Args {

    //Which task to carry out: chebi, verify or columns
    #[arg(short, long)]
    task: String,

    //Archive location for chebi and verify, glob of table files for columns
    #[arg(short, long)]
    input: Option<String>,

    //Snapshot filename written by chebi, read by verify when no input is given
    #[arg(short, long)]
    output: Option<String>,

    //YAML service config supplying defaults
    #[arg(short, long)]
    config: Option<String>,

    //Rows sampled per table for columns
    #[arg(short, long)]
    sample_size: Option<usize>,
}

fn main() {

    env_logger::init();

    let args = Args::parse();
    debug!("{:?}", &args);

    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {

    match args.task.as_str() {
        "chebi" => build_chebi(args),
        "verify" => verify(args),
        "columns" => columns(args),
        _ => Err(Error::Config(format!("Unknown task: {}", args.task))),
    }
}

fn config(args: &Args) -> Result<ServiceConfig> {

    match &args.config {
        Some(filename) => ServiceConfig::from_file(filename),
        None => Ok(ServiceConfig::default()),
    }
}

/// Downloads the archive and writes it out as a store snapshot.
fn build_chebi(args: &Args) -> Result<()> {

    let mut config = config(args)?;
    if let Some(input) = &args.input {
        config.chebi_url = input.clone();
    }
    let output = args
        .output
        .clone()
        .or_else(|| config.snapshot.clone())
        .ok_or_else(|| Error::Config("no output snapshot given".to_string()))?;

    let store = Arc::new(MemoryStore::with_batch_size(config.batch_size));
    let loader = ChebiLoader::from_config(store, &config).with_snapshot(PathBuf::from(&output));

    match loader.load(true)? {
        LoadOutcome::Loaded(counts) => info!("Wrote {} with {:?}", output, counts),
        LoadOutcome::Skipped => info!("Nothing written"),
    }
    return Ok(());
}

/// Checks that every lookup entry points at a data entry.
fn verify(args: &Args) -> Result<()> {

    let archive = match (&args.input, &args.output) {
        (Some(input), _) => {
            let loader = ChebiLoader::new(Arc::new(MemoryStore::new()), input);
            loader.download_data()?
        }
        (None, Some(snapshot)) => {
            let store = MemoryStore::open_snapshot(snapshot)?;
            let mut archive = ChebiArchive::default();
            for key in tqdm!(store.lookup_keys().into_iter()) {
                if let Some(id) = store.get_identifier(&key)? {
                    if let Some(record) = store.get_record(&id)? {
                        archive.data.insert(id.clone(), record);
                    }
                    archive.lookup.insert(key, id);
                }
            }
            archive
        }
        (None, None) => return Err(Error::Config("verify needs --input or --output".to_string())),
    };

    let dangling = archive.dangling();
    for (key, id) in dangling.iter().take(20) {
        warn!("{:?} -> {} has no data entry", key, id);
    }

    println!("lookup entries: {}", archive.lookup.len());
    println!("data entries: {}", archive.data.len());
    println!("dangling: {}", dangling.len());

    if !dangling.is_empty() {
        return Err(Error::NotFound(format!("{} dangling lookup entries", dangling.len())));
    }
    return Ok(());
}

/// Prints the guessed column types of every matching table file as YAML.
fn columns(args: &Args) -> Result<()> {

    let config = config(args)?;
    let sample_size = args.sample_size.unwrap_or(config.sample_size);
    let pattern = args
        .input
        .clone()
        .ok_or_else(|| Error::Config("columns needs --input".to_string()))?;

    let paths = glob(&pattern).map_err(|e| Error::Config(e.to_string()))?;

    let mut schemas: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for path in paths {
        let path = match path {
            Ok(path) => path,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        let location = path.to_string_lossy().into_owned();

        let table = Table::fetch(&location)?;
        let guessed = table
            .guess_schema(sample_size)
            .into_iter()
            .map(|(column, ty)| (column, ty.to_string()))
            .collect();
        schemas.insert(location, guessed);
    }

    print!("{}", serde_yaml::to_string(&schemas)?);
    return Ok(());
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn task_is_required() {

        let args = Args::try_parse_from(["builder", "--task", "columns", "--input", "*.csv", "--sample-size", "10"]).unwrap();
        assert_eq!(args.task, "columns");
        assert_eq!(args.sample_size, Some(10));

        assert!(Args::try_parse_from(["builder", "--input", "chebi.msgpack.gz"]).is_err());
    }

    #[test]
    fn unknown_task_is_a_config_error() {

        let args = Args::try_parse_from(["builder", "--task", "nonsense"]).unwrap();
        assert!(matches!(run(&args), Err(Error::Config(_))));

        let args = Args::try_parse_from(["builder", "--task", "verify"]).unwrap();
        assert!(matches!(run(&args), Err(Error::Config(_))));
    }
}
