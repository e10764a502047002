use compound_db::resolver::Resolver;
use compound_db::store::MemoryStore;

use log::{debug, info};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Instant;


use clap::Parser;
#[derive(Parser, Debug)] #[command(author, version, about, long_about = None)]
struct Args {

    //Store snapshot to query
    snapshot: String,

    //Queries to time; random lookup keys when none are given
    queries: Vec<String>,

    //How many random lookup keys to time
    #[arg(short, long, default_value_t = 1000)]
    count: usize,
}

fn main() {

    env_logger::init();

    let args = Args::parse();
    debug!("{:?}", &args);
    let snapshot = args.snapshot;

    let start = Instant::now();
    let store = match MemoryStore::open_snapshot(&snapshot) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    info!("opened {} in {}", &snapshot, start.elapsed().as_secs_f64());

    let queries = match args.queries.is_empty() {
        true => random_keys(&store, args.count),
        false => args.queries,
    };

    let resolver = Resolver::new(store);
    single_queries(&resolver, &queries);
}

fn random_keys(store: &MemoryStore, n: usize) -> Vec<String> {

    let keys = store.lookup_keys();
    let mut rng = rand::thread_rng();

    return keys.choose_multiple(&mut rng, n).cloned().collect();
}

fn single_queries(resolver: &Resolver<MemoryStore>, queries: &[String]) {

    let mut hits = 0;
    let mut structures = 0;
    let total = Instant::now();

    for query in queries {

        let start = Instant::now();

        let result = resolver.resolve(query);

        let duration = start.elapsed();

        match result {
            Ok(resolved) => {
                hits += 1;
                if resolved.reordering.is_some() {
                    structures += 1;
                }
                info!("{:?} -> {}: {}", query, resolved.chebi, duration.as_secs_f64());
            }
            Err(e) => info!("{:?}: {} ({})", query, e, duration.as_secs_f64()),
        }
    }

    println!("queries: {}", queries.len());
    println!("resolved: {} ({} as structures)", hits, structures);
    println!("total seconds: {}", total.elapsed().as_secs_f64());
}
