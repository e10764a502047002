use compound_db::chebi::{ChebiLoader, LoadOutcome};
use compound_db::collection::{Catalog, Record};
use compound_db::config::ServiceConfig;
use compound_db::error::{Error, Result};
use compound_db::resolver::Resolver;
use compound_db::schema::{CustomSchema, Schema};
use compound_db::store::MemoryStore;
use compound_db::table::Table;

use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use log::{error, info, warn};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

pub struct AppState {
    pub config: ServiceConfig,
    pub resolver: Resolver<MemoryStore>,
    pub loader: ChebiLoader<MemoryStore>,
    pub catalog: Catalog,
}

impl AppState {

    pub fn new(config: ServiceConfig, store: Arc<MemoryStore>) -> Self {

        return Self {
            resolver: Resolver::new(store.clone()),
            loader: ChebiLoader::from_config(store, &config),
            catalog: Catalog::new(),
            config,
        };
    }
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(alias = "smiles")]
    query: String,
}

#[derive(Debug, Deserialize)]
struct RefreshBody {
    name: String,
    url: String,
    #[serde(default)]
    custom_schema: Option<CustomSchema>,
}

#[derive(Debug, Deserialize)]
struct ColumnsBody {
    url: String,
}

#[derive(Debug, Serialize)]
struct Message {
    message: String,
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {

    let (status, body) = match serde_json::to_vec(value) {
        Ok(body) => (status, body),
        Err(e) => {
            error!("Response serialization failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, br#"{"message":"Internal server error"}"#.to_vec())
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    return response;
}

fn message(status: StatusCode, text: &str) -> Response<Body> {
    json_response(status, &Message { message: text.to_string() })
}

fn not_found() -> Response<Body> {
    message(StatusCode::NOT_FOUND, "Item not found")
}

fn error_response(e: Error) -> Response<Body> {

    let status = match &e {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        Error::Schema(_) | Error::Table(_) | Error::Smiles(_) | Error::Config(_) | Error::UnsupportedLocation(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::Fetch { .. } => StatusCode::BAD_GATEWAY,
        Error::LockTimeout(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("{}", e);
    } else {
        info!("{}", e);
    }

    return message(status, &e.to_string());
}

fn respond<T: Serialize>(result: Result<T>) -> Response<Body> {

    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => error_response(e),
    }
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

fn parse_body<T: DeserializeOwned>(bytes: &Bytes) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Schema(format!("bad request body: {}", e)))
}

fn force_flag(query: &str) -> bool {

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .any(|(key, value)| key == "force" && (value == "true" || value == "1"))
}

/// Runs `f` on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) => Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))),
    }
}

pub async fn route(req: Request<Body>, state: Arc<AppState>) -> std::result::Result<Response<Body>, Infallible> {

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let segments: Vec<String> = path.split('/').filter(|s| !s.is_empty()).map(decode).collect();
    let parts: Vec<&str> = segments.iter().map(|s| s.as_str()).collect();

    info!("{} {}", method, path);

    let body = match method {
        Method::POST => match hyper::body::to_bytes(req.into_body()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Reading request body failed: {}", e);
                return Ok(message(StatusCode::BAD_REQUEST, "unreadable body"));
            }
        },
        _ => Bytes::new(),
    };

    let response = match (&method, parts.as_slice()) {
        (&Method::POST, ["chebi"]) => match parse_body::<QueryBody>(&body) {
            Ok(body) => resolve(state.clone(), body.query).await,
            Err(e) => error_response(e),
        },
        (&Method::POST, ["chebi", "load"]) => {
            let force = force_flag(&query);
            let state = state.clone();
            respond(blocking(move || state.loader.load(force)).await)
        }
        (&Method::POST, ["chebi", "flush"]) => {
            let state = state.clone();
            respond(blocking(move || state.loader.flush()).await.map(|_| json!({"status": "ok"})))
        }
        // structure terms may carry unescaped '/' bonds
        (&Method::GET, ["chebi", _, ..]) => {
            let term = decode(path.strip_prefix("/chebi/").unwrap_or(&path));
            resolve(state.clone(), term).await
        }
        (&Method::POST, ["refresh"]) => {
            let state = state.clone();
            respond(blocking(move || {
                let table = Table::fetch_remote(&state.config.chemblntd_url)?;
                state.catalog.refresh(Schema::chemblntd(), &table)
            }).await)
        }
        (&Method::POST, ["refresh", "custom"]) => match parse_body::<RefreshBody>(&body) {
            Ok(body) => {
                let state = state.clone();
                respond(blocking(move || {
                    let table = Table::fetch_remote(&body.url)?;
                    state.catalog.refresh_custom(&body.name, &table, state.config.sample_size, body.custom_schema.as_ref())
                }).await)
            }
            Err(e) => error_response(e),
        },
        (&Method::POST, ["columns"]) => match parse_body::<ColumnsBody>(&body) {
            Ok(body) => {
                let sample_size = state.config.sample_size;
                respond(blocking(move || Ok(Table::fetch_remote(&body.url)?.guess_schema(sample_size))).await)
            }
            Err(e) => error_response(e),
        },
        (&Method::GET, [name, "hash"]) => hashes(&state, name),
        (&Method::GET, [name, "hash", pk]) => record(&state, name, pk),
        (&Method::GET, [name, "search", field, value]) => search(&state, name, field, value),
        _ => not_found(),
    };

    return Ok(response);
}

async fn resolve(state: Arc<AppState>, term: String) -> Response<Body> {
    respond(blocking(move || state.resolver.resolve(&term)).await)
}

fn hashes(state: &AppState, name: &str) -> Response<Body> {

    let collection = match state.catalog.collection(name) {
        Ok(collection) => collection,
        Err(_) => return not_found(),
    };

    let mut body = BTreeMap::new();
    body.insert(collection.schema().name.clone(), json!("valid hashes"));
    body.insert("data".to_string(), json!(collection.keys()));
    return json_response(StatusCode::OK, &body);
}

fn record(state: &AppState, name: &str, pk: &str) -> Response<Body> {

    let collection = match state.catalog.collection(name) {
        Ok(collection) => collection,
        Err(_) => return not_found(),
    };

    match collection.get(pk) {
        Some(record) => json_response(StatusCode::OK, record),
        None => not_found(),
    }
}

fn search(state: &AppState, name: &str, field: &str, value: &str) -> Response<Body> {

    let collection = match state.catalog.collection(name) {
        Ok(collection) => collection,
        Err(_) => return not_found(),
    };

    let found: Result<Vec<&Record>> = collection.search(field, value);
    respond(found)
}

/// Opens the snapshot if there is one and runs the startup load when asked.
pub fn startup(config: &ServiceConfig) -> Result<Arc<AppState>> {

    let store = match &config.snapshot {
        Some(path) if std::path::Path::new(path).exists() => Arc::new(MemoryStore::open_snapshot(path)?),
        _ => Arc::new(MemoryStore::with_batch_size(config.batch_size)),
    };

    let state = Arc::new(AppState::new(config.clone(), store));

    if config.load_on_startup {
        match state.loader.load(false)? {
            LoadOutcome::Skipped => info!("ChEBI already loaded."),
            LoadOutcome::Loaded(counts) => info!("ChEBI loaded: {:?}", counts),
        }
    }

    return Ok(state);
}
