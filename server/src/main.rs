mod routes;

use compound_db::config::ServiceConfig;

use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::service::{make_service_fn, service_fn};
use hyper::server::Server;
use log::info;

use clap::Parser;
#[derive(Parser, Debug)] #[command(author, version, about, long_about = None)]
struct Args {

    //YAML service config, defaults used when absent
    #[arg(short, long)]
    config: Option<String>,

    //Overrides the configured host
    #[arg(long)]
    host: Option<String>,

    //Overrides the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {

    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(filename) => ServiceConfig::from_file(filename)?,
        None => ServiceConfig::default(),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let addr: SocketAddr = config.address().parse()?;

    // snapshot reads and the startup load block
    let state = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || routes::startup(&config)).await??
    };

    // For every connection, we must make a `Service` to handle all
    // incoming HTTP requests on said connection.
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(service_fn( move |req| {
            let state = state.clone();
            routes::route(req, state)
        }
            ))}
    });

    let server = Server::bind(&addr).serve(make_svc);

    info!("Listening on http://{}", addr);

    server.await?;

    Ok(())
}
