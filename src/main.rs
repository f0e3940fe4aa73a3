use std::{env, process, sync::Arc};

use clap::Parser;
use log::{error, info, LevelFilter};

mod args;
mod auth;
mod backend;
mod form;
mod routes;
mod templates;
mod time;
mod user;
mod webgis;
mod wms;

use args::Args;
use backend::Backend;
use webgis::WebGis;

#[tokio::main]
async fn main() {
    let mut logger = pretty_env_logger::formatted_timed_builder();
    logger.filter_level(LevelFilter::Info);
    if let Ok(filters) = env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    let args = Args::parse();

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("couldn't parse listen address: {e}");
            process::exit(2);
        }
    };

    let map = match args.map_config().validate() {
        Ok(map) => map,
        Err(e) => {
            error!("invalid map configuration: {e}");
            process::exit(2);
        }
    };

    let backend = Backend::new(args.users_file());
    info!("users stored in {:?}", backend.path());
    info!("showing layer {} from {}", map.layer, map.url);

    let webgis = Arc::new(WebGis::new(backend, map, args.secure()));
    let routes = routes::routes(webgis);

    info!("listening on http://{addr}");
    warp::serve(routes).run(addr).await;
}
