mod config;
mod controller;
mod error;
mod image;
mod pipelines;
mod processor;
mod response;
mod routes;
mod storage;
mod utils;


#[macro_use]
extern crate tracing;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use poem::listener::TcpListener;
use poem::endpoint::StaticFilesEndpoint;
use poem::middleware::{SizeLimit, Tracing};
use poem::{EndpointExt, Route, Server};
use poem_openapi::OpenApiService;
use tokio::sync::Semaphore;
use tracing::level_filters::LevelFilter;

use crate::pipelines::OutputLimits;
use crate::storage::backends::BackendConfigs;

pub use self::controller::{ControllerOptions, TransformController};
pub use self::storage::StorageBackend;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct ServerConfig {
    #[clap(long, env, default_value = "127.0.0.1")]
    /// The binding host address of the server.
    host: String,

    #[clap(long, env, default_value = "8000")]
    port: u16,

    #[clap(long, env)]
    /// The external URL that would be used to access the server if applicable.
    ///
    /// This only affects the documentation.
    base_url: Option<String>,

    #[clap(long, env, default_value = "config.yaml")]
    /// The file path to a given config file.
    ///
    /// This can be either a JSON formatted config or YAML.
    config_file: PathBuf,

    #[clap(long, env, default_value = "info")]
    /// The maximum level logs are emitted at.
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: ServerConfig = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    if let Err(e) = config::init(&args.config_file).await {
        error!("Failed to load config file {:?}: {:#}", &args.config_file, e);
        return Err(e);
    }

    let storage = config::config().backend.connect().await?;
    let controller = Arc::new(build_controller(storage));

    let bind = SocketAddr::new(args.host.parse()?, args.port);
    let base_url = args
        .base_url
        .unwrap_or_else(|| format!("http://{}", bind));

    let api_service = OpenApiService::new(
        routes::ImageToolsApi::new(controller),
        "Image Tools API",
        env!("CARGO_PKG_VERSION"),
    )
    .description(
        "Resize, compress, convert and generate icon sets from uploaded images. \
        Every artifact is published to the configured object storage.",
    )
    .server(format!("{}/api", base_url));

    let ui = api_service.redoc();
    let spec = api_service.spec_endpoint();

    let app = Route::new()
        .nest("/api", api_service)
        .nest("/ui", ui)
        .at("/spec", spec);

    let app = serve_files(app, &config::config().backend)
        .with(SizeLimit::new(config::config().max_upload_size))
        .with(Tracing);

    info!("Image tools listening on {}, docs available at {}/ui", bind, base_url);
    Server::new(TcpListener::bind(bind)).run(app).await?;

    Ok(())
}

/// Serves the filesystem backend's directory at `/files` so its signed URLs resolve.
///
/// Remote backends serve their own objects.
pub fn serve_files(app: Route, backend: &BackendConfigs) -> Route {
    match backend {
        BackendConfigs::FileSystem { directory, .. } => {
            app.nest("/files", StaticFilesEndpoint::new(directory.clone()))
        },
        BackendConfigs::BlobStorage { .. } => app,
    }
}

/// Builds the controller from the loaded runtime config.
pub fn build_controller(storage: Arc<dyn StorageBackend>) -> TransformController {
    let cfg = config::config();

    let global_limiter = cfg
        .max_concurrency
        .map(Semaphore::new)
        .map(Arc::new);

    TransformController::new(
        ControllerOptions {
            default_quality: cfg.default_quality,
            unique_keys: cfg.unique_keys,
            limits: OutputLimits {
                max_dimension: cfg.max_output_dimension,
                max_pixels: cfg.max_output_pixels,
            },
        },
        storage,
        global_limiter,
    )
}
