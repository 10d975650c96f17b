//! JP2 Streamer - An image server for JPEG 2000 collections.
//!
//! This binary starts the HTTP server and provides the `info` and `pyramid`
//! inspection commands.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jp2_streamer::{
    config::{Cli, Command, InfoConfig, PyramidConfig, PyramidOutputFormat, ServeConfig},
    format::extract_from_path,
    plan::tiles,
    server::{create_router, RouterConfig},
    source::{FsImageSource, ImageRegistry},
    tile::{DerivativeService, OpenJpegBackend},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Info(config) => run_info(config),
        Command::Pyramid(config) => run_pyramid(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    if !config.image_root.is_dir() {
        error!(
            "Image root {} is not a directory",
            config.image_root.display()
        );
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.cache_dir).await {
        error!(
            "Failed to create cache directory {}: {}",
            config.cache_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        image_root = %config.image_root.display(),
        cache_dir = %config.cache_dir.display(),
        cache_tiles = config.cache_tiles,
        cache_images = config.cache_images,
        tile_size = config.tile_size,
        jpeg_quality = config.jpeg_quality,
        "starting JP2 Streamer"
    );

    let source = FsImageSource::new(&config.image_root);
    let registry = ImageRegistry::with_capacity(source, config.cache_images);
    let codec = OpenJpegBackend::with_quality(config.jpeg_quality);

    let service = DerivativeService::with_shared_registry(
        Arc::new(registry),
        Arc::new(codec),
        &config.cache_dir,
        config.cache_tiles,
    );

    let router = create_router(service, build_router_config(&config));

    let addr = config.bind_address();

    info!("listening on http://{}", addr);
    info!(
        "metadata: http://{}/resolver?rft_id=<identifier>&svc_id=info:lanl-repo/svc/getMetadata",
        addr
    );
    info!("iiif:     http://{}/iiif/<identifier>/info.json", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "jp2_streamer=debug,tower_http=debug"
    } else {
        "jp2_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tile_size(config.tile_size)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> ExitCode {
    let descriptor = match extract_from_path(&config.file) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            eprintln!("Error: {}: {}", config.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if config.json {
        return match serde_json::to_string_pretty(&descriptor) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    println!("{}", config.file.display());
    println!("  Format:             {}", descriptor.source_format.name());
    println!("  Size:               {} x {}", descriptor.width, descriptor.height);
    println!("  DWT levels:         {}", descriptor.resolution_levels);
    println!("  Derivable levels:   {}", descriptor.derivable_levels);
    println!("  Quality layers:     {}", descriptor.quality_layers);
    println!("  Compositing layers: {}", descriptor.compositing_layer_count);
    println!(
        "  Components:         {} x {} bit",
        descriptor.channel_count, descriptor.bit_depth
    );
    println!("  Deep-zoom levels:   {}", descriptor.max_level() + 1);
    if !descriptor.embedded_xml_documents.is_empty() {
        println!(
            "  XML boxes:          {}",
            descriptor.embedded_xml_documents.len()
        );
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Pyramid Command
// =============================================================================

fn run_pyramid(config: PyramidConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let descriptor = match extract_from_path(&config.file) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            eprintln!("Error: {}: {}", config.file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let queries = tiles(descriptor.width, descriptor.height, config.tile_size);

    match config.format {
        PyramidOutputFormat::Text => {
            for query in queries {
                println!("{:>3} {:>6} {}", query.level, query.scale, query.region);
            }
        }
        PyramidOutputFormat::Query => {
            for query in queries {
                println!("{}", query.to_query_string());
            }
        }
        PyramidOutputFormat::Json => {
            let all: Vec<_> = queries.collect();
            match serde_json::to_string_pretty(&all) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
