use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Pressroom binary.
#[derive(Debug, Parser)]
#[command(name = "pressroom", version, about = "Pressroom blog front end")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRESSROOM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the site over HTTP.
    Serve(Box<ServeArgs>),
    /// Render every page once and write the site to a directory.
    Build(BuildArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Directory the rendered site is written to.
    #[arg(long = "out", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Maximum number of pages rendered concurrently.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(usize))]
    pub concurrency: usize,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreOverrides {
    /// Override the content store backend (sanity|fixture).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Override the content store project id.
    #[arg(long = "store-project-id", value_name = "ID")]
    pub project_id: Option<String>,

    /// Override the content store dataset.
    #[arg(long = "store-dataset", value_name = "NAME")]
    pub dataset: Option<String>,

    /// Override the fixture file used by the fixture backend.
    #[arg(long = "store-fixture-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub fixture_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the page revalidation window.
    #[arg(long = "pages-revalidate-seconds", value_name = "SECONDS")]
    pub revalidate_seconds: Option<u64>,

    /// Build every post page before accepting traffic.
    #[arg(
        long = "pages-prebuild",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub prebuild: Option<bool>,
}
