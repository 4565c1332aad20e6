//! Main entry point for CLI command to start server.

use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::axum_factory;
use crate::configuration::Configuration;
use crate::configuration::generate_config_schema;
use crate::service::GraphQLService;
use crate::spec::Schema;

/// Options for the kennel server
#[derive(Parser, Debug)]
#[command(name = "kennel", about = "GraphQL server for owners and their pets")]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace).
    #[arg(
        long = "log",
        default_value = "info",
        alias = "log-level",
        env = "KENNEL_LOG"
    )]
    log_level: String,

    /// Configuration file location.
    #[arg(short, long = "config", env = "KENNEL_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Overrides `server.listen` from the configuration.
    #[arg(long, env = "KENNEL_LISTEN")]
    listen: Option<SocketAddr>,

    /// Prints the configuration schema.
    #[arg(long)]
    schema: bool,

    /// Prints the GraphQL schema.
    #[arg(long)]
    sdl: bool,

    /// Display version and exit.
    #[arg(long, short = 'V')]
    version: bool,
}

/// This is the main kennel entrypoint.
pub fn main() -> Result<()> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(nb) = std::env::var("KENNEL_NUM_CORES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
    {
        builder.worker_threads(nb);
    }
    let runtime = builder.build()?;
    runtime.block_on(Executable::builder().start())
}

/// Entry point into creating a kennel executable.
pub struct Executable {}

#[buildstructor::buildstructor]
impl Executable {
    /// Parses the command line, sets up logging and serves until Ctrl-C.
    ///
    /// A `configuration` given here replaces the `--config` file.
    /// Note that if you do not specify a runtime you must be in the context of an existing tokio runtime.
    #[builder(entry = "builder", exit = "start")]
    pub async fn start(configuration: Option<Configuration>) -> Result<()> {
        let opt = Opt::parse();

        if opt.version {
            println!("{}", std::env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        if opt.schema {
            let schema = generate_config_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }

        if opt.sdl {
            print!("{}", Schema::owners_and_pets()?.to_sdl());
            return Ok(());
        }

        let builder = tracing_subscriber::fmt::fmt().with_env_filter(
            EnvFilter::try_new(&opt.log_level).context("could not parse log configuration")?,
        );
        let initialized = if std::io::stdout().is_terminal() {
            builder.try_init()
        } else {
            builder.json().try_init()
        };
        initialized.map_err(|error| anyhow::anyhow!(error))?;
        setup_panic_handler();

        let mut configuration = match (configuration, opt.config_path) {
            (Some(configuration), _) => configuration,
            (None, Some(path)) => {
                let path = if path.is_relative() {
                    std::env::current_dir()?.join(path)
                } else {
                    path
                };
                tracing::debug!("loading configuration from {}", path.display());
                Configuration::from_file(&path)?
            }
            (None, None) => Configuration::default(),
        };
        if let Some(listen) = opt.listen {
            configuration.server.listen = listen;
        }

        tracing::info!("Kennel v{}", std::env!("CARGO_PKG_VERSION"));
        let service = Arc::new(GraphQLService::from_configuration(&configuration)?);
        if let Err(error) = axum_factory::serve(&configuration, service).await {
            tracing::error!("{}", error);
            return Err(error.into());
        }
        Ok(())
    }
}

fn setup_panic_handler() {
    // Redirect panics to the logs.
    std::panic::set_hook(Box::new(|panic_info| tracing::error!("{}", panic_info)));
}
