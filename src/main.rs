use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use proxy_supervisor::config::{ConfigProvider, ConfigSources, FileConfigProvider, LogConfig};
use proxy_supervisor::config::watcher::ConfigWatcher;
use proxy_supervisor::lifecycle::{signal_queue, Exit, SignalListener, Supervisor, SupervisorOptions};
use proxy_supervisor::observability;
use proxy_supervisor::service::HttpServiceFactory;

#[derive(Parser)]
#[command(name = "proxy-supervisor")]
#[command(about = "Supervised, reloadable HTTP service", long_about = None)]
struct Cli {
    /// Configuration file path, or "stdin" (repeatable)
    #[arg(short = 'c', long = "config", global = true)]
    config: Vec<PathBuf>,

    /// Directory of configuration files (repeatable)
    #[arg(short = 'C', long = "config-directory", global = true)]
    config_directory: Vec<PathBuf>,

    /// Include sub-directories of configuration directories
    #[arg(long, global = true)]
    recursive: bool,

    /// Disable color output
    #[arg(short = 'D', long, global = true)]
    disable_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run service
    Run(RunArgs),
    /// Check configuration
    Check,
    /// Print version
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Reload when configuration files change
    #[arg(long)]
    watch: bool,

    /// Seconds an instance may take to stop before the process is killed
    #[arg(long, default_value_t = 3)]
    shutdown_timeout: u64,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

impl Cli {
    fn sources(&self) -> ConfigSources {
        let mut paths = self.config.clone();
        if paths.is_empty() && self.config_directory.is_empty() {
            paths.push(PathBuf::from("config.toml"));
        }
        ConfigSources {
            paths,
            directories: self.config_directory.clone(),
            recursive: self.recursive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let provider = FileConfigProvider::new(cli.sources()).with_disable_color(cli.disable_color);

    let args = match cli.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Check => {
            let config = provider.acquire();
            init_logging(config.as_ref().ok().map(|c| &c.log), cli.disable_color);
            let checked = config.and_then(|config| provider.validate(&config));
            if let Err(e) = checked {
                tracing::error!(error = %e, "Configuration check failed");
                return Err(e.into());
            }
            tracing::info!("Configuration is valid");
            return Ok(());
        }
        Commands::Run(args) => args,
    };

    let config = provider.acquire();
    init_logging(config.as_ref().ok().map(|c| &c.log), cli.disable_color);
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        "proxy-supervisor starting"
    );

    if let Some(addr) = args.metrics_address {
        observability::metrics::init_metrics(addr)?;
    }

    let (sender, receiver) = signal_queue();
    let _listener = SignalListener::spawn(sender.clone())?;
    let _watcher = if args.watch {
        Some(ConfigWatcher::new(provider.sources().watch_targets(), sender.clone()).run()?)
    } else {
        None
    };

    let options = SupervisorOptions {
        shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
    };
    let supervisor = Supervisor::new(provider, HttpServiceFactory, receiver, options)
        .with_initial_config(config);

    match supervisor.run_forever().await {
        Ok(Exit::Terminated) => {
            tracing::info!("Shutdown complete");
            Ok(())
        }
        Err(e) if e.is_fatal_fault() => {
            tracing::error!(error = %e, "Service did not close, exiting");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "Supervisor failed");
            Err(e.into())
        }
    }
}

fn init_logging(config: Option<&LogConfig>, disable_color: bool) {
    let mut log = config.cloned().unwrap_or_default();
    log.disable_color |= disable_color;
    observability::logging::init(&log);
}
