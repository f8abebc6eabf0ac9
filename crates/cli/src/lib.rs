use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use storage::{ConfigStore, ViewerConfig};
use sync_client::HttpPageCounter;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use viewer_core::{DeviceClass, SetPageRequest};

pub mod canvas;
pub mod input;
pub mod prompt;
mod session;

#[cfg(test)]
mod test_pdf;

pub use session::{run_view, DesyncPolicy, ViewOptions};

#[derive(Debug, Parser)]
#[command(name = "pagesync")]
#[command(about = "Read a shared PDF in step with everyone else viewing it")]
pub struct Cli {
    /// Config file to use instead of the per-user one.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a document and navigate it from the terminal.
    View {
        #[arg(value_name = "DOCUMENT")]
        document: String,
        /// Open at this page instead of the server's page.
        #[arg(long)]
        page: Option<u32>,
        /// What to do when the server is on another page.
        #[arg(long, value_enum, default_value_t = DesyncPolicy::Ask)]
        on_desync: DesyncPolicy,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the page the server holds for a document.
    Status {
        #[arg(value_name = "DOCUMENT")]
        document: String,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Write the server's page counter.
    SetPage {
        #[arg(value_name = "DOCUMENT")]
        document: String,
        #[arg(value_name = "PAGE")]
        page: u32,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Write a config file with the defaults and any given flags.
    InitConfig {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print CLI version.
    Version,
}

/// Flags that take precedence over the config file.
#[derive(Debug, Default, Args)]
struct Overrides {
    /// Base URL of the page server.
    #[arg(long)]
    server: Option<String>,
    /// Token sent with page writes.
    #[arg(long)]
    token: Option<String>,
    /// touch or desktop.
    #[arg(long)]
    device: Option<DeviceClass>,
    /// PNG file the current page is rendered to.
    #[arg(long, value_name = "PATH")]
    canvas: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, mut config: ViewerConfig) -> ViewerConfig {
        if let Some(server) = self.server {
            config.server = server;
        }
        if let Some(token) = self.token {
            config.token = token;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(canvas) = self.canvas {
            config.canvas = canvas;
        }
        config
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.debug);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::View { document, page, on_desync, overrides } => {
            let config = overrides.apply(load_config(config_path)?);
            run_view(ViewOptions {
                document,
                server: config.server,
                token: config.token,
                device: config.device,
                canvas: config.canvas,
                page,
                on_desync,
            })
        }
        Commands::Status { document, overrides } => {
            let config = overrides.apply(load_config(config_path)?);
            run_status(&config, &document)
        }
        Commands::SetPage { document, page, overrides } => {
            let config = overrides.apply(load_config(config_path)?);
            run_set_page(&config, &document, page)
        }
        Commands::InitConfig { force, overrides } => run_init_config(config_path, force, overrides),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };

    // A second call in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .try_init();
}

fn config_store(path: Option<&Path>) -> Result<ConfigStore> {
    match path {
        Some(path) => Ok(ConfigStore::at(path)),
        None => ConfigStore::from_default_project().context("no per-user config directory"),
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    let store = match config_store(path) {
        Ok(store) => store,
        Err(err) if path.is_none() => {
            warn!(error = %err, "using default settings");
            return Ok(ViewerConfig::default());
        }
        Err(err) => return Err(err),
    };

    store.load().with_context(|| format!("failed to load config {}", store.path().display()))
}

fn run_status(config: &ViewerConfig, document: &str) -> Result<()> {
    let client = HttpPageCounter::new(&config.server)?;
    let status = client
        .fetch_status_blocking(document)
        .with_context(|| format!("failed to read page status for '{document}'"))?;

    println!("{status}");
    Ok(())
}

fn run_set_page(config: &ViewerConfig, document: &str, page: u32) -> Result<()> {
    if page == 0 {
        anyhow::bail!("PAGE is 1-based and must be >= 1");
    }

    let client = HttpPageCounter::new(&config.server)?;
    let request = SetPageRequest {
        token: config.token.clone(),
        pdf_name: document.to_owned(),
        new_page: page,
    };
    client
        .set_page_blocking(&request)
        .with_context(|| format!("failed to set page for '{document}'"))?;

    println!("{document}: page {page}");
    Ok(())
}

fn run_init_config(path: Option<&Path>, force: bool, overrides: Overrides) -> Result<()> {
    let store = config_store(path)?;
    if store.path().exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", store.path().display());
    }

    let config = overrides.apply(ViewerConfig::default());
    store.save(&config).with_context(|| format!("failed to write {}", store.path().display()))?;

    println!("{}", store.path().display());
    Ok(())
}
