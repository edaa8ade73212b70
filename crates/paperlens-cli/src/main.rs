use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use paperlens_core::{load_config, AppConfig};
use paperlens_gateway::{spawn_session, DriverOptions, Endpoint, SessionHandle, UploadClient};
use paperlens_schema::ConnectionState;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod plain;

use plain::PlainReporter;

#[derive(Parser)]
#[command(name = "paperlens", version, about = "Streamed structural analysis of research papers")]
struct Cli {
    #[arg(long, default_value = "paperlens.yaml", help = "Config file (YAML); missing means defaults")]
    config: PathBuf,

    #[arg(long, help = "Backend base URL, overrides config and PAPERLENS_API_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, default_value = "~/.paperlens/logs", help = "Directory for rolling log files")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Upload a paper and follow its analysis")]
    Analyze {
        file: PathBuf,
        #[arg(long, help = "Print progress lines instead of the dashboard")]
        plain: bool,
        #[arg(long, help = "Connect but wait for [a] before starting analysis")]
        no_start: bool,
    },
    #[command(about = "Attach to an already uploaded paper")]
    Watch {
        document_id: String,
        #[arg(long, help = "Print progress lines instead of the dashboard")]
        plain: bool,
        #[arg(long, help = "Start analysis as soon as the connection opens")]
        start: bool,
    },
    #[command(about = "Validate and print the effective configuration")]
    Validate,
}

impl Commands {
    fn is_dashboard(&self) -> bool {
        match self {
            Commands::Analyze { plain, .. } | Commands::Watch { plain, .. } => !plain,
            Commands::Validate => false,
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let log_dir = expand_home(&cli.log_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "paperlens.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // The dashboard owns the terminal, so only the file layer stays active there.
    let stderr_layer = (!command.is_dashboard())
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let config = load_config(&cli.config)?
        .apply_env()
        .with_base_url_override(cli.base_url);

    match command {
        Commands::Validate => {
            let endpoint = Endpoint::from_config(&config.backend)?;
            print!("{}", serde_yaml::to_string(&config)?);
            println!("Config valid. Backend {}", endpoint.base());
            println!("  upload:     {}", endpoint.upload_url());
            println!("  connection: {}", endpoint.document_ws_url("<document-id>"));
        }
        Commands::Analyze {
            file,
            plain,
            no_start,
        } => {
            let endpoint = Endpoint::from_config(&config.backend)?;
            let document_id = UploadClient::new(endpoint.clone())
                .upload_file(&file)
                .await
                .with_context(|| format!("failed to upload {}", file.display()))?;
            if plain {
                println!("Uploaded {} as {document_id}", file.display());
            }
            follow(&config, endpoint, document_id, !no_start, plain).await?;
        }
        Commands::Watch {
            document_id,
            plain,
            start,
        } => {
            let endpoint = Endpoint::from_config(&config.backend)?;
            follow(&config, endpoint, document_id, start, plain).await?;
        }
    }

    Ok(())
}

async fn follow(
    config: &AppConfig,
    endpoint: Endpoint,
    document_id: String,
    auto_start: bool,
    plain: bool,
) -> Result<()> {
    let handle = spawn_session(config, endpoint, DriverOptions { auto_start });
    tracing::info!(session = %handle.id(), document_id = %document_id, "session started");
    handle.open_document(document_id).await?;

    let outcome = if plain {
        run_plain(&handle).await
    } else {
        paperlens_tui::run_tui(handle.subscribe(), handle.commands())
            .await
            .context("dashboard failed")
    };
    handle.shutdown().await?;
    outcome
}

async fn run_plain(handle: &SessionHandle) -> Result<()> {
    let mut views = handle.subscribe();
    let mut reporter = PlainReporter::default();

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    bail!("session ended unexpectedly");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted.");
                return Ok(());
            }
        }

        let view = views.borrow_and_update().clone();
        for line in reporter.observe(&view) {
            println!("{line}");
        }
        if view.is_complete() && view.progress == 100 {
            return Ok(());
        }
        if !view.finalized
            && matches!(
                view.connection,
                ConnectionState::Closed | ConnectionState::Failed
            )
        {
            bail!("connection ended before the analysis finished: {}", view.status);
        }
    }
}
