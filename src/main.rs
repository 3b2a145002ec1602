use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use ratewatch::api::rest::{create_router, ApiState};
use ratewatch::comparison::compare_snapshot;
use ratewatch::config::loader::AppConfig;
use ratewatch::core::acquisition::AcquisitionService;
use ratewatch::core::scheduler::DailyScheduler;
use ratewatch::ledger::{open_configured, WindowOrder};
use ratewatch::migrate::import_file;
use ratewatch::observability::{metrics, tracing as logging};
use ratewatch::utils::task_supervisor::TaskSupervisor;

#[derive(Parser)]
#[command(name = "ratewatch", version, about = "Daily TWD/THB exchange rate tracker")]
struct Cli {
    /// Configuration overlay loaded from `config/<env>`.
    #[arg(long, global = true, default_value = "development")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the daily scheduler.
    Serve,
    /// Run one acquisition cycle and print the snapshot.
    Fetch,
    /// Compare conversion paths against the latest snapshot.
    Compare {
        #[arg(long)]
        budget: f64,
    },
    /// Print the stored history.
    History {
        #[arg(long)]
        limit: Option<usize>,
        /// Most recent first.
        #[arg(long)]
        desc: bool,
    },
    /// Import a legacy history file.
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.env).context("loading configuration")?;
    logging::init(config.logging.json);
    metrics::register_metrics();

    let ledger = Arc::new(open_configured(&config.ledger).await);

    match cli.command {
        Command::Serve => serve(config, ledger).await?,
        Command::Fetch => {
            let service = AcquisitionService::from_config(&config, ledger)?;
            let report = service.trigger().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Compare { budget } => {
            let latest = ledger.latest().await.context("ledger is empty, run `fetch` first")?;
            let result = compare_snapshot(budget, &latest, &config.comparison);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::History { limit, desc } => {
            let order = if desc { WindowOrder::Descending } else { WindowOrder::Ascending };
            let window = ledger.window(limit.unwrap_or(config.server.history_limit), order).await;
            println!("{}", serde_json::to_string_pretty(&window)?);
        }
        Command::Import { file } => {
            let count = import_file(&file, &ledger, config.timezone()?)
                .await
                .with_context(|| format!("importing {}", file.display()))?;
            println!("Imported {} records", count);
        }
    }
    Ok(())
}

async fn serve(config: AppConfig, ledger: Arc<ratewatch::ledger::LedgerStore>) -> anyhow::Result<()> {
    let service = Arc::new(AcquisitionService::from_config(&config, ledger)?);
    let mut supervisor = TaskSupervisor::new();

    if config.schedule.enabled {
        let scheduler = DailyScheduler::new(
            service.clone(),
            config.schedule_time()?,
            config.timezone()?,
            config.schedule.run_on_startup,
        );
        supervisor.spawn("daily_scheduler", scheduler.run());
    }

    let state = Arc::new(ApiState {
        service,
        timezone: config.timezone()?,
        comparison: config.comparison,
        history_limit: config.server.history_limit,
    });
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "Server listening");

    supervisor.spawn("http_server", async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });

    let mut health = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            _ = health.tick() => {
                if let Err(e) = supervisor.check_health() {
                    supervisor.shutdown_all();
                    return Err(e.into());
                }
            }
        }
    }

    supervisor.shutdown_all();
    Ok(())
}
