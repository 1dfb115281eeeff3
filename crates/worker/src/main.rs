use anyhow::Context;
use clap::{Parser, Subcommand};
use reserve_core::battery::tesla::TeslaEnergyClient;
use reserve_core::battery::BatteryClient;
use reserve_core::config::{ControlSettings, Settings};
use reserve_core::control::ControlLoop;
use reserve_core::forecast::{ForecastProvider, HourWindow, VisualCrossingClient};
use reserve_core::reserve::{self, ReserveSetter};
use reserve_core::resilience::{ResilientDataSource, RetryPolicy};
use reserve_core::storage::{export, ForecastDatabase, PgForecastDatabase};
use reserve_core::time::{SystemClock, TokioSleeper};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "reserve_worker")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daily reserve loop until a fatal error or Ctrl-C (default).
    Run,

    /// Fetch today's forecast and log the reserve it calls for.
    Forecast {
        /// Also send the target to the battery.
        #[arg(long)]
        apply: bool,
    },

    /// Export daily forecast totals and their reserve percentage to CSV.
    Export {
        #[arg(long, default_value = "battery_data.csv")]
        out: PathBuf,

        /// First date to include (YYYY-MM-DD). Defaults to today's local date.
        #[arg(long)]
        since: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let control = ControlSettings::from_env()?;

    let res = match args.command.unwrap_or(Command::Run) {
        Command::Run => run(&settings, control).await,
        Command::Forecast { apply } => forecast(&settings, &control, apply).await,
        Command::Export { out, since } => {
            export_forecasts(&settings, &control, &out, since.as_deref()).await
        }
    };

    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "reserve worker stopped");
    }
    res
}

async fn run(settings: &Settings, control: ControlSettings) -> anyhow::Result<()> {
    let battery: Arc<dyn BatteryClient> = Arc::new(TeslaEnergyClient::from_settings(settings)?);
    let weather = Arc::new(VisualCrossingClient::from_settings(settings)?);
    let database = Arc::new(PgForecastDatabase::from_settings(settings)?);

    let mut control_loop = ControlLoop::new(
        control,
        battery,
        weather,
        database,
        Arc::new(SystemClock),
        Arc::new(TokioSleeper),
    );

    tokio::select! {
        res = control_loop.run() => res.map_err(anyhow::Error::new),
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}

async fn forecast(settings: &Settings, control: &ControlSettings, apply: bool) -> anyhow::Result<()> {
    let weather = Arc::new(VisualCrossingClient::from_settings(settings)?);
    let provider = ForecastProvider::new(
        weather,
        HourWindow::new(control.stop_buy, control.sell_high),
        control.forecast_dir.clone(),
    );

    let row = provider.fetch_today().await?;
    let target = reserve::compute(&row);
    tracing::info!(date = %row.date, target, apply, "forecast reserve target");

    if apply {
        let battery: Arc<dyn BatteryClient> =
            Arc::new(TeslaEnergyClient::from_settings(settings)?);
        let setter = ReserveSetter::new(battery, control.min_battery_reserve);
        setter.apply(target).await?;
    }
    Ok(())
}

async fn export_forecasts(
    settings: &Settings,
    control: &ControlSettings,
    out: &std::path::Path,
    since: Option<&str>,
) -> anyhow::Result<()> {
    let since = resolve_since(since)?;
    let database = PgForecastDatabase::from_settings(settings)?;

    // Same guard as the loop: an unreachable database leaves the battery at 100%.
    let battery: Arc<dyn BatteryClient> = Arc::new(TeslaEnergyClient::from_settings(settings)?);
    let guard = ResilientDataSource::new(
        RetryPolicy {
            max_attempts: control.max_retries,
            delay: control.retry_delay,
        },
        Arc::new(TokioSleeper),
        ReserveSetter::new(battery, control.min_battery_reserve),
    );
    guard
        .ensure_available("database", || database.check_connection())
        .await?;

    export::export_since(&database, since, out).await?;
    Ok(())
}

fn resolve_since(since: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    match since {
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("--since must be YYYY-MM-DD (got {s})")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
