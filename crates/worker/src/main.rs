use clap::{Parser, ValueEnum};
use radar_core::catalog::{default_catalog, filter_catalog};
use radar_core::report::ReportResult;
use radar_core::session::DashboardSession;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "radar_worker")]
struct Args {
    /// Report date (YYYY-MM-DD). Defaults to today at RADAR_UTC_OFFSET_HOURS (KST).
    #[arg(long)]
    as_of_date: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Print the commentary prompt instead of the dashboard.
    #[arg(long)]
    prompt: bool,

    /// Generate the AI commentary after rendering the dashboard.
    #[arg(long)]
    report: bool,

    /// Only render these metric ids (repeatable).
    #[arg(long = "only", value_name = "ID")]
    only: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = radar_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let as_of_date = radar_core::time::resolve_report_date(
        args.as_of_date.as_deref(),
        chrono::Utc::now(),
        settings.utc_offset_hours,
    )?;

    let catalog = filter_catalog(default_catalog(), &args.only);
    anyhow::ensure!(!catalog.is_empty(), "no metric matches --only {:?}", args.only);

    let session = DashboardSession::from_settings(settings)?.with_catalog(catalog);
    let dashboard = session.render().await;

    if args.prompt {
        println!("{}", session.prompt(as_of_date));
        return Ok(());
    }

    match args.format {
        Format::Text => print!("{}", render::render_text(&dashboard)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&dashboard)?),
    }

    if !args.report {
        return Ok(());
    }

    let result = session.generate_report(as_of_date).await;
    match args.format {
        Format::Text => {
            if let ReportResult::Success { text } = &result {
                println!("\n{text}");
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if let ReportResult::Failure { reason } = result {
        let err = anyhow::anyhow!(reason);
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(%as_of_date, error = %err, "report generation failed");
        return Err(err.context("report generation failed"));
    }

    tracing::info!(%as_of_date, "report generated");
    Ok(())
}

fn init_sentry(settings: &radar_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
