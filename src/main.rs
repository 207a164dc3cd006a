//! fetcharr - automatic torrent acquisition for a media watch list

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fetcharr::app::AppServices;
use fetcharr::cli::{Command, FetchCommand, USAGE};
use fetcharr::config::{Config, LogFormat};
use fetcharr::db::Database;
use fetcharr::jobs::{self, InFlight};

fn init_tracing(format: LogFormat) {
    let json = matches!(format, LogFormat::Json).then(|| tracing_subscriber::fmt::layer().json());
    let pretty = matches!(format, LogFormat::Pretty).then(|| tracing_subscriber::fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fetcharr=debug,librqbit=info".into()),
        )
        .with(json)
        .with(pretty)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let command = Command::from_args()?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    info!("Starting fetcharr");

    // Blacklisting only needs the database
    if let Command::Blacklist { hash, name } = &command {
        let db = Database::connect(&config.database_url).await?;
        let added = db.blacklist().add(hash, name.as_deref()).await?;
        if added {
            info!(hash = %hash, "Torrent blacklisted");
        } else {
            warn!(hash = %hash, "Torrent was already blacklisted");
        }
        db.close().await;
        return Ok(ExitCode::SUCCESS);
    }

    let app = Arc::new(AppServices::build(&config).await?);
    let in_flight = InFlight::default();

    let exit = match command {
        Command::Serve => {
            let mut scheduler = jobs::start_scheduler(
                app.clone(),
                in_flight,
                &config.fetch_schedule,
                config.fetch_max_concurrent,
            )
            .await
            .context("Failed to start job scheduler")?;

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Shutting down");

            if let Err(e) = scheduler.shutdown().await {
                error!(error = %e, "Scheduler shutdown failed");
            }
            ExitCode::SUCCESS
        }
        Command::Sweep => {
            jobs::run_sweep(app.clone(), in_flight, config.fetch_max_concurrent).await?;
            ExitCode::SUCCESS
        }
        Command::Fetch(fetch) => {
            let target = match fetch {
                FetchCommand::Movie(id) => app.movie_target(id).await?,
                FetchCommand::Episode(id) => app.episode_target(id).await?,
                FetchCommand::Season {
                    show_id,
                    season_number,
                } => app.season_target(show_id, season_number).await?,
            };

            match jobs::fetch_target(&app, &in_flight, &target).await {
                Some(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    if report.acquired {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                None => ExitCode::FAILURE,
            }
        }
        Command::Blacklist { .. } | Command::Help => ExitCode::SUCCESS,
    };

    app.shutdown().await;
    Ok(exit)
}
