//! Background job scheduling

pub mod auto_fetch;

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::app::AppServices;

pub use auto_fetch::{InFlight, SweepSummary, fetch_target, run_sweep};

/// Initialize and start the job scheduler
pub async fn start_scheduler(
    app: Arc<AppServices>,
    in_flight: InFlight,
    schedule: &str,
    max_concurrent: usize,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let fetch_job = Job::new_async(schedule, move |_uuid, _l| {
        let app = app.clone();
        let in_flight = in_flight.clone();
        Box::pin(async move {
            info!(job = "auto_fetch", "Running wanted sweep");
            if let Err(e) = auto_fetch::run_sweep(app, in_flight, max_concurrent).await {
                error!(job = "auto_fetch", error = %e, "Wanted sweep failed");
            }
        })
    })?;
    scheduler.add(fetch_job).await?;

    scheduler.start().await?;

    info!(schedule = %schedule, "Job scheduler started");
    Ok(scheduler)
}
