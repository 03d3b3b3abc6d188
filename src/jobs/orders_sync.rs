//! Orders Sync Job
//!
//! Runs the orders pipeline once (`load_orders`) or on a fixed interval
//! (`run_orders_sync_job`). A failed run is logged and the job waits for the
//! next tick; there is no retry in between.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::config::ScheduleSettings;
use crate::models::order::LoadReport;
use crate::services::cbr::RateSource;
use crate::services::google_drive::FileStorage;
use crate::services::loader::{Loader, LoaderError};
use crate::services::order_repository::OrderRepository;

pub const JOB_NAME: &str = "orders_sync";

/// Run the pipeline once, logging the outcome. Errors are returned to the caller.
pub async fn load_orders<S, R, P>(loader: &Loader<S, R, P>) -> Result<LoadReport, LoaderError>
where
    S: FileStorage,
    R: RateSource,
    P: OrderRepository,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("load_orders", %run_id, file_name = %loader.settings().file_name);

    async move {
        info!("Start load_orders");

        match loader.load_data().await {
            Ok(report) => {
                info!(rows = report.rows, deleted = report.deleted, "End load_orders");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, details = ?e, "Failed to load orders");
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

/// Run `job` on the schedule until `shutdown` resolves. Returns how many runs
/// were started.
///
/// The first run fires `start_offset` after the call. Runs never overlap: ticks
/// missed while a run outlasts the interval collapse into a single catch-up run.
pub async fn run_periodic<F, Fut, E>(
    name: &str,
    schedule: ScheduleSettings,
    shutdown: impl Future<Output = ()>,
    mut job: F,
) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut ticker = interval_at(Instant::now() + schedule.start_offset, schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        job = name,
        start_offset_secs = schedule.start_offset.as_secs(),
        interval_secs = schedule.interval.as_secs(),
        "Job scheduled"
    );

    tokio::pin!(shutdown);
    let mut runs = 0;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!(job = name, runs, "Shutdown signal received, stopping job");
                break;
            }
            _ = ticker.tick() => {
                runs += 1;
                if let Err(e) = job().await {
                    error!(job = name, error = %e, "Scheduled run failed, waiting for next tick");
                }
            }
        }
    }

    runs
}

/// Run the orders pipeline on `schedule` until Ctrl-C.
pub async fn run_orders_sync_job<S, R, P>(loader: Arc<Loader<S, R, P>>, schedule: ScheduleSettings)
where
    S: FileStorage,
    R: RateSource,
    P: OrderRepository,
{
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    run_periodic(JOB_NAME, schedule, shutdown, || {
        let loader = Arc::clone(&loader);
        async move { load_orders(&loader).await.map(|_| ()) }
    })
    .await;

    info!("Orders sync job stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn schedule(offset: u64, interval: u64) -> ScheduleSettings {
        ScheduleSettings {
            start_offset: Duration::from_secs(offset),
            interval: Duration::from_secs(interval),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_at_offset_then_every_interval() {
        let started = Instant::now();
        let fired_at = std::sync::Mutex::new(Vec::new());

        let runs = run_periodic(
            "test",
            schedule(10, 60),
            sleep(Duration::from_secs(131)),
            || {
                fired_at.lock().unwrap().push(started.elapsed().as_secs());
                async { Ok::<(), String>(()) }
            },
        )
        .await;

        assert_eq!(runs, 3);
        assert_eq!(*fired_at.lock().unwrap(), vec![10, 70, 130]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_waits_for_next_tick() {
        let attempts = AtomicUsize::new(0);

        let runs = run_periodic("test", schedule(0, 60), sleep(Duration::from_secs(121)), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("rate feed unavailable") }
        })
        .await;

        assert_eq!(runs, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_job_does_not_overlap() {
        let runs = run_periodic("test", schedule(10, 60), sleep(Duration::from_secs(200)), || async {
            sleep(Duration::from_secs(150)).await;
            Ok::<(), String>(())
        })
        .await;

        // 10..160, catch-up run 160..310; shutdown fires at 200 and is seen once that run ends
        assert_eq!(runs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick() {
        let runs = run_periodic("test", schedule(30, 60), sleep(Duration::from_secs(5)), || async {
            Ok::<(), String>(())
        })
        .await;

        assert_eq!(runs, 0);
    }
}
