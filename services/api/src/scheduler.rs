//! services/api/src/scheduler.rs
//!
//! The background task that keeps credit reset dates current.
//!
//! The scheduler wakes on a fixed interval and, at most once per calendar day, runs
//! the reset sweep. The annual bonus sweep runs on the first successful tick of
//! each calendar year, which is January 1st whenever the service is up that day,
//! and again after every restart. Renewal skips bonuses already pending or closed
//! in the current year, so the extra run creates nothing. A missed wake-up is
//! harmless: both sweeps catch up on the next tick.

use benefit_tracker_core::{BenefitEngine, ResetReport};
use chrono::{Datelike, Local, NaiveDate};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// What a single tick did. `None` means the sweep did not run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub reset: Option<ResetReport>,
    pub bonuses_recreated: Option<usize>,
}

#[derive(Debug, Default)]
struct LastRun {
    reset_day: Option<NaiveDate>,
    annual_year: Option<i32>,
}

pub struct ResetScheduler {
    engine: BenefitEngine,
    poll_interval: Duration,
    last_run: Mutex<LastRun>,
}

impl ResetScheduler {
    pub fn new(engine: BenefitEngine, poll_interval: Duration) -> Self {
        Self {
            engine,
            poll_interval,
            last_run: Mutex::new(LastRun::default()),
        }
    }

    /// Runs whichever sweeps are due for `today`.
    ///
    /// A sweep that fails is not recorded as done, so the next tick retries it.
    pub async fn tick(&self, today: NaiveDate) -> TickOutcome {
        let mut last_run = self.last_run.lock().await;
        let mut outcome = TickOutcome::default();

        if last_run.reset_day.map_or(true, |day| day < today) {
            match self.engine.run_reset_sweep(today).await {
                Ok(report) => {
                    last_run.reset_day = Some(today);
                    outcome.reset = Some(report);
                }
                Err(e) => error!(%today, error = %e, "Reset sweep failed"),
            }
        }

        if last_run.annual_year.map_or(true, |year| year < today.year()) {
            match self.engine.run_annual_bonus_sweep(today).await {
                Ok(recreated) => {
                    last_run.annual_year = Some(today.year());
                    outcome.bonuses_recreated = Some(recreated);
                }
                Err(e) => error!(%today, error = %e, "Annual bonus sweep failed"),
            }
        }

        outcome
    }

    /// Ticks on the configured interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(poll_interval = ?self.poll_interval, "Reset scheduler started");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Reset scheduler stopped");
                    break;
                }
                _ = interval.tick() => {
                    let outcome = self.tick(Local::now().date_naive()).await;
                    if let Some(report) = outcome.reset {
                        info!(
                            resets_applied = report.resets_applied,
                            failures = report.failures,
                            "Scheduled reset sweep finished"
                        );
                    }
                }
            }
        }
    }
}
