//! crates/benefit_tracker_core/src/reset.rs
//!
//! Time-driven recurrence: the daily credit reset sweep and the annual
//! spending-bonus renewal sweep. The scheduler and on-demand callers share
//! these functions.

use chrono::{Datelike, NaiveDate, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Frequency, SpendingBonus, SpendingBonusStatus, UsageState};
use crate::engine::BenefitEngine;
use crate::ports::{CreditFilter, PortResult, SpendingBonusFilter};

/// Outcome of one credit reset sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub resets_applied: usize,
    /// Credits that were due but could not be reset; they are retried next sweep.
    pub failures: usize,
}

/// The reset date following `reset_date`, or `None` when the credit is not due.
///
/// Only a date strictly before `today` is due. Periods are counted from the
/// given date, adding as many as needed to reach `today`, so a sweep that runs
/// late still lands on the credit's own anniversary. Stored credits count from
/// their anchor instead, see [`crate::CreditBenefit::next_reset`].
pub fn next_reset_date(
    frequency: Frequency,
    reset_date: NaiveDate,
    today: NaiveDate,
) -> Option<NaiveDate> {
    if reset_date >= today {
        return None;
    }
    frequency.first_reset_on_or_after(reset_date, today)
}

impl BenefitEngine {
    /// Returns used credits whose reset date has passed to `available` and
    /// advances their reset dates.
    ///
    /// Each credit is reset in its own transaction: the status flip and the date
    /// advance commit together or not at all. A failing credit is logged and
    /// skipped. Running the sweep twice for the same `today` is a no-op the
    /// second time.
    pub async fn run_reset_sweep(&self, today: NaiveDate) -> PortResult<ResetReport> {
        let due: Vec<Uuid> = {
            let mut tx = self.store.begin().await?;
            let credits = tx.list_credits(CreditFilter::default()).await?;
            tx.rollback().await?;
            credits
                .into_iter()
                .filter(|c| c.next_reset(today).is_some())
                .map(|c| c.id)
                .collect()
        };

        let mut report = ResetReport::default();
        for credit_id in due {
            match self.reset_credit(credit_id, today).await {
                Ok(true) => report.resets_applied += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    warn!(credit_id = %credit_id, error = %e, "Failed to reset credit, skipping");
                }
            }
        }

        info!(
            %today,
            resets_applied = report.resets_applied,
            failures = report.failures,
            "Credit reset sweep finished"
        );
        Ok(report)
    }

    /// Resets one credit if it is still due. Returns `false` when another
    /// writer got there first or the credit disappeared.
    async fn reset_credit(&self, credit_id: Uuid, today: NaiveDate) -> PortResult<bool> {
        let mut tx = self.store.begin().await?;
        let Some(mut credit) = tx.get_credit(credit_id).await? else {
            return Ok(false);
        };
        let Some(next) = credit.next_reset(today) else {
            return Ok(false);
        };

        let key = credit.status_key();
        if let Some(mut status) = tx.get_usage_status(&key).await? {
            if status.state == UsageState::Used {
                status.state = UsageState::Available;
                status.updated_at = Utc::now();
                tx.upsert_usage_status(&status).await?;
            }
        }

        let previous = credit.reset_date;
        credit.reset_date = Some(next);
        tx.update_credit(&credit).await?;
        tx.commit().await?;

        debug!(
            credit = %credit.name,
            frequency = %credit.frequency,
            previous = ?previous,
            next = %next,
            "Credit reset"
        );
        Ok(true)
    }

    /// Re-instantiates spending bonuses closed in an earlier year as fresh
    /// pending bonuses for the new cycle.
    ///
    /// A bonus is skipped when one with the same card and description is
    /// already pending, or already closed during `today`'s year, so a restart
    /// that reruns the sweep mid-year creates nothing new. All recreations
    /// commit together.
    pub async fn run_annual_bonus_sweep(&self, today: NaiveDate) -> PortResult<usize> {
        let mut tx = self.store.begin().await?;
        let bonuses = tx.list_spending_bonuses(SpendingBonusFilter::default()).await?;

        let mut current_cycle: HashSet<(Uuid, String)> = bonuses
            .iter()
            .filter(|b| {
                b.status == SpendingBonusStatus::Pending || closed_in_year(b, today.year())
            })
            .map(|b| (b.card_id, b.description.clone()))
            .collect();

        let mut recreated = 0;
        for bonus in bonuses
            .iter()
            .filter(|b| closed_in_prior_cycle(b, today))
        {
            if !current_cycle.insert((bonus.card_id, bonus.description.clone())) {
                continue;
            }
            let renewed = bonus.renewed();
            tx.insert_spending_bonus(&renewed).await?;
            recreated += 1;
            debug!(category = %bonus.category, description = %bonus.description, "Spending bonus renewed");
        }
        tx.commit().await?;

        info!(%today, recreated, "Annual bonus sweep finished");
        Ok(recreated)
    }
}

fn is_closed(bonus: &SpendingBonus) -> bool {
    matches!(
        bonus.status,
        SpendingBonusStatus::Completed | SpendingBonusStatus::Expired
    )
}

fn closed_in_year(bonus: &SpendingBonus, year: i32) -> bool {
    is_closed(bonus) && bonus.completed_date.is_some_and(|d| d.year() == year)
}

fn closed_in_prior_cycle(bonus: &SpendingBonus, today: NaiveDate) -> bool {
    is_closed(bonus)
        && bonus
            .completed_date
            .map_or(true, |closed| closed.year() < today.year())
}
