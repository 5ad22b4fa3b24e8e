//! crates/benefit_tracker_core/src/usage.rs
//!
//! The per-credit usage state machine: `available -> used -> available`.
//! A missing status record means `available`.

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::{slugify, CreditUsageStatus, Frequency, StatusKey, UsageState};
use crate::engine::{require_card, BenefitEngine};
use crate::ports::{PortError, PortResult};

impl BenefitEngine {
    /// Marks a credit as used. Always succeeds and refreshes the timestamp,
    /// even when the credit was already used.
    pub async fn mark_used(
        &self,
        card_name: &str,
        frequency: Frequency,
        identifier: &str,
    ) -> PortResult<()> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let key = status_key(card.id, frequency, identifier)?;

        tx.upsert_usage_status(&CreditUsageStatus {
            key: key.clone(),
            state: UsageState::Used,
            updated_at: Utc::now(),
        })
        .await?;
        tx.commit().await?;

        info!(card_name = %card.name, frequency = %frequency, slug = %key.slug, "Credit marked used");
        Ok(())
    }

    /// Makes a credit available again in every frequency bucket it was recorded in.
    ///
    /// Returns how many records were flipped; zero when nothing was recorded,
    /// which is still a success.
    pub async fn mark_available(&self, card_name: &str, identifier: &str) -> PortResult<usize> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let slug = slugify(identifier);
        if slug.is_empty() {
            return Err(PortError::InvalidInput("Credit identifier must not be empty".to_string()));
        }

        let now = Utc::now();
        let mut flipped = 0;
        for mut status in tx.list_usage_statuses(card.id, &slug).await? {
            if status.state == UsageState::Used {
                status.state = UsageState::Available;
                status.updated_at = now;
                tx.upsert_usage_status(&status).await?;
                flipped += 1;
            }
        }
        tx.commit().await?;

        if flipped == 0 {
            debug!(card_name = %card.name, slug = %slug, "Credit already available");
        } else {
            info!(card_name = %card.name, slug = %slug, flipped, "Credit marked available");
        }
        Ok(flipped)
    }

    pub async fn get_status(
        &self,
        card_name: &str,
        frequency: Frequency,
        identifier: &str,
    ) -> PortResult<UsageState> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let key = status_key(card.id, frequency, identifier)?;
        let status = tx.get_usage_status(&key).await?;
        tx.rollback().await?;

        Ok(status.map_or(UsageState::Available, |s| s.state))
    }
}

fn status_key(card_id: uuid::Uuid, frequency: Frequency, identifier: &str) -> PortResult<StatusKey> {
    let key = StatusKey::new(card_id, frequency, identifier);
    if key.slug.is_empty() {
        return Err(PortError::InvalidInput("Credit identifier must not be empty".to_string()));
    }
    Ok(key)
}
