//! crates/benefit_tracker_core/src/dashboard.rs
//!
//! Read models joining benefit definitions with the user's usage and progress.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    Card, CreditBenefit, Frequency, Multiplier, SignupBonus, SignupBonusStatus, SpendingBonus,
    SpendingBonusStatus, UsageState,
};
use crate::engine::{require_card, BenefitEngine};
use crate::ports::{CreditFilter, PortResult, SpendingBonusFilter, StoreTransaction};

#[derive(Debug, Clone)]
pub struct CreditView {
    pub card_name: String,
    pub credit: CreditBenefit,
    pub state: UsageState,
    pub status_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SignupBonusView {
    pub card_name: String,
    pub bonus: SignupBonus,
    pub progress_percent: f64,
}

#[derive(Debug, Clone)]
pub struct SpendingBonusView {
    pub card_name: String,
    pub bonus: SpendingBonus,
    pub progress_percent: f64,
}

/// Everything recorded for one card, whatever its status.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub card: Card,
    pub credits: Vec<CreditView>,
    pub signup_bonuses: Vec<SignupBonusView>,
    pub spending_bonuses: Vec<SpendingBonusView>,
    pub multipliers: Vec<Multiplier>,
}

impl BenefitEngine {
    /// Credits of one frequency on active cards, highest dollar value first.
    pub async fn credits_by_frequency(&self, frequency: Frequency) -> PortResult<Vec<CreditView>> {
        let mut tx = self.store.begin().await?;
        let cards = active_card_names(tx.list_cards().await?);
        let credits = tx
            .list_credits(CreditFilter {
                card_id: None,
                frequency: Some(frequency),
            })
            .await?;

        let mut views = Vec::with_capacity(credits.len());
        for credit in credits {
            let Some(card_name) = cards.get(&credit.card_id) else {
                continue;
            };
            views.push(credit_view(&mut *tx, card_name, credit).await?);
        }
        tx.rollback().await?;

        sort_by_value(&mut views);
        Ok(views)
    }

    /// Credits of one frequency already used this cycle, on active cards.
    pub async fn used_credits_by_frequency(
        &self,
        frequency: Frequency,
    ) -> PortResult<Vec<CreditView>> {
        let mut views = self.credits_by_frequency(frequency).await?;
        views.retain(|v| v.state == UsageState::Used);
        Ok(views)
    }

    /// The card's multipliers, highest earn rate first.
    pub async fn card_multipliers(&self, card_name: &str) -> PortResult<Vec<Multiplier>> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let mut multipliers = tx.list_multipliers(Some(card.id)).await?;
        tx.rollback().await?;

        multipliers.sort_by(|a, b| b.multiplier.total_cmp(&a.multiplier));
        Ok(multipliers)
    }

    /// The full record of one card, including completed bonuses. Works for
    /// inactive cards too.
    pub async fn card_details(&self, card_name: &str) -> PortResult<CardDetails> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;

        let mut credits = Vec::new();
        for credit in tx
            .list_credits(CreditFilter {
                card_id: Some(card.id),
                frequency: None,
            })
            .await?
        {
            credits.push(credit_view(&mut *tx, &card.name, credit).await?);
        }
        let signup_bonuses = tx.list_signup_bonuses(Some(card.id)).await?;
        let spending_bonuses = tx
            .list_spending_bonuses(SpendingBonusFilter {
                card_id: Some(card.id),
                status: None,
            })
            .await?;
        let mut multipliers = tx.list_multipliers(Some(card.id)).await?;
        tx.rollback().await?;

        credits.sort_by(|a, b| {
            a.credit
                .frequency
                .cmp(&b.credit.frequency)
                .then(b.credit.magnitude.dollars().total_cmp(&a.credit.magnitude.dollars()))
        });
        multipliers.sort_by(|a, b| b.multiplier.total_cmp(&a.multiplier));

        Ok(CardDetails {
            signup_bonuses: signup_bonuses
                .into_iter()
                .map(|bonus| SignupBonusView {
                    card_name: card.name.clone(),
                    progress_percent: bonus.progress_percent(),
                    bonus,
                })
                .collect(),
            spending_bonuses: spending_bonuses
                .into_iter()
                .map(|bonus| SpendingBonusView {
                    card_name: card.name.clone(),
                    progress_percent: bonus.progress_percent(),
                    bonus,
                })
                .collect(),
            credits,
            multipliers,
            card,
        })
    }

    /// Sign-up bonuses still being worked on, largest spend requirement first.
    pub async fn active_signup_bonuses(&self) -> PortResult<Vec<SignupBonusView>> {
        let mut tx = self.store.begin().await?;
        let cards = active_card_names(tx.list_cards().await?);
        let bonuses = tx.list_signup_bonuses(None).await?;
        tx.rollback().await?;

        let mut views: Vec<SignupBonusView> = bonuses
            .into_iter()
            .filter(|b| b.status != SignupBonusStatus::Completed)
            .filter_map(|bonus| {
                let card_name = cards.get(&bonus.card_id)?.clone();
                Some(SignupBonusView {
                    card_name,
                    progress_percent: bonus.progress_percent(),
                    bonus,
                })
            })
            .collect();
        views.sort_by(|a, b| b.bonus.required_spend.total_cmp(&a.bonus.required_spend));
        Ok(views)
    }

    /// Pending threshold bonuses, largest spend requirement first.
    pub async fn pending_spending_bonuses(&self) -> PortResult<Vec<SpendingBonusView>> {
        let mut tx = self.store.begin().await?;
        let cards = active_card_names(tx.list_cards().await?);
        let bonuses = tx
            .list_spending_bonuses(SpendingBonusFilter {
                card_id: None,
                status: Some(SpendingBonusStatus::Pending),
            })
            .await?;
        tx.rollback().await?;

        let mut views: Vec<SpendingBonusView> = bonuses
            .into_iter()
            .filter_map(|bonus| {
                let card_name = cards.get(&bonus.card_id)?.clone();
                Some(SpendingBonusView {
                    card_name,
                    progress_percent: bonus.progress_percent(),
                    bonus,
                })
            })
            .collect();
        views.sort_by(|a, b| b.bonus.required_spend.total_cmp(&a.bonus.required_spend));
        Ok(views)
    }
}

async fn credit_view(
    tx: &mut dyn StoreTransaction,
    card_name: &str,
    credit: CreditBenefit,
) -> PortResult<CreditView> {
    let status = tx.get_usage_status(&credit.status_key()).await?;
    Ok(CreditView {
        card_name: card_name.to_string(),
        state: status.as_ref().map_or(UsageState::Available, |s| s.state),
        status_updated_at: status.map(|s| s.updated_at),
        credit,
    })
}

fn sort_by_value(views: &mut [CreditView]) {
    views.sort_by(|a, b| {
        b.credit
            .magnitude
            .dollars()
            .total_cmp(&a.credit.magnitude.dollars())
    });
}

fn active_card_names(cards: Vec<Card>) -> HashMap<Uuid, String> {
    cards
        .into_iter()
        .filter(|c| c.is_active)
        .map(|c| (c.id, c.name))
        .collect()
}
