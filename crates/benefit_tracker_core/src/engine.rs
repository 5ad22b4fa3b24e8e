//! crates/benefit_tracker_core/src/engine.rs
//!
//! The `BenefitEngine` owns every state transition of cards, credits and bonuses.
//! Its operations are spread over several modules (`usage`, `reset`, `bonus`,
//! `dashboard`); this file holds the struct itself and record creation.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Card, CreditBenefit, Multiplier, NewCreditBenefit, NewMultiplier, NewSignupBonus,
    NewSpendingBonus, SignupBonus, SignupBonusStatus, SpendingBonus, SpendingBonusStatus,
};
use crate::ports::{BenefitStore, CreditFilter, PortError, PortResult, StoreTransaction};
use chrono::Utc;

/// The benefit lifecycle and reset engine.
///
/// Constructed around an explicitly injected store; every public operation runs
/// inside exactly one store transaction, apart from the reset sweep which opens
/// one per credit.
#[derive(Clone)]
pub struct BenefitEngine {
    pub(crate) store: Arc<dyn BenefitStore>,
}

impl BenefitEngine {
    pub fn new(store: Arc<dyn BenefitStore>) -> Self {
        Self { store }
    }

    //=====================================================================================
    // Cards
    //=====================================================================================

    pub async fn add_card(&self, issuer: &str, name: &str) -> PortResult<Card> {
        if name.trim().is_empty() {
            return Err(PortError::InvalidInput("Card name must not be empty".to_string()));
        }
        let card = Card::new(issuer, name);

        let mut tx = self.store.begin().await?;
        if tx.find_card_by_name(&card.name).await?.is_some() {
            return Err(PortError::Conflict(format!("Card '{}' already exists", card.name)));
        }
        tx.insert_card(&card).await?;
        tx.commit().await?;

        info!(card_id = %card.id, card_name = %card.name, "Card added");
        Ok(card)
    }

    pub async fn list_cards(&self) -> PortResult<Vec<Card>> {
        let mut tx = self.store.begin().await?;
        let cards = tx.list_cards().await?;
        tx.rollback().await?;
        Ok(cards)
    }

    /// Activates or deactivates a card. Inactive cards keep all their records
    /// and stay writable, but drop out of the dashboards.
    pub async fn set_card_active(&self, card_name: &str, is_active: bool) -> PortResult<Card> {
        let mut tx = self.store.begin().await?;
        let mut card = require_card(&mut *tx, card_name).await?;
        if card.is_active != is_active {
            card.is_active = is_active;
            tx.update_card(&card).await?;
        }
        tx.commit().await?;

        info!(card_name = %card.name, is_active, "Card activation changed");
        Ok(card)
    }

    //=====================================================================================
    // Benefit Definitions
    //=====================================================================================

    pub async fn add_credit_benefit(
        &self,
        card_name: &str,
        new_credit: NewCreditBenefit,
    ) -> PortResult<CreditBenefit> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let credit = build_credit(card.id, new_credit)?;
        tx.insert_credit(&credit).await?;
        tx.commit().await?;

        info!(card_name = %card.name, credit = %credit.name, frequency = %credit.frequency, "Credit benefit added");
        Ok(credit)
    }

    /// Replaces every imported credit of a card with a fresh set of definitions.
    ///
    /// Bonus-derived credits are kept. Usage status is keyed by soft key, so a
    /// redefined credit with the same name and frequency keeps its status.
    pub async fn redefine_credit_benefits(
        &self,
        card_name: &str,
        definitions: Vec<NewCreditBenefit>,
    ) -> PortResult<Vec<CreditBenefit>> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;

        let existing = tx
            .list_credits(CreditFilter {
                card_id: Some(card.id),
                frequency: None,
            })
            .await?;
        let mut removed = 0;
        for credit in existing.iter().filter(|c| !c.is_bonus_derived) {
            tx.delete_credit(credit.id).await?;
            removed += 1;
        }

        let mut created = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let credit = build_credit(card.id, definition)?;
            tx.insert_credit(&credit).await?;
            created.push(credit);
        }
        tx.commit().await?;

        info!(card_name = %card.name, removed, added = created.len(), "Credit benefits redefined");
        Ok(created)
    }

    pub async fn add_multiplier(
        &self,
        card_name: &str,
        new_multiplier: NewMultiplier,
    ) -> PortResult<Multiplier> {
        if new_multiplier.category.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "Multiplier category must not be empty".to_string(),
            ));
        }
        if !new_multiplier.multiplier.is_finite() || new_multiplier.multiplier <= 0.0 {
            return Err(PortError::InvalidInput(format!(
                "Multiplier must be positive, got {}",
                new_multiplier.multiplier
            )));
        }
        // A zero cap means the rate is uncapped.
        let cap_amount = match new_multiplier.cap_amount {
            Some(cap) => {
                validate_spend(cap)?;
                (cap > 0.0).then_some(cap)
            }
            None => None,
        };

        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let multiplier = Multiplier {
            id: Uuid::new_v4(),
            card_id: card.id,
            category: new_multiplier.category.trim().to_string(),
            multiplier: new_multiplier.multiplier,
            description: new_multiplier.description,
            cap_frequency: cap_amount.and(new_multiplier.cap_frequency),
            cap_amount,
        };
        tx.insert_multiplier(&multiplier).await?;
        tx.commit().await?;

        info!(card_name = %card.name, category = %multiplier.category, rate = multiplier.multiplier, "Multiplier added");
        Ok(multiplier)
    }

    pub async fn add_signup_bonus(
        &self,
        card_name: &str,
        new_bonus: NewSignupBonus,
    ) -> PortResult<SignupBonus> {
        validate_spend(new_bonus.required_spend)?;

        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let bonus = SignupBonus {
            id: Uuid::new_v4(),
            card_id: card.id,
            bonus_amount: new_bonus.bonus_amount,
            description: new_bonus.description,
            required_spend: new_bonus.required_spend,
            current_spend: 0.0,
            deadline: new_bonus.deadline,
            status: SignupBonusStatus::NotStarted,
            created_at: Utc::now(),
        };
        tx.insert_signup_bonus(&bonus).await?;
        tx.commit().await?;

        info!(card_name = %card.name, bonus = %bonus.description, "Sign-up bonus added");
        Ok(bonus)
    }

    pub async fn add_spending_bonus(
        &self,
        card_name: &str,
        new_bonus: NewSpendingBonus,
    ) -> PortResult<SpendingBonus> {
        validate_spend(new_bonus.required_spend)?;
        if new_bonus.category.trim().is_empty() {
            return Err(PortError::InvalidInput(
                "Spending bonus category must not be empty".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let bonus = SpendingBonus {
            id: Uuid::new_v4(),
            card_id: card.id,
            category: new_bonus.category,
            bonus_amount: new_bonus.bonus_amount,
            description: new_bonus.description,
            required_spend: new_bonus.required_spend,
            current_spend: 0.0,
            status: SpendingBonusStatus::Pending,
            completed_date: None,
            created_at: Utc::now(),
        };
        tx.insert_spending_bonus(&bonus).await?;
        tx.commit().await?;

        info!(card_name = %card.name, category = %bonus.category, "Spending bonus added");
        Ok(bonus)
    }
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Resolves a card by display name or fails with `NotFound`.
pub(crate) async fn require_card(
    tx: &mut dyn StoreTransaction,
    card_name: &str,
) -> PortResult<Card> {
    tx.find_card_by_name(card_name.trim())
        .await?
        .ok_or_else(|| PortError::NotFound(format!("Card '{}' not found", card_name)))
}

pub(crate) fn validate_spend(amount: f64) -> PortResult<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(PortError::InvalidInput(format!(
            "Spend amounts must be non-negative, got {}",
            amount
        )))
    }
}

fn build_credit(card_id: Uuid, definition: NewCreditBenefit) -> PortResult<CreditBenefit> {
    if definition.name.trim().is_empty() {
        return Err(PortError::InvalidInput("Credit name must not be empty".to_string()));
    }
    if let Some(required) = definition.required_amount {
        validate_spend(required)?;
    }
    Ok(CreditBenefit {
        id: Uuid::new_v4(),
        card_id,
        name: definition.name.trim().to_string(),
        description: definition.description,
        magnitude: definition.magnitude,
        frequency: definition.frequency,
        reset_date: definition.reset_date,
        reset_anchor: definition.reset_date,
        current_amount: definition.required_amount.map(|_| 0.0),
        required_amount: definition.required_amount,
        is_bonus_derived: false,
        source_bonus_id: None,
    })
}
