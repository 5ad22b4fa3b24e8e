//! crates/benefit_tracker_core/src/bonus.rs
//!
//! Bonus lifecycles: spending-bonus completion with its reversible conversion
//! into a statement credit, and the sign-up bonus state machine.

use chrono::{Datelike, NaiveDate};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{
    slugify, Card, CreditBenefit, Frequency, Magnitude, SignupBonus, SignupBonusStatus,
    SpendingBonus, SpendingBonusStatus,
};
use crate::engine::{require_card, validate_spend, BenefitEngine};
use crate::ports::{PortError, PortResult, SpendingBonusFilter, StoreTransaction};

impl BenefitEngine {
    //=====================================================================================
    // Spending Bonuses
    //=====================================================================================

    /// Completes the card's pending spending bonus for `category` and synthesizes
    /// the annual credit it unlocks. Returns the id of the new credit.
    ///
    /// The credit is named after the category and the completion year, so each
    /// cycle's credit tracks its usage under its own status key.
    ///
    /// `magnitude` overrides the credit's size; by default the bonus amount is
    /// used. The bonus update and the credit insert share one transaction.
    pub async fn complete_spending_bonus(
        &self,
        card_name: &str,
        category: &str,
        magnitude: Option<Magnitude>,
        completed_on: NaiveDate,
    ) -> PortResult<Uuid> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let mut bonus = find_pending_spending_bonus(&mut *tx, &card, category).await?;

        bonus.status = SpendingBonusStatus::Completed;
        bonus.completed_date = Some(completed_on);

        let credit = CreditBenefit {
            id: Uuid::new_v4(),
            card_id: card.id,
            name: format!("{} Bonus {}", bonus.category, completed_on.year()),
            description: format!("Earned by completing spending bonus: {}", bonus.description),
            magnitude: magnitude.unwrap_or_else(|| bonus.bonus_amount.clone()),
            frequency: Frequency::Annual,
            reset_date: Frequency::Annual.advance(completed_on, 1),
            reset_anchor: Some(completed_on),
            current_amount: None,
            required_amount: None,
            is_bonus_derived: true,
            source_bonus_id: Some(bonus.id),
        };

        tx.update_spending_bonus(&bonus).await?;
        tx.insert_credit(&credit).await?;
        tx.commit().await?;

        info!(
            card_name = %card.name,
            category = %bonus.category,
            credit_id = %credit.id,
            "Spending bonus completed and converted to credit"
        );
        Ok(credit.id)
    }

    /// Reverses `complete_spending_bonus`: deletes the synthesized credit and
    /// returns the bonus to `pending`.
    ///
    /// Both records must still exist on the card. A credit that is not derived
    /// from the given bonus is reported as an integrity fault and left untouched.
    pub async fn undo_spending_bonus_completion(
        &self,
        card_name: &str,
        credit_id: Uuid,
        spending_bonus_id: Uuid,
    ) -> PortResult<()> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;

        let credit = tx
            .get_credit(credit_id)
            .await?
            .filter(|c| c.card_id == card.id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Credit {} not found on card '{}'", credit_id, card.name))
            })?;
        let mut bonus = tx
            .get_spending_bonus(spending_bonus_id)
            .await?
            .filter(|b| b.card_id == card.id)
            .ok_or_else(|| {
                PortError::NotFound(format!(
                    "Spending bonus {} not found on card '{}'",
                    spending_bonus_id, card.name
                ))
            })?;

        if !credit.is_bonus_derived || credit.source_bonus_id != Some(bonus.id) {
            error!(
                credit_id = %credit.id,
                source_bonus_id = ?credit.source_bonus_id,
                spending_bonus_id = %bonus.id,
                "Credit is not linked to the spending bonus being undone"
            );
            return Err(PortError::IntegrityFault(format!(
                "Credit {} was not synthesized from spending bonus {}",
                credit.id, bonus.id
            )));
        }

        tx.delete_credit(credit.id).await?;
        tx.delete_usage_status(&credit.status_key()).await?;
        bonus.status = SpendingBonusStatus::Pending;
        bonus.completed_date = None;
        tx.update_spending_bonus(&bonus).await?;
        tx.commit().await?;

        info!(card_name = %card.name, category = %bonus.category, "Spending bonus completion undone");
        Ok(())
    }

    /// Closes the card's pending spending bonus for `category` as expired,
    /// without a credit. The annual sweep renews it in the following year.
    pub async fn expire_spending_bonus(
        &self,
        card_name: &str,
        category: &str,
        expired_on: NaiveDate,
    ) -> PortResult<SpendingBonus> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let mut bonus = find_pending_spending_bonus(&mut *tx, &card, category).await?;

        bonus.status = SpendingBonusStatus::Expired;
        bonus.completed_date = Some(expired_on);
        tx.update_spending_bonus(&bonus).await?;
        tx.commit().await?;

        info!(card_name = %card.name, category = %bonus.category, %expired_on, "Spending bonus expired");
        Ok(bonus)
    }

    /// Records the annual spend towards a pending spending bonus.
    pub async fn record_spending_bonus_spend(
        &self,
        card_name: &str,
        category: &str,
        current_spend: f64,
    ) -> PortResult<SpendingBonus> {
        validate_spend(current_spend)?;

        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let mut bonus = find_pending_spending_bonus(&mut *tx, &card, category).await?;
        bonus.current_spend = current_spend;
        tx.update_spending_bonus(&bonus).await?;
        tx.commit().await?;

        Ok(bonus)
    }

    //=====================================================================================
    // Sign-up Bonuses
    //=====================================================================================

    /// Marks a sign-up bonus as completed. Completing it twice is harmless.
    pub async fn complete_signup_bonus(
        &self,
        card_name: &str,
        description: &str,
    ) -> PortResult<SignupBonus> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let mut bonus = find_signup_bonus(&mut *tx, &card, description).await?;

        if bonus.status != SignupBonusStatus::Completed {
            bonus.status = SignupBonusStatus::Completed;
            tx.update_signup_bonus(&bonus).await?;
        }
        tx.commit().await?;

        info!(card_name = %card.name, bonus = %bonus.description, "Sign-up bonus completed");
        Ok(bonus)
    }

    /// Undoes a completion assertion. The bonus returns to `in-progress` when
    /// spend has been recorded and to `not-started` otherwise.
    pub async fn revert_signup_bonus(
        &self,
        card_name: &str,
        description: &str,
    ) -> PortResult<SignupBonus> {
        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let mut bonus = find_signup_bonus(&mut *tx, &card, description).await?;

        if bonus.status != SignupBonusStatus::Completed {
            return Err(PortError::Conflict(format!(
                "Sign-up bonus '{}' is {}, not completed",
                bonus.description,
                bonus.status.as_str()
            )));
        }
        bonus.status = status_for_spend(bonus.current_spend);
        tx.update_signup_bonus(&bonus).await?;
        tx.commit().await?;

        info!(
            card_name = %card.name,
            bonus = %bonus.description,
            status = bonus.status.as_str(),
            "Sign-up bonus reverted"
        );
        Ok(bonus)
    }

    /// Records spend progress on a sign-up bonus.
    ///
    /// Progress moves a bonus between `not-started` and `in-progress`; a
    /// completed bonus keeps its status since only the user can change it.
    pub async fn record_signup_spend(
        &self,
        card_name: &str,
        description: &str,
        current_spend: f64,
    ) -> PortResult<SignupBonus> {
        validate_spend(current_spend)?;

        let mut tx = self.store.begin().await?;
        let card = require_card(&mut *tx, card_name).await?;
        let mut bonus = find_signup_bonus(&mut *tx, &card, description).await?;

        bonus.current_spend = current_spend;
        if bonus.status != SignupBonusStatus::Completed {
            bonus.status = status_for_spend(current_spend);
        }
        tx.update_signup_bonus(&bonus).await?;
        tx.commit().await?;

        Ok(bonus)
    }
}

fn status_for_spend(current_spend: f64) -> SignupBonusStatus {
    if current_spend > 0.0 {
        SignupBonusStatus::InProgress
    } else {
        SignupBonusStatus::NotStarted
    }
}

async fn find_signup_bonus(
    tx: &mut dyn StoreTransaction,
    card: &Card,
    description: &str,
) -> PortResult<SignupBonus> {
    let wanted = slugify(description);
    tx.list_signup_bonuses(Some(card.id))
        .await?
        .into_iter()
        .find(|b| slugify(&b.description) == wanted)
        .ok_or_else(|| {
            PortError::NotFound(format!(
                "Sign-up bonus '{}' not found on card '{}'",
                description, card.name
            ))
        })
}

/// The card's pending bonus for `category`. A category whose bonuses are all
/// completed or expired is a conflict rather than a missing bonus.
async fn find_pending_spending_bonus(
    tx: &mut dyn StoreTransaction,
    card: &Card,
    category: &str,
) -> PortResult<SpendingBonus> {
    let wanted = slugify(category);
    let matching: Vec<SpendingBonus> = tx
        .list_spending_bonuses(SpendingBonusFilter {
            card_id: Some(card.id),
            status: None,
        })
        .await?
        .into_iter()
        .filter(|b| slugify(&b.category) == wanted)
        .collect();

    if matching.is_empty() {
        return Err(PortError::NotFound(format!(
            "Spending bonus '{}' not found on card '{}'",
            category, card.name
        )));
    }
    matching
        .into_iter()
        .find(|b| b.status == SpendingBonusStatus::Pending)
        .ok_or_else(|| {
            PortError::Conflict(format!(
                "Spending bonus '{}' on card '{}' is not pending",
                category, card.name
            ))
        })
}
