//! crates/benefit_tracker_core/src/memory.rs
//!
//! An in-memory implementation of the store ports.
//!
//! A transaction works on a private copy of the tables and swaps it in on
//! commit. A commit is refused when another transaction committed writes in the
//! meantime, so a unit of work is never applied partially or over a newer state.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    Card, CreditBenefit, CreditUsageStatus, Multiplier, SignupBonus, SpendingBonus, StatusKey,
};
use crate::ports::{
    BenefitStore, CreditFilter, PortError, PortResult, SpendingBonusFilter, StoreTransaction,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    cards: Vec<Card>,
    credits: Vec<CreditBenefit>,
    statuses: HashMap<StatusKey, CreditUsageStatus>,
    signup_bonuses: Vec<SignupBonus>,
    spending_bonuses: Vec<SpendingBonus>,
    multipliers: Vec<Multiplier>,
}

#[derive(Debug, Default)]
struct Shared {
    version: u64,
    tables: Tables,
    /// Credits whose updates are rejected, see `InMemoryStore::fail_updates_for`.
    failing_credits: HashSet<Uuid>,
    fail_next_commit: bool,
}

/// A process-local store, used for tests and demos.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later update of this credit fail.
    pub fn fail_updates_for(&self, credit_id: Uuid) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.failing_credits.insert(credit_id);
        }
    }

    /// Makes the next commit of a transaction with writes fail.
    pub fn fail_next_commit(&self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.fail_next_commit = true;
        }
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Shared>> {
        lock(&self.shared)
    }
}

fn lock(shared: &Mutex<Shared>) -> PortResult<MutexGuard<'_, Shared>> {
    shared
        .lock()
        .map_err(|_| PortError::Unexpected("In-memory store lock poisoned".to_string()))
}

#[async_trait]
impl BenefitStore for InMemoryStore {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let shared = self.lock()?;
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            base_version: shared.version,
            tables: shared.tables.clone(),
            failing_credits: shared.failing_credits.clone(),
            dirty: false,
        }))
    }
}

struct MemoryTransaction {
    shared: Arc<Mutex<Shared>>,
    base_version: u64,
    tables: Tables,
    failing_credits: HashSet<Uuid>,
    dirty: bool,
}

impl MemoryTransaction {
    fn credit_mut(&mut self, credit_id: Uuid) -> PortResult<&mut CreditBenefit> {
        self.tables
            .credits
            .iter_mut()
            .find(|c| c.id == credit_id)
            .ok_or_else(|| PortError::NotFound(format!("Credit {} not found", credit_id)))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_card(&mut self, card: &Card) -> PortResult<()> {
        if self.tables.cards.iter().any(|c| c.name == card.name) {
            return Err(PortError::Conflict(format!("Card '{}' already exists", card.name)));
        }
        self.tables.cards.push(card.clone());
        self.dirty = true;
        Ok(())
    }

    async fn find_card_by_name(&mut self, name: &str) -> PortResult<Option<Card>> {
        Ok(self.tables.cards.iter().find(|c| c.name == name).cloned())
    }

    async fn list_cards(&mut self) -> PortResult<Vec<Card>> {
        let mut cards = self.tables.cards.clone();
        cards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cards)
    }

    async fn update_card(&mut self, card: &Card) -> PortResult<()> {
        let slot = self
            .tables
            .cards
            .iter_mut()
            .find(|c| c.id == card.id)
            .ok_or_else(|| PortError::NotFound(format!("Card {} not found", card.id)))?;
        *slot = card.clone();
        self.dirty = true;
        Ok(())
    }

    async fn insert_credit(&mut self, credit: &CreditBenefit) -> PortResult<()> {
        self.tables.credits.push(credit.clone());
        self.dirty = true;
        Ok(())
    }

    async fn get_credit(&mut self, credit_id: Uuid) -> PortResult<Option<CreditBenefit>> {
        Ok(self.tables.credits.iter().find(|c| c.id == credit_id).cloned())
    }

    async fn list_credits(&mut self, filter: CreditFilter) -> PortResult<Vec<CreditBenefit>> {
        Ok(self
            .tables
            .credits
            .iter()
            .filter(|c| filter.card_id.map_or(true, |id| c.card_id == id))
            .filter(|c| filter.frequency.map_or(true, |f| c.frequency == f))
            .cloned()
            .collect())
    }

    async fn update_credit(&mut self, credit: &CreditBenefit) -> PortResult<()> {
        if self.failing_credits.contains(&credit.id) {
            return Err(PortError::Unexpected(format!(
                "Update of credit {} rejected",
                credit.id
            )));
        }
        *self.credit_mut(credit.id)? = credit.clone();
        self.dirty = true;
        Ok(())
    }

    async fn delete_credit(&mut self, credit_id: Uuid) -> PortResult<bool> {
        let before = self.tables.credits.len();
        self.tables.credits.retain(|c| c.id != credit_id);
        let deleted = self.tables.credits.len() != before;
        self.dirty |= deleted;
        Ok(deleted)
    }

    async fn get_usage_status(&mut self, key: &StatusKey) -> PortResult<Option<CreditUsageStatus>> {
        Ok(self.tables.statuses.get(key).cloned())
    }

    async fn list_usage_statuses(
        &mut self,
        card_id: Uuid,
        slug: &str,
    ) -> PortResult<Vec<CreditUsageStatus>> {
        Ok(self
            .tables
            .statuses
            .values()
            .filter(|s| s.key.card_id == card_id && s.key.slug == slug)
            .cloned()
            .collect())
    }

    async fn upsert_usage_status(&mut self, status: &CreditUsageStatus) -> PortResult<()> {
        self.tables
            .statuses
            .insert(status.key.clone(), status.clone());
        self.dirty = true;
        Ok(())
    }

    async fn delete_usage_status(&mut self, key: &StatusKey) -> PortResult<()> {
        self.dirty |= self.tables.statuses.remove(key).is_some();
        Ok(())
    }

    async fn insert_signup_bonus(&mut self, bonus: &SignupBonus) -> PortResult<()> {
        self.tables.signup_bonuses.push(bonus.clone());
        self.dirty = true;
        Ok(())
    }

    async fn list_signup_bonuses(&mut self, card_id: Option<Uuid>) -> PortResult<Vec<SignupBonus>> {
        Ok(self
            .tables
            .signup_bonuses
            .iter()
            .filter(|b| card_id.map_or(true, |id| b.card_id == id))
            .cloned()
            .collect())
    }

    async fn update_signup_bonus(&mut self, bonus: &SignupBonus) -> PortResult<()> {
        let slot = self
            .tables
            .signup_bonuses
            .iter_mut()
            .find(|b| b.id == bonus.id)
            .ok_or_else(|| PortError::NotFound(format!("Sign-up bonus {} not found", bonus.id)))?;
        *slot = bonus.clone();
        self.dirty = true;
        Ok(())
    }

    async fn insert_spending_bonus(&mut self, bonus: &SpendingBonus) -> PortResult<()> {
        self.tables.spending_bonuses.push(bonus.clone());
        self.dirty = true;
        Ok(())
    }

    async fn get_spending_bonus(&mut self, bonus_id: Uuid) -> PortResult<Option<SpendingBonus>> {
        Ok(self
            .tables
            .spending_bonuses
            .iter()
            .find(|b| b.id == bonus_id)
            .cloned())
    }

    async fn list_spending_bonuses(
        &mut self,
        filter: SpendingBonusFilter,
    ) -> PortResult<Vec<SpendingBonus>> {
        Ok(self
            .tables
            .spending_bonuses
            .iter()
            .filter(|b| filter.card_id.map_or(true, |id| b.card_id == id))
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .cloned()
            .collect())
    }

    async fn update_spending_bonus(&mut self, bonus: &SpendingBonus) -> PortResult<()> {
        let slot = self
            .tables
            .spending_bonuses
            .iter_mut()
            .find(|b| b.id == bonus.id)
            .ok_or_else(|| {
                PortError::NotFound(format!("Spending bonus {} not found", bonus.id))
            })?;
        *slot = bonus.clone();
        self.dirty = true;
        Ok(())
    }

    async fn insert_multiplier(&mut self, multiplier: &Multiplier) -> PortResult<()> {
        self.tables.multipliers.push(multiplier.clone());
        self.dirty = true;
        Ok(())
    }

    async fn list_multipliers(&mut self, card_id: Option<Uuid>) -> PortResult<Vec<Multiplier>> {
        Ok(self
            .tables
            .multipliers
            .iter()
            .filter(|m| card_id.map_or(true, |id| m.card_id == id))
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let this = *self;
        let mut shared = lock(&this.shared)?;
        if shared.fail_next_commit {
            shared.fail_next_commit = false;
            return Err(PortError::Transient("Injected commit failure".to_string()));
        }
        if shared.version != this.base_version {
            return Err(PortError::Transient(
                "Store changed since the transaction began".to_string(),
            ));
        }
        shared.tables = this.tables;
        shared.version += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        Ok(())
    }
}
