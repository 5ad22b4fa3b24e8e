//! crates/benefit_tracker_core/src/ports.rs
//!
//! Defines the persistence contracts (traits) the benefit engine depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of a specific database.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Card, CreditBenefit, CreditUsageStatus, Frequency, Multiplier, SignupBonus, SpendingBonus,
    SpendingBonusStatus, StatusKey,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and engine operations.
/// This abstracts away the specific errors from the underlying store.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The two halves of a bonus conversion disagree with each other.
    #[error("Integrity fault: {0}")]
    IntegrityFault(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The store could not commit; nothing from the operation was persisted.
    #[error("Transient store failure: {0}")]
    Transient(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Query Filters
//=========================================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct CreditFilter {
    pub card_id: Option<Uuid>,
    pub frequency: Option<Frequency>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpendingBonusFilter {
    pub card_id: Option<Uuid>,
    pub status: Option<SpendingBonusStatus>,
}

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

/// Entry point to the persistent store. Every engine operation opens exactly
/// one transaction through it.
#[async_trait]
pub trait BenefitStore: Send + Sync {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>>;
}

/// A unit of work against the store.
///
/// Writes only become visible through `commit`. Dropping a transaction without
/// committing discards every write made through it.
#[async_trait]
pub trait StoreTransaction: Send {
    // --- Cards ---
    async fn insert_card(&mut self, card: &Card) -> PortResult<()>;

    async fn find_card_by_name(&mut self, name: &str) -> PortResult<Option<Card>>;

    async fn list_cards(&mut self) -> PortResult<Vec<Card>>;

    async fn update_card(&mut self, card: &Card) -> PortResult<()>;

    // --- Credit Benefits ---
    async fn insert_credit(&mut self, credit: &CreditBenefit) -> PortResult<()>;

    async fn get_credit(&mut self, credit_id: Uuid) -> PortResult<Option<CreditBenefit>>;

    async fn list_credits(&mut self, filter: CreditFilter) -> PortResult<Vec<CreditBenefit>>;

    async fn update_credit(&mut self, credit: &CreditBenefit) -> PortResult<()>;

    /// Returns `false` when no credit had that id.
    async fn delete_credit(&mut self, credit_id: Uuid) -> PortResult<bool>;

    // --- Usage Status ---
    async fn get_usage_status(&mut self, key: &StatusKey) -> PortResult<Option<CreditUsageStatus>>;

    /// Every status recorded for a card and slug, across frequency buckets.
    async fn list_usage_statuses(
        &mut self,
        card_id: Uuid,
        slug: &str,
    ) -> PortResult<Vec<CreditUsageStatus>>;

    /// Inserts or overwrites the single record stored under `status.key`.
    async fn upsert_usage_status(&mut self, status: &CreditUsageStatus) -> PortResult<()>;

    async fn delete_usage_status(&mut self, key: &StatusKey) -> PortResult<()>;

    // --- Sign-up Bonuses ---
    async fn insert_signup_bonus(&mut self, bonus: &SignupBonus) -> PortResult<()>;

    async fn list_signup_bonuses(&mut self, card_id: Option<Uuid>) -> PortResult<Vec<SignupBonus>>;

    async fn update_signup_bonus(&mut self, bonus: &SignupBonus) -> PortResult<()>;

    // --- Spending Bonuses ---
    async fn insert_spending_bonus(&mut self, bonus: &SpendingBonus) -> PortResult<()>;

    async fn get_spending_bonus(&mut self, bonus_id: Uuid) -> PortResult<Option<SpendingBonus>>;

    async fn list_spending_bonuses(
        &mut self,
        filter: SpendingBonusFilter,
    ) -> PortResult<Vec<SpendingBonus>>;

    async fn update_spending_bonus(&mut self, bonus: &SpendingBonus) -> PortResult<()>;

    // --- Multipliers ---
    async fn insert_multiplier(&mut self, multiplier: &Multiplier) -> PortResult<()>;

    async fn list_multipliers(&mut self, card_id: Option<Uuid>) -> PortResult<Vec<Multiplier>>;

    // --- Transaction Boundary ---
    async fn commit(self: Box<Self>) -> PortResult<()>;

    async fn rollback(self: Box<Self>) -> PortResult<()>;
}
