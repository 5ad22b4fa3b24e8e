//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `BenefitStore` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.
//!
//! Every unit of work runs inside a `sqlx` transaction. Dropping a
//! `SqliteTransaction` without committing rolls it back.

use async_trait::async_trait;
use benefit_tracker_core::domain::{
    Card, CreditBenefit, CreditUsageStatus, Frequency, Magnitude, Multiplier, SignupBonus,
    SpendingBonus, StatusKey,
};
use benefit_tracker_core::ports::{
    BenefitStore, CreditFilter, PortError, PortResult, SpendingBonusFilter, StoreTransaction,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `BenefitStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl BenefitStore for DbAdapter {
    async fn begin(&self) -> PortResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

/// Maps driver errors onto the port's error taxonomy.
fn store_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Transient(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn corrupt_row(table: &str, detail: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("Corrupt row in {}: {}", table, detail))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

/// Splits a magnitude over the `amount` and `magnitude_text` columns.
fn magnitude_columns(magnitude: &Magnitude) -> (Option<f64>, Option<String>) {
    match magnitude {
        Magnitude::Dollars(amount) => (Some(*amount), None),
        Magnitude::Other(text) => (None, Some(text.clone())),
    }
}

fn magnitude_from_columns(
    table: &str,
    amount: Option<f64>,
    text: Option<String>,
) -> PortResult<Magnitude> {
    match (amount, text) {
        (Some(amount), _) => Ok(Magnitude::Dollars(amount)),
        (None, Some(text)) => Ok(Magnitude::Other(text)),
        (None, None) => Err(corrupt_row(table, "magnitude is missing")),
    }
}

#[derive(FromRow)]
struct CardRecord {
    id: Uuid,
    issuer: String,
    name: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}
impl CardRecord {
    fn to_domain(self) -> Card {
        Card {
            id: self.id,
            issuer: self.issuer,
            name: self.name,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CreditRecord {
    id: Uuid,
    card_id: Uuid,
    name: String,
    description: String,
    amount: Option<f64>,
    magnitude_text: Option<String>,
    frequency: String,
    reset_date: Option<NaiveDate>,
    reset_anchor: Option<NaiveDate>,
    current_amount: Option<f64>,
    required_amount: Option<f64>,
    is_bonus_derived: bool,
    source_bonus_id: Option<Uuid>,
}
impl CreditRecord {
    fn to_domain(self) -> PortResult<CreditBenefit> {
        Ok(CreditBenefit {
            id: self.id,
            card_id: self.card_id,
            name: self.name,
            description: self.description,
            magnitude: magnitude_from_columns("credit_benefits", self.amount, self.magnitude_text)?,
            frequency: self
                .frequency
                .parse()
                .map_err(|e| corrupt_row("credit_benefits", e))?,
            reset_date: self.reset_date,
            reset_anchor: self.reset_anchor,
            current_amount: self.current_amount,
            required_amount: self.required_amount,
            is_bonus_derived: self.is_bonus_derived,
            source_bonus_id: self.source_bonus_id,
        })
    }
}

#[derive(FromRow)]
struct UsageStatusRecord {
    card_id: Uuid,
    frequency: String,
    slug: String,
    state: String,
    updated_at: DateTime<Utc>,
}
impl UsageStatusRecord {
    fn to_domain(self) -> PortResult<CreditUsageStatus> {
        let frequency: Frequency = self
            .frequency
            .parse()
            .map_err(|e| corrupt_row("credit_usage_status", e))?;
        Ok(CreditUsageStatus {
            key: StatusKey {
                card_id: self.card_id,
                frequency,
                slug: self.slug,
            },
            state: self
                .state
                .parse()
                .map_err(|e| corrupt_row("credit_usage_status", e))?,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SignupBonusRecord {
    id: Uuid,
    card_id: Uuid,
    bonus_amount: String,
    description: String,
    required_spend: f64,
    current_spend: f64,
    deadline: Option<NaiveDate>,
    status: String,
    created_at: DateTime<Utc>,
}
impl SignupBonusRecord {
    fn to_domain(self) -> PortResult<SignupBonus> {
        Ok(SignupBonus {
            id: self.id,
            card_id: self.card_id,
            bonus_amount: self.bonus_amount,
            description: self.description,
            required_spend: self.required_spend,
            current_spend: self.current_spend,
            deadline: self.deadline,
            status: self
                .status
                .parse()
                .map_err(|e| corrupt_row("signup_bonuses", e))?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct SpendingBonusRecord {
    id: Uuid,
    card_id: Uuid,
    category: String,
    amount: Option<f64>,
    magnitude_text: Option<String>,
    description: String,
    required_spend: f64,
    current_spend: f64,
    status: String,
    completed_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}
impl SpendingBonusRecord {
    fn to_domain(self) -> PortResult<SpendingBonus> {
        Ok(SpendingBonus {
            id: self.id,
            card_id: self.card_id,
            category: self.category,
            bonus_amount: magnitude_from_columns(
                "spending_bonuses",
                self.amount,
                self.magnitude_text,
            )?,
            description: self.description,
            required_spend: self.required_spend,
            current_spend: self.current_spend,
            status: self
                .status
                .parse()
                .map_err(|e| corrupt_row("spending_bonuses", e))?,
            completed_date: self.completed_date,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct MultiplierRecord {
    id: Uuid,
    card_id: Uuid,
    category: String,
    multiplier: f64,
    description: String,
    cap_amount: Option<f64>,
    cap_frequency: Option<String>,
}
impl MultiplierRecord {
    fn to_domain(self) -> PortResult<Multiplier> {
        Ok(Multiplier {
            id: self.id,
            card_id: self.card_id,
            category: self.category,
            multiplier: self.multiplier,
            description: self.description,
            cap_amount: self.cap_amount,
            cap_frequency: self
                .cap_frequency
                .map(|f| f.parse::<Frequency>())
                .transpose()
                .map_err(|e| corrupt_row("multipliers", e))?,
        })
    }
}

const CREDIT_COLUMNS: &str = "SELECT id, card_id, name, description, amount, magnitude_text, \
     frequency, reset_date, reset_anchor, current_amount, required_amount, is_bonus_derived, source_bonus_id \
     FROM credit_benefits";

const SPENDING_BONUS_COLUMNS: &str = "SELECT id, card_id, category, amount, magnitude_text, \
     description, required_spend, current_spend, status, completed_date, created_at \
     FROM spending_bonuses";

const SIGNUP_BONUS_COLUMNS: &str = "SELECT id, card_id, bonus_amount, description, \
     required_spend, current_spend, deadline, status, created_at FROM signup_bonuses";

//=========================================================================================
// `StoreTransaction` Trait Implementation
//=========================================================================================

/// One open database transaction.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

fn ensure_updated(rows_affected: u64, what: &str, id: Uuid) -> PortResult<()> {
    if rows_affected == 0 {
        return Err(PortError::NotFound(format!("{} {} not found", what, id)));
    }
    Ok(())
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn insert_card(&mut self, card: &Card) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO cards (id, issuer, name, is_active, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(card.id)
        .bind(&card.issuer)
        .bind(&card.name)
        .bind(card.is_active)
        .bind(card.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match store_error(e) {
            PortError::Conflict(_) => {
                PortError::Conflict(format!("Card '{}' already exists", card.name))
            }
            other => other,
        })?;
        Ok(())
    }

    async fn find_card_by_name(&mut self, name: &str) -> PortResult<Option<Card>> {
        let record = sqlx::query_as::<_, CardRecord>(
            "SELECT id, issuer, name, is_active, created_at FROM cards WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(record.map(CardRecord::to_domain))
    }

    async fn list_cards(&mut self) -> PortResult<Vec<Card>> {
        let records = sqlx::query_as::<_, CardRecord>(
            "SELECT id, issuer, name, is_active, created_at FROM cards ORDER BY name",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(records.into_iter().map(CardRecord::to_domain).collect())
    }

    async fn update_card(&mut self, card: &Card) -> PortResult<()> {
        let result = sqlx::query("UPDATE cards SET issuer = ?, name = ?, is_active = ? WHERE id = ?")
            .bind(&card.issuer)
            .bind(&card.name)
            .bind(card.is_active)
            .bind(card.id)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        ensure_updated(result.rows_affected(), "Card", card.id)
    }

    async fn insert_credit(&mut self, credit: &CreditBenefit) -> PortResult<()> {
        let (amount, magnitude_text) = magnitude_columns(&credit.magnitude);
        sqlx::query(
            "INSERT INTO credit_benefits (id, card_id, name, description, amount, magnitude_text, \
             frequency, reset_date, reset_anchor, current_amount, required_amount, \
             is_bonus_derived, source_bonus_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(credit.id)
        .bind(credit.card_id)
        .bind(&credit.name)
        .bind(&credit.description)
        .bind(amount)
        .bind(magnitude_text)
        .bind(credit.frequency.as_str())
        .bind(credit.reset_date)
        .bind(credit.reset_anchor)
        .bind(credit.current_amount)
        .bind(credit.required_amount)
        .bind(credit.is_bonus_derived)
        .bind(credit.source_bonus_id)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get_credit(&mut self, credit_id: Uuid) -> PortResult<Option<CreditBenefit>> {
        let record = sqlx::query_as::<_, CreditRecord>(&format!("{} WHERE id = ?", CREDIT_COLUMNS))
            .bind(credit_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        record.map(CreditRecord::to_domain).transpose()
    }

    async fn list_credits(&mut self, filter: CreditFilter) -> PortResult<Vec<CreditBenefit>> {
        let mut query = QueryBuilder::<Sqlite>::new(CREDIT_COLUMNS);
        query.push(" WHERE 1 = 1");
        if let Some(card_id) = filter.card_id {
            query.push(" AND card_id = ").push_bind(card_id);
        }
        if let Some(frequency) = filter.frequency {
            query.push(" AND frequency = ").push_bind(frequency.as_str());
        }
        query.push(" ORDER BY name");

        let records = query
            .build_query_as::<CreditRecord>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        records.into_iter().map(CreditRecord::to_domain).collect()
    }

    async fn update_credit(&mut self, credit: &CreditBenefit) -> PortResult<()> {
        let (amount, magnitude_text) = magnitude_columns(&credit.magnitude);
        let result = sqlx::query(
            "UPDATE credit_benefits SET name = ?, description = ?, amount = ?, \
             magnitude_text = ?, frequency = ?, reset_date = ?, reset_anchor = ?, \
             current_amount = ?, required_amount = ?, is_bonus_derived = ?, source_bonus_id = ? WHERE id = ?",
        )
        .bind(&credit.name)
        .bind(&credit.description)
        .bind(amount)
        .bind(magnitude_text)
        .bind(credit.frequency.as_str())
        .bind(credit.reset_date)
        .bind(credit.reset_anchor)
        .bind(credit.current_amount)
        .bind(credit.required_amount)
        .bind(credit.is_bonus_derived)
        .bind(credit.source_bonus_id)
        .bind(credit.id)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        ensure_updated(result.rows_affected(), "Credit", credit.id)
    }

    async fn delete_credit(&mut self, credit_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM credit_benefits WHERE id = ?")
            .bind(credit_id)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_usage_status(&mut self, key: &StatusKey) -> PortResult<Option<CreditUsageStatus>> {
        let record = sqlx::query_as::<_, UsageStatusRecord>(
            "SELECT card_id, frequency, slug, state, updated_at FROM credit_usage_status \
             WHERE card_id = ? AND frequency = ? AND slug = ?",
        )
        .bind(key.card_id)
        .bind(key.frequency.as_str())
        .bind(&key.slug)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;
        record.map(UsageStatusRecord::to_domain).transpose()
    }

    async fn list_usage_statuses(
        &mut self,
        card_id: Uuid,
        slug: &str,
    ) -> PortResult<Vec<CreditUsageStatus>> {
        let records = sqlx::query_as::<_, UsageStatusRecord>(
            "SELECT card_id, frequency, slug, state, updated_at FROM credit_usage_status \
             WHERE card_id = ? AND slug = ?",
        )
        .bind(card_id)
        .bind(slug)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?;
        records.into_iter().map(UsageStatusRecord::to_domain).collect()
    }

    async fn upsert_usage_status(&mut self, status: &CreditUsageStatus) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO credit_usage_status (card_id, frequency, slug, state, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (card_id, frequency, slug) \
             DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
        )
        .bind(status.key.card_id)
        .bind(status.key.frequency.as_str())
        .bind(&status.key.slug)
        .bind(status.state.as_str())
        .bind(status.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn delete_usage_status(&mut self, key: &StatusKey) -> PortResult<()> {
        sqlx::query(
            "DELETE FROM credit_usage_status WHERE card_id = ? AND frequency = ? AND slug = ?",
        )
        .bind(key.card_id)
        .bind(key.frequency.as_str())
        .bind(&key.slug)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn insert_signup_bonus(&mut self, bonus: &SignupBonus) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO signup_bonuses (id, card_id, bonus_amount, description, required_spend, \
             current_spend, deadline, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(bonus.id)
        .bind(bonus.card_id)
        .bind(&bonus.bonus_amount)
        .bind(&bonus.description)
        .bind(bonus.required_spend)
        .bind(bonus.current_spend)
        .bind(bonus.deadline)
        .bind(bonus.status.as_str())
        .bind(bonus.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn list_signup_bonuses(&mut self, card_id: Option<Uuid>) -> PortResult<Vec<SignupBonus>> {
        let mut query = QueryBuilder::<Sqlite>::new(SIGNUP_BONUS_COLUMNS);
        if let Some(card_id) = card_id {
            query.push(" WHERE card_id = ").push_bind(card_id);
        }
        query.push(" ORDER BY created_at");

        let records = query
            .build_query_as::<SignupBonusRecord>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        records.into_iter().map(SignupBonusRecord::to_domain).collect()
    }

    async fn update_signup_bonus(&mut self, bonus: &SignupBonus) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE signup_bonuses SET bonus_amount = ?, description = ?, required_spend = ?, \
             current_spend = ?, deadline = ?, status = ? WHERE id = ?",
        )
        .bind(&bonus.bonus_amount)
        .bind(&bonus.description)
        .bind(bonus.required_spend)
        .bind(bonus.current_spend)
        .bind(bonus.deadline)
        .bind(bonus.status.as_str())
        .bind(bonus.id)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        ensure_updated(result.rows_affected(), "Sign-up bonus", bonus.id)
    }

    async fn insert_spending_bonus(&mut self, bonus: &SpendingBonus) -> PortResult<()> {
        let (amount, magnitude_text) = magnitude_columns(&bonus.bonus_amount);
        sqlx::query(
            "INSERT INTO spending_bonuses (id, card_id, category, amount, magnitude_text, \
             description, required_spend, current_spend, status, completed_date, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(bonus.id)
        .bind(bonus.card_id)
        .bind(&bonus.category)
        .bind(amount)
        .bind(magnitude_text)
        .bind(&bonus.description)
        .bind(bonus.required_spend)
        .bind(bonus.current_spend)
        .bind(bonus.status.as_str())
        .bind(bonus.completed_date)
        .bind(bonus.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get_spending_bonus(&mut self, bonus_id: Uuid) -> PortResult<Option<SpendingBonus>> {
        let record = sqlx::query_as::<_, SpendingBonusRecord>(&format!(
            "{} WHERE id = ?",
            SPENDING_BONUS_COLUMNS
        ))
        .bind(bonus_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;
        record.map(SpendingBonusRecord::to_domain).transpose()
    }

    async fn list_spending_bonuses(
        &mut self,
        filter: SpendingBonusFilter,
    ) -> PortResult<Vec<SpendingBonus>> {
        let mut query = QueryBuilder::<Sqlite>::new(SPENDING_BONUS_COLUMNS);
        query.push(" WHERE 1 = 1");
        if let Some(card_id) = filter.card_id {
            query.push(" AND card_id = ").push_bind(card_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at");

        let records = query
            .build_query_as::<SpendingBonusRecord>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        records.into_iter().map(SpendingBonusRecord::to_domain).collect()
    }

    async fn update_spending_bonus(&mut self, bonus: &SpendingBonus) -> PortResult<()> {
        let (amount, magnitude_text) = magnitude_columns(&bonus.bonus_amount);
        let result = sqlx::query(
            "UPDATE spending_bonuses SET category = ?, amount = ?, magnitude_text = ?, \
             description = ?, required_spend = ?, current_spend = ?, status = ?, \
             completed_date = ? WHERE id = ?",
        )
        .bind(&bonus.category)
        .bind(amount)
        .bind(magnitude_text)
        .bind(&bonus.description)
        .bind(bonus.required_spend)
        .bind(bonus.current_spend)
        .bind(bonus.status.as_str())
        .bind(bonus.completed_date)
        .bind(bonus.id)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        ensure_updated(result.rows_affected(), "Spending bonus", bonus.id)
    }

    async fn insert_multiplier(&mut self, multiplier: &Multiplier) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO multipliers (id, card_id, category, multiplier, description, cap_amount, \
             cap_frequency) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(multiplier.id)
        .bind(multiplier.card_id)
        .bind(&multiplier.category)
        .bind(multiplier.multiplier)
        .bind(&multiplier.description)
        .bind(multiplier.cap_amount)
        .bind(multiplier.cap_frequency.map(|f| f.as_str()))
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn list_multipliers(&mut self, card_id: Option<Uuid>) -> PortResult<Vec<Multiplier>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, card_id, category, multiplier, description, cap_amount, cap_frequency \
             FROM multipliers",
        );
        if let Some(card_id) = card_id {
            query.push(" WHERE card_id = ").push_bind(card_id);
        }
        query.push(" ORDER BY category");

        let records = query
            .build_query_as::<MultiplierRecord>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(store_error)?;
        records.into_iter().map(MultiplierRecord::to_domain).collect()
    }

    async fn commit(self: Box<Self>) -> PortResult<()> {
        let SqliteTransaction { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| PortError::Transient(format!("Commit failed: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> PortResult<()> {
        let SqliteTransaction { tx } = *self;
        tx.rollback().await.map_err(store_error)
    }
}
