//! crates/benefit_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the benefit tracker.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Months, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::PortError;

//=========================================================================================
// Cards
//=========================================================================================

/// A physical card the user holds. Cards are never deleted automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: Uuid,
    pub issuer: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn new(issuer: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            issuer: issuer.trim().to_string(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

//=========================================================================================
// Frequencies and Magnitudes
//=========================================================================================

/// How often a statement credit becomes available again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Frequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
    OneTime,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::SemiAnnual,
        Frequency::Annual,
        Frequency::OneTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::SemiAnnual => "semi-annual",
            Frequency::Annual => "annual",
            Frequency::OneTime => "onetime",
        }
    }

    /// Length of one cycle in calendar months, or `None` for one-time credits.
    pub fn period_months(&self) -> Option<u32> {
        match self {
            Frequency::Monthly => Some(1),
            Frequency::Quarterly => Some(3),
            Frequency::SemiAnnual => Some(6),
            Frequency::Annual => Some(12),
            Frequency::OneTime => None,
        }
    }

    /// The reset date `cycles` periods after `anchor`.
    ///
    /// Month arithmetic is calendar based and clamps to the end of shorter
    /// months, so `2025-03-31` plus one quarter is `2025-06-30`. Counting from
    /// the anchor keeps a month-end anchor from drifting across cycles.
    pub fn advance(&self, anchor: NaiveDate, cycles: u32) -> Option<NaiveDate> {
        let months = self.period_months()?.checked_mul(cycles)?;
        anchor.checked_add_months(Months::new(months))
    }

    /// The first `anchor + k` periods, `k >= 1`, that falls on or after `day`.
    pub fn first_reset_on_or_after(&self, anchor: NaiveDate, day: NaiveDate) -> Option<NaiveDate> {
        let mut cycles = 1;
        loop {
            let next = self.advance(anchor, cycles)?;
            if next >= day {
                return Some(next);
            }
            cycles += 1;
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "semi-annual" | "semiannual" => Ok(Frequency::SemiAnnual),
            "annual" | "yearly" => Ok(Frequency::Annual),
            "onetime" | "one-time" => Ok(Frequency::OneTime),
            other => Err(PortError::InvalidInput(format!(
                "Unknown credit frequency '{}'",
                other
            ))),
        }
    }
}

/// The size of a reward: a dollar figure or a non-monetary quantity such as "1 Free Night".
#[derive(Debug, Clone, PartialEq)]
pub enum Magnitude {
    Dollars(f64),
    Other(String),
}

impl Magnitude {
    /// Dollar value used for sorting. Non-monetary rewards sort last.
    pub fn dollars(&self) -> f64 {
        match self {
            Magnitude::Dollars(amount) => *amount,
            Magnitude::Other(_) => 0.0,
        }
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magnitude::Dollars(amount) => write!(f, "${:.2}", amount),
            Magnitude::Other(text) => f.write_str(text),
        }
    }
}

impl FromStr for Magnitude {
    type Err = PortError;

    /// Parses `"$500"`, `"1,250.50"` or free text like `"1 Free Night"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PortError::InvalidInput("Empty magnitude".to_string()));
        }
        let numeric = trimmed.trim_start_matches('$').replace(',', "");
        match numeric.parse::<f64>() {
            Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(Magnitude::Dollars(amount)),
            Ok(_) => Err(PortError::InvalidInput(format!(
                "Invalid dollar amount '{}'",
                trimmed
            ))),
            Err(_) => Ok(Magnitude::Other(trimmed.to_string())),
        }
    }
}

//=========================================================================================
// Statement Credits and Usage Status
//=========================================================================================

/// A recurring or one-time statement credit belonging to a card.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditBenefit {
    pub id: Uuid,
    pub card_id: Uuid,
    pub name: String,
    pub description: String,
    pub magnitude: Magnitude,
    pub frequency: Frequency,
    /// Date after which the credit becomes available again.
    pub reset_date: Option<NaiveDate>,
    /// Day the reset cycle is counted from. Set once when the credit is
    /// defined; sweeps move `reset_date` but never this.
    pub reset_anchor: Option<NaiveDate>,
    /// Spend-earned credits carry `current_amount` of `required_amount`.
    pub current_amount: Option<f64>,
    pub required_amount: Option<f64>,
    pub is_bonus_derived: bool,
    pub source_bonus_id: Option<Uuid>,
}

impl CreditBenefit {
    /// The soft key this credit's usage status is stored under.
    pub fn status_key(&self) -> StatusKey {
        StatusKey::new(self.card_id, self.frequency, &self.name)
    }

    /// The reset date after `today` counted from the credit's anchor, or `None`
    /// when the credit is not due. A credit without an anchor counts from its
    /// current reset date.
    pub fn next_reset(&self, today: NaiveDate) -> Option<NaiveDate> {
        let reset_date = self.reset_date?;
        if reset_date >= today {
            return None;
        }
        self.frequency
            .first_reset_on_or_after(self.reset_anchor.unwrap_or(reset_date), today)
    }
}

/// Definition of a credit as handed over by an importer.
#[derive(Debug, Clone)]
pub struct NewCreditBenefit {
    pub name: String,
    pub description: String,
    pub magnitude: Magnitude,
    pub frequency: Frequency,
    pub reset_date: Option<NaiveDate>,
    pub required_amount: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageState {
    Available,
    Used,
}

impl UsageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageState::Available => "available",
            UsageState::Used => "used",
        }
    }
}

impl FromStr for UsageState {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(UsageState::Available),
            "used" => Ok(UsageState::Used),
            other => Err(PortError::InvalidInput(format!("Unknown usage state '{}'", other))),
        }
    }
}

/// Soft key joining a usage status to a credit: card id, frequency bucket and a
/// stable slug of the benefit name. No foreign key, so the status outlives a
/// redefinition of the credit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusKey {
    pub card_id: Uuid,
    pub frequency: Frequency,
    pub slug: String,
}

impl StatusKey {
    pub fn new(card_id: Uuid, frequency: Frequency, identifier: &str) -> Self {
        Self {
            card_id,
            frequency,
            slug: slugify(identifier),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreditUsageStatus {
    pub key: StatusKey,
    pub state: UsageState,
    pub updated_at: DateTime<Utc>,
}

/// Lowercases and collapses every run of non-alphanumerics into one `-`.
pub fn slugify(identifier: &str) -> String {
    let mut slug = String::with_capacity(identifier.len());
    for c in identifier.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

//=========================================================================================
// Sign-up Bonuses
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupBonusStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl SignupBonusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupBonusStatus::NotStarted => "not-started",
            SignupBonusStatus::InProgress => "in-progress",
            SignupBonusStatus::Completed => "completed",
        }
    }
}

impl FromStr for SignupBonusStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not-started" => Ok(SignupBonusStatus::NotStarted),
            "in-progress" => Ok(SignupBonusStatus::InProgress),
            "completed" => Ok(SignupBonusStatus::Completed),
            other => Err(PortError::InvalidInput(format!(
                "Unknown sign-up bonus status '{}'",
                other
            ))),
        }
    }
}

/// A time-limited welcome bonus with a spend target and a deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct SignupBonus {
    pub id: Uuid,
    pub card_id: Uuid,
    pub bonus_amount: String,
    pub description: String,
    pub required_spend: f64,
    pub current_spend: f64,
    pub deadline: Option<NaiveDate>,
    pub status: SignupBonusStatus,
    pub created_at: DateTime<Utc>,
}

impl SignupBonus {
    pub fn progress_percent(&self) -> f64 {
        progress_percent(self.current_spend, self.required_spend)
    }
}

#[derive(Debug, Clone)]
pub struct NewSignupBonus {
    pub bonus_amount: String,
    pub description: String,
    pub required_spend: f64,
    pub deadline: Option<NaiveDate>,
}

//=========================================================================================
// Spending (Threshold) Bonuses
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendingBonusStatus {
    Pending,
    Completed,
    Expired,
}

impl SpendingBonusStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpendingBonusStatus::Pending => "pending",
            SpendingBonusStatus::Completed => "completed",
            SpendingBonusStatus::Expired => "expired",
        }
    }
}

impl FromStr for SpendingBonusStatus {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SpendingBonusStatus::Pending),
            "completed" => Ok(SpendingBonusStatus::Completed),
            "expired" => Ok(SpendingBonusStatus::Expired),
            other => Err(PortError::InvalidInput(format!(
                "Unknown spending bonus status '{}'",
                other
            ))),
        }
    }
}

/// An ongoing bonus unlocked by cumulative annual spend, e.g. a free night after $15k.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingBonus {
    pub id: Uuid,
    pub card_id: Uuid,
    pub category: String,
    pub bonus_amount: Magnitude,
    pub description: String,
    pub required_spend: f64,
    pub current_spend: f64,
    pub status: SpendingBonusStatus,
    /// Day the bonus closed, either by completion or by expiring.
    pub completed_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl SpendingBonus {
    pub fn progress_percent(&self) -> f64 {
        progress_percent(self.current_spend, self.required_spend)
    }

    /// A fresh pending copy for a new annual cycle.
    pub fn renewed(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            current_spend: 0.0,
            status: SpendingBonusStatus::Pending,
            completed_date: None,
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSpendingBonus {
    pub category: String,
    pub bonus_amount: Magnitude,
    pub description: String,
    pub required_spend: f64,
}

//=========================================================================================
// Category Multipliers
//=========================================================================================

/// An earn rate on a spend category, e.g. 4x at restaurants capped at $25,000 a year.
#[derive(Debug, Clone, PartialEq)]
pub struct Multiplier {
    pub id: Uuid,
    pub card_id: Uuid,
    pub category: String,
    pub multiplier: f64,
    pub description: String,
    /// Spend cap the rate applies to, with the period it resets on.
    pub cap_amount: Option<f64>,
    pub cap_frequency: Option<Frequency>,
}

#[derive(Debug, Clone)]
pub struct NewMultiplier {
    pub category: String,
    pub multiplier: f64,
    pub description: String,
    pub cap_amount: Option<f64>,
    pub cap_frequency: Option<Frequency>,
}

/// `min(100, current / required * 100)`, with a zero requirement reporting 0.
pub fn progress_percent(current_spend: f64, required_spend: f64) -> f64 {
    if required_spend <= 0.0 {
        return 0.0;
    }
    (current_spend / required_spend * 100.0).clamp(0.0, 100.0)
}
