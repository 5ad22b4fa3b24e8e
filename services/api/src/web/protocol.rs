//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the dashboard and the API server.

use benefit_tracker_core::{
    Card, CardDetails, CreditView, Magnitude, Multiplier, SignupBonus, SignupBonusView,
    SpendingBonus, SpendingBonusView,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Payloads Sent FROM the Client TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateCardRequest {
    pub issuer: String,
    pub name: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateCreditRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// A dollar figure such as `"$300"` or free text such as `"1 Free Night"`.
    pub amount: String,
    /// One of `monthly`, `quarterly`, `semi-annual`, `annual` or `onetime`.
    pub frequency: String,
    pub reset_date: Option<NaiveDate>,
    pub required_amount: Option<f64>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateSignupBonusRequest {
    pub bonus_amount: String,
    pub description: String,
    pub required_spend: f64,
    pub deadline: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateSpendingBonusRequest {
    pub category: String,
    pub bonus_amount: String,
    #[serde(default)]
    pub description: String,
    pub required_spend: f64,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateMultiplierRequest {
    pub category: String,
    pub multiplier: f64,
    #[serde(default)]
    pub description: String,
    /// Capped spend the rate applies to. Absent or `0` means uncapped.
    pub cap_amount: Option<f64>,
    pub cap_frequency: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreditsQuery {
    pub frequency: String,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreditStatusQuery {
    pub card_name: String,
    pub frequency: String,
    pub identifier: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct MarkUsedRequest {
    pub card_name: String,
    pub frequency: String,
    pub identifier: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct MarkAvailableRequest {
    pub card_name: String,
    pub identifier: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CompleteSpendingBonusRequest {
    pub card_name: String,
    pub category: String,
    /// Overrides the bonus's own amount on the synthesized credit.
    pub magnitude: Option<String>,
    /// Defaults to today.
    pub completed_on: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ExpireSpendingBonusRequest {
    pub card_name: String,
    pub category: String,
    /// Defaults to today.
    pub expired_on: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UndoSpendingBonusRequest {
    pub card_name: String,
    pub credit_id: Uuid,
    pub spending_bonus_id: Uuid,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SpendingBonusSpendRequest {
    pub card_name: String,
    pub category: String,
    pub current_spend: f64,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SignupBonusRequest {
    pub card_name: String,
    pub description: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SignupSpendRequest {
    pub card_name: String,
    pub description: String,
    pub current_spend: f64,
}

#[derive(Deserialize, Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SweepQuery {
    /// The day to sweep for. Defaults to today in the server's local time zone.
    pub today: Option<NaiveDate>,
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CardResponse {
    pub id: Uuid,
    pub issuer: String,
    pub name: String,
    pub is_active: bool,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            issuer: card.issuer,
            name: card.name,
            is_active: card.is_active,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CreditResponse {
    pub id: Uuid,
    pub card_name: String,
    pub name: String,
    pub description: String,
    /// Display form of the credit's value.
    pub magnitude: String,
    /// Dollar value, absent for non-monetary rewards.
    pub amount: Option<f64>,
    pub frequency: String,
    pub reset_date: Option<NaiveDate>,
    pub current_amount: Option<f64>,
    pub required_amount: Option<f64>,
    pub is_bonus_derived: bool,
    pub source_bonus_id: Option<Uuid>,
    /// `available` or `used`.
    pub status: String,
    pub status_updated_at: Option<DateTime<Utc>>,
}

fn dollar_amount(magnitude: &Magnitude) -> Option<f64> {
    match magnitude {
        Magnitude::Dollars(amount) => Some(*amount),
        Magnitude::Other(_) => None,
    }
}

impl From<CreditView> for CreditResponse {
    fn from(view: CreditView) -> Self {
        let credit = view.credit;
        Self {
            id: credit.id,
            card_name: view.card_name,
            name: credit.name,
            description: credit.description,
            magnitude: credit.magnitude.to_string(),
            amount: dollar_amount(&credit.magnitude),
            frequency: credit.frequency.to_string(),
            reset_date: credit.reset_date,
            current_amount: credit.current_amount,
            required_amount: credit.required_amount,
            is_bonus_derived: credit.is_bonus_derived,
            source_bonus_id: credit.source_bonus_id,
            status: view.state.as_str().to_string(),
            status_updated_at: view.status_updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CreditStatusResponse {
    pub card_name: String,
    pub frequency: String,
    pub identifier: String,
    pub status: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct MarkAvailableResponse {
    /// How many frequency buckets were flipped back to available.
    pub updated: usize,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CompleteSpendingBonusResponse {
    pub credit_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SignupBonusResponse {
    pub id: Uuid,
    pub card_name: String,
    pub bonus_amount: String,
    pub description: String,
    pub required_spend: f64,
    pub current_spend: f64,
    pub deadline: Option<NaiveDate>,
    pub status: String,
    pub progress_percent: f64,
}

impl SignupBonusResponse {
    pub fn new(card_name: String, bonus: SignupBonus) -> Self {
        Self {
            progress_percent: bonus.progress_percent(),
            id: bonus.id,
            card_name,
            bonus_amount: bonus.bonus_amount,
            description: bonus.description,
            required_spend: bonus.required_spend,
            current_spend: bonus.current_spend,
            deadline: bonus.deadline,
            status: bonus.status.as_str().to_string(),
        }
    }
}

impl From<SignupBonusView> for SignupBonusResponse {
    fn from(view: SignupBonusView) -> Self {
        Self::new(view.card_name, view.bonus)
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SpendingBonusResponse {
    pub id: Uuid,
    pub card_name: String,
    pub category: String,
    pub bonus_amount: String,
    pub description: String,
    pub required_spend: f64,
    pub current_spend: f64,
    pub status: String,
    pub completed_date: Option<NaiveDate>,
    pub progress_percent: f64,
}

impl SpendingBonusResponse {
    pub fn new(card_name: String, bonus: SpendingBonus) -> Self {
        Self {
            progress_percent: bonus.progress_percent(),
            id: bonus.id,
            card_name,
            category: bonus.category,
            bonus_amount: bonus.bonus_amount.to_string(),
            description: bonus.description,
            required_spend: bonus.required_spend,
            current_spend: bonus.current_spend,
            status: bonus.status.as_str().to_string(),
            completed_date: bonus.completed_date,
        }
    }
}

impl From<SpendingBonusView> for SpendingBonusResponse {
    fn from(view: SpendingBonusView) -> Self {
        Self::new(view.card_name, view.bonus)
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct MultiplierResponse {
    pub id: Uuid,
    pub category: String,
    pub multiplier: f64,
    pub description: String,
    pub cap_amount: Option<f64>,
    pub cap_frequency: Option<String>,
}

impl From<Multiplier> for MultiplierResponse {
    fn from(multiplier: Multiplier) -> Self {
        Self {
            id: multiplier.id,
            category: multiplier.category,
            multiplier: multiplier.multiplier,
            description: multiplier.description,
            cap_amount: multiplier.cap_amount,
            cap_frequency: multiplier.cap_frequency.map(|f| f.to_string()),
        }
    }
}

/// A card with every benefit recorded for it.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CardDetailsResponse {
    pub card: CardResponse,
    pub credits: Vec<CreditResponse>,
    pub signup_bonuses: Vec<SignupBonusResponse>,
    pub spending_bonuses: Vec<SpendingBonusResponse>,
    pub multipliers: Vec<MultiplierResponse>,
}

impl From<CardDetails> for CardDetailsResponse {
    fn from(details: CardDetails) -> Self {
        Self {
            card: CardResponse::from(details.card),
            credits: details.credits.into_iter().map(CreditResponse::from).collect(),
            signup_bonuses: details
                .signup_bonuses
                .into_iter()
                .map(SignupBonusResponse::from)
                .collect(),
            spending_bonuses: details
                .spending_bonuses
                .into_iter()
                .map(SpendingBonusResponse::from)
                .collect(),
            multipliers: details
                .multipliers
                .into_iter()
                .map(MultiplierResponse::from)
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ResetSweepResponse {
    pub today: NaiveDate,
    pub resets_applied: usize,
    pub failures: usize,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct AnnualSweepResponse {
    pub today: NaiveDate,
    pub bonuses_recreated: usize,
}
