//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints, the router that wires
//! them together, and the master definition for the OpenAPI specification.

use crate::web::protocol::{
    AnnualSweepResponse, CardDetailsResponse, CardResponse, CompleteSpendingBonusRequest,
    CompleteSpendingBonusResponse, CreateCardRequest, CreateCreditRequest,
    CreateMultiplierRequest, CreateSignupBonusRequest, CreateSpendingBonusRequest,
    CreditResponse, CreditStatusQuery, CreditStatusResponse, CreditsQuery,
    ExpireSpendingBonusRequest, MarkAvailableRequest, MarkAvailableResponse, MarkUsedRequest,
    MultiplierResponse, ResetSweepResponse, SignupBonusRequest, SignupBonusResponse,
    SignupSpendRequest, SpendingBonusResponse, SpendingBonusSpendRequest, SweepQuery,
    UndoSpendingBonusRequest,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use benefit_tracker_core::{
    CreditView, Frequency, Magnitude, NewCreditBenefit, NewMultiplier, NewSignupBonus,
    NewSpendingBonus, PortError, UsageState,
};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_cards_handler,
        create_card_handler,
        card_details_handler,
        activate_card_handler,
        deactivate_card_handler,
        list_multipliers_handler,
        create_multiplier_handler,
        create_credit_handler,
        create_signup_bonus_handler,
        create_spending_bonus_handler,
        list_credits_handler,
        credit_status_handler,
        mark_used_handler,
        list_used_credits_handler,
        mark_available_handler,
        list_signup_bonuses_handler,
        complete_signup_bonus_handler,
        revert_signup_bonus_handler,
        record_signup_spend_handler,
        list_spending_bonuses_handler,
        complete_spending_bonus_handler,
        expire_spending_bonus_handler,
        undo_spending_bonus_handler,
        record_spending_bonus_spend_handler,
        reset_sweep_handler,
        annual_sweep_handler,
    ),
    components(
        schemas(
            CardResponse, CreateCardRequest, CreateCreditRequest, CreateSignupBonusRequest,
            CreateSpendingBonusRequest, CreditResponse, CreditStatusResponse, MarkUsedRequest,
            MarkAvailableRequest, MarkAvailableResponse, CompleteSpendingBonusRequest,
            CompleteSpendingBonusResponse, UndoSpendingBonusRequest, SpendingBonusSpendRequest,
            SignupBonusRequest, SignupSpendRequest, SignupBonusResponse, SpendingBonusResponse,
            ResetSweepResponse, AnnualSweepResponse, CardDetailsResponse,
            CreateMultiplierRequest, MultiplierResponse, ExpireSpendingBonusRequest
        )
    ),
    tags(
        (name = "Benefit Tracker API", description = "Card benefits, usage tracking and reset maintenance.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Builds the API router with every REST endpoint.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/cards", get(list_cards_handler).post(create_card_handler))
        .route("/cards/{card_name}", get(card_details_handler))
        .route("/cards/{card_name}/activate", post(activate_card_handler))
        .route("/cards/{card_name}/deactivate", post(deactivate_card_handler))
        .route(
            "/cards/{card_name}/multipliers",
            get(list_multipliers_handler).post(create_multiplier_handler),
        )
        .route("/cards/{card_name}/credits", post(create_credit_handler))
        .route(
            "/cards/{card_name}/signup-bonuses",
            post(create_signup_bonus_handler),
        )
        .route(
            "/cards/{card_name}/spending-bonuses",
            post(create_spending_bonus_handler),
        )
        .route("/credits", get(list_credits_handler))
        .route("/credits/status", get(credit_status_handler))
        .route(
            "/credits/used",
            get(list_used_credits_handler).post(mark_used_handler),
        )
        .route("/credits/available", post(mark_available_handler))
        .route("/signup-bonuses", get(list_signup_bonuses_handler))
        .route("/signup-bonuses/complete", post(complete_signup_bonus_handler))
        .route("/signup-bonuses/revert", post(revert_signup_bonus_handler))
        .route("/signup-bonuses/spend", post(record_signup_spend_handler))
        .route("/spending-bonuses", get(list_spending_bonuses_handler))
        .route(
            "/spending-bonuses/complete",
            post(complete_spending_bonus_handler),
        )
        .route("/spending-bonuses/expire", post(expire_spending_bonus_handler))
        .route("/spending-bonuses/undo", post(undo_spending_bonus_handler))
        .route(
            "/spending-bonuses/spend",
            post(record_spending_bonus_spend_handler),
        )
        .route("/maintenance/reset-sweep", post(reset_sweep_handler))
        .route("/maintenance/annual-sweep", post(annual_sweep_handler))
        .with_state(app_state)
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerResult<T> = Result<T, (StatusCode, String)>;

/// Maps a port error onto an HTTP status. Server-side failures are logged.
fn port_error_response(e: PortError) -> (StatusCode, String) {
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::IntegrityFault(_) | PortError::Unexpected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    (status, e.to_string())
}

fn parse_frequency(value: &str) -> HandlerResult<Frequency> {
    value.parse().map_err(port_error_response)
}

fn parse_magnitude(value: &str) -> HandlerResult<Magnitude> {
    value.parse().map_err(port_error_response)
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

//=========================================================================================
// Cards and Benefit Definitions
//=========================================================================================

/// List every card.
#[utoipa::path(
    get,
    path = "/cards",
    responses((status = 200, description = "All cards, by name", body = [CardResponse]))
)]
pub async fn list_cards_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cards = app_state
        .engine
        .list_cards()
        .await
        .map_err(port_error_response)?;
    let response: Vec<CardResponse> = cards.into_iter().map(CardResponse::from).collect();
    Ok(Json(response))
}

/// Register a card.
#[utoipa::path(
    post,
    path = "/cards",
    request_body = CreateCardRequest,
    responses(
        (status = 201, description = "Card created", body = CardResponse),
        (status = 409, description = "A card with this name already exists")
    )
)]
pub async fn create_card_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CreateCardRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let card = app_state
        .engine
        .add_card(&req.issuer, &req.name)
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(CardResponse::from(card))))
}

/// Everything recorded for one card, including completed bonuses.
#[utoipa::path(
    get,
    path = "/cards/{card_name}",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    responses(
        (status = 200, description = "Card details", body = CardDetailsResponse),
        (status = 404, description = "Card not found")
    )
)]
pub async fn card_details_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let details = app_state
        .engine
        .card_details(&card_name)
        .await
        .map_err(port_error_response)?;
    Ok(Json(CardDetailsResponse::from(details)))
}

/// Put a card back on the dashboards.
#[utoipa::path(
    post,
    path = "/cards/{card_name}/activate",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    responses(
        (status = 200, description = "Card activated", body = CardResponse),
        (status = 404, description = "Card not found")
    )
)]
pub async fn activate_card_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let card = app_state
        .engine
        .set_card_active(&card_name, true)
        .await
        .map_err(port_error_response)?;
    Ok(Json(CardResponse::from(card)))
}

/// Hide a card from the dashboards without deleting anything.
#[utoipa::path(
    post,
    path = "/cards/{card_name}/deactivate",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    responses(
        (status = 200, description = "Card deactivated", body = CardResponse),
        (status = 404, description = "Card not found")
    )
)]
pub async fn deactivate_card_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let card = app_state
        .engine
        .set_card_active(&card_name, false)
        .await
        .map_err(port_error_response)?;
    Ok(Json(CardResponse::from(card)))
}

/// List a card's earn multipliers, highest rate first.
#[utoipa::path(
    get,
    path = "/cards/{card_name}/multipliers",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    responses(
        (status = 200, description = "Multipliers", body = [MultiplierResponse]),
        (status = 404, description = "Card not found")
    )
)]
pub async fn list_multipliers_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let multipliers = app_state
        .engine
        .card_multipliers(&card_name)
        .await
        .map_err(port_error_response)?;
    let response: Vec<MultiplierResponse> =
        multipliers.into_iter().map(MultiplierResponse::from).collect();
    Ok(Json(response))
}

/// Add an earn multiplier to a card.
#[utoipa::path(
    post,
    path = "/cards/{card_name}/multipliers",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    request_body = CreateMultiplierRequest,
    responses(
        (status = 201, description = "Multiplier created", body = MultiplierResponse),
        (status = 400, description = "Invalid rate, cap or cap frequency"),
        (status = 404, description = "Card not found")
    )
)]
pub async fn create_multiplier_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
    Json(req): Json<CreateMultiplierRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cap_frequency = req
        .cap_frequency
        .as_deref()
        .map(parse_frequency)
        .transpose()?;
    let multiplier = app_state
        .engine
        .add_multiplier(
            &card_name,
            NewMultiplier {
                category: req.category,
                multiplier: req.multiplier,
                description: req.description,
                cap_amount: req.cap_amount,
                cap_frequency,
            },
        )
        .await
        .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(MultiplierResponse::from(multiplier))))
}

/// Add a statement credit to a card.
#[utoipa::path(
    post,
    path = "/cards/{card_name}/credits",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    request_body = CreateCreditRequest,
    responses(
        (status = 201, description = "Credit created", body = CreditResponse),
        (status = 400, description = "Unknown frequency or invalid amount"),
        (status = 404, description = "Card not found")
    )
)]
pub async fn create_credit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
    Json(req): Json<CreateCreditRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let definition = NewCreditBenefit {
        name: req.name,
        description: req.description,
        magnitude: parse_magnitude(&req.amount)?,
        frequency: parse_frequency(&req.frequency)?,
        reset_date: req.reset_date,
        required_amount: req.required_amount,
    };
    let credit = app_state
        .engine
        .add_credit_benefit(&card_name, definition)
        .await
        .map_err(port_error_response)?;
    let view = CreditView {
        card_name,
        credit,
        state: UsageState::Available,
        status_updated_at: None,
    };
    Ok((StatusCode::CREATED, Json(CreditResponse::from(view))))
}

/// Add a sign-up bonus to a card.
#[utoipa::path(
    post,
    path = "/cards/{card_name}/signup-bonuses",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    request_body = CreateSignupBonusRequest,
    responses(
        (status = 201, description = "Sign-up bonus created", body = SignupBonusResponse),
        (status = 404, description = "Card not found")
    )
)]
pub async fn create_signup_bonus_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
    Json(req): Json<CreateSignupBonusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bonus = app_state
        .engine
        .add_signup_bonus(
            &card_name,
            NewSignupBonus {
                bonus_amount: req.bonus_amount,
                description: req.description,
                required_spend: req.required_spend,
                deadline: req.deadline,
            },
        )
        .await
        .map_err(port_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(SignupBonusResponse::new(card_name, bonus)),
    ))
}

/// Add a spending-threshold bonus to a card.
#[utoipa::path(
    post,
    path = "/cards/{card_name}/spending-bonuses",
    params(("card_name" = String, Path, description = "Exact name of the card")),
    request_body = CreateSpendingBonusRequest,
    responses(
        (status = 201, description = "Spending bonus created", body = SpendingBonusResponse),
        (status = 404, description = "Card not found")
    )
)]
pub async fn create_spending_bonus_handler(
    State(app_state): State<Arc<AppState>>,
    Path(card_name): Path<String>,
    Json(req): Json<CreateSpendingBonusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bonus = app_state
        .engine
        .add_spending_bonus(
            &card_name,
            NewSpendingBonus {
                category: req.category,
                bonus_amount: parse_magnitude(&req.bonus_amount)?,
                description: req.description,
                required_spend: req.required_spend,
            },
        )
        .await
        .map_err(port_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(SpendingBonusResponse::new(card_name, bonus)),
    ))
}

//=========================================================================================
// Credit Usage
//=========================================================================================

/// List the credits of one frequency across active cards, highest value first.
#[utoipa::path(
    get,
    path = "/credits",
    params(CreditsQuery),
    responses((status = 200, description = "Credits with their usage status", body = [CreditResponse]))
)]
pub async fn list_credits_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CreditsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let frequency = parse_frequency(&query.frequency)?;
    let views = app_state
        .engine
        .credits_by_frequency(frequency)
        .await
        .map_err(port_error_response)?;
    let response: Vec<CreditResponse> = views.into_iter().map(CreditResponse::from).collect();
    Ok(Json(response))
}

/// Read the usage status of one credit. Credits never marked are `available`.
#[utoipa::path(
    get,
    path = "/credits/status",
    params(CreditStatusQuery),
    responses(
        (status = 200, description = "Current status", body = CreditStatusResponse),
        (status = 404, description = "Card not found")
    )
)]
pub async fn credit_status_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CreditStatusQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let frequency = parse_frequency(&query.frequency)?;
    let state = app_state
        .engine
        .get_status(&query.card_name, frequency, &query.identifier)
        .await
        .map_err(port_error_response)?;
    Ok(Json(CreditStatusResponse {
        card_name: query.card_name,
        frequency: frequency.to_string(),
        identifier: query.identifier,
        status: state.as_str().to_string(),
    }))
}

/// Mark a credit as used for the current period.
#[utoipa::path(
    post,
    path = "/credits/used",
    request_body = MarkUsedRequest,
    responses(
        (status = 204, description = "Credit marked as used"),
        (status = 404, description = "Card not found")
    )
)]
pub async fn mark_used_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<MarkUsedRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let frequency = parse_frequency(&req.frequency)?;
    app_state
        .engine
        .mark_used(&req.card_name, frequency, &req.identifier)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the credits of one frequency already used this period.
#[utoipa::path(
    get,
    path = "/credits/used",
    params(CreditsQuery),
    responses((status = 200, description = "Used credits", body = [CreditResponse]))
)]
pub async fn list_used_credits_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CreditsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let frequency = parse_frequency(&query.frequency)?;
    let views = app_state
        .engine
        .used_credits_by_frequency(frequency)
        .await
        .map_err(port_error_response)?;
    let response: Vec<CreditResponse> = views.into_iter().map(CreditResponse::from).collect();
    Ok(Json(response))
}

/// Manually return a credit to available in every frequency bucket.
#[utoipa::path(
    post,
    path = "/credits/available",
    request_body = MarkAvailableRequest,
    responses(
        (status = 200, description = "Number of records flipped", body = MarkAvailableResponse),
        (status = 404, description = "Card not found")
    )
)]
pub async fn mark_available_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<MarkAvailableRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let updated = app_state
        .engine
        .mark_available(&req.card_name, &req.identifier)
        .await
        .map_err(port_error_response)?;
    Ok(Json(MarkAvailableResponse { updated }))
}

//=========================================================================================
// Sign-up Bonuses
//=========================================================================================

/// List sign-up bonuses that are not yet completed.
#[utoipa::path(
    get,
    path = "/signup-bonuses",
    responses((status = 200, description = "Active sign-up bonuses", body = [SignupBonusResponse]))
)]
pub async fn list_signup_bonuses_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let views = app_state
        .engine
        .active_signup_bonuses()
        .await
        .map_err(port_error_response)?;
    let response: Vec<SignupBonusResponse> =
        views.into_iter().map(SignupBonusResponse::from).collect();
    Ok(Json(response))
}

/// Mark a sign-up bonus as earned.
#[utoipa::path(
    post,
    path = "/signup-bonuses/complete",
    request_body = SignupBonusRequest,
    responses(
        (status = 200, description = "Bonus completed", body = SignupBonusResponse),
        (status = 404, description = "Card or bonus not found")
    )
)]
pub async fn complete_signup_bonus_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SignupBonusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bonus = app_state
        .engine
        .complete_signup_bonus(&req.card_name, &req.description)
        .await
        .map_err(port_error_response)?;
    Ok(Json(SignupBonusResponse::new(req.card_name, bonus)))
}

/// Undo a sign-up bonus completion.
#[utoipa::path(
    post,
    path = "/signup-bonuses/revert",
    request_body = SignupBonusRequest,
    responses(
        (status = 200, description = "Bonus reverted", body = SignupBonusResponse),
        (status = 404, description = "Card or bonus not found"),
        (status = 409, description = "The bonus is not completed")
    )
)]
pub async fn revert_signup_bonus_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SignupBonusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bonus = app_state
        .engine
        .revert_signup_bonus(&req.card_name, &req.description)
        .await
        .map_err(port_error_response)?;
    Ok(Json(SignupBonusResponse::new(req.card_name, bonus)))
}

/// Record the spend accumulated toward a sign-up bonus.
#[utoipa::path(
    post,
    path = "/signup-bonuses/spend",
    request_body = SignupSpendRequest,
    responses(
        (status = 200, description = "Spend recorded", body = SignupBonusResponse),
        (status = 404, description = "Card or bonus not found")
    )
)]
pub async fn record_signup_spend_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SignupSpendRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bonus = app_state
        .engine
        .record_signup_spend(&req.card_name, &req.description, req.current_spend)
        .await
        .map_err(port_error_response)?;
    Ok(Json(SignupBonusResponse::new(req.card_name, bonus)))
}

//=========================================================================================
// Spending Bonuses
//=========================================================================================

/// List pending spending-threshold bonuses.
#[utoipa::path(
    get,
    path = "/spending-bonuses",
    responses((status = 200, description = "Pending spending bonuses", body = [SpendingBonusResponse]))
)]
pub async fn list_spending_bonuses_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let views = app_state
        .engine
        .pending_spending_bonuses()
        .await
        .map_err(port_error_response)?;
    let response: Vec<SpendingBonusResponse> =
        views.into_iter().map(SpendingBonusResponse::from).collect();
    Ok(Json(response))
}

/// Complete a spending bonus, turning its reward into an annual credit.
#[utoipa::path(
    post,
    path = "/spending-bonuses/complete",
    request_body = CompleteSpendingBonusRequest,
    responses(
        (status = 201, description = "Credit created from the bonus", body = CompleteSpendingBonusResponse),
        (status = 404, description = "Card or category not found"),
        (status = 409, description = "No pending bonus in that category")
    )
)]
pub async fn complete_spending_bonus_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<CompleteSpendingBonusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let magnitude = req
        .magnitude
        .as_deref()
        .map(parse_magnitude)
        .transpose()?;
    let completed_on = req.completed_on.unwrap_or_else(local_today);
    let credit_id = app_state
        .engine
        .complete_spending_bonus(&req.card_name, &req.category, magnitude, completed_on)
        .await
        .map_err(port_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(CompleteSpendingBonusResponse { credit_id }),
    ))
}

/// Close a pending spending bonus without earning it.
#[utoipa::path(
    post,
    path = "/spending-bonuses/expire",
    request_body = ExpireSpendingBonusRequest,
    responses(
        (status = 200, description = "Bonus expired", body = SpendingBonusResponse),
        (status = 404, description = "Card or category not found"),
        (status = 409, description = "No pending bonus in that category")
    )
)]
pub async fn expire_spending_bonus_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<ExpireSpendingBonusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let expired_on = req.expired_on.unwrap_or_else(local_today);
    let bonus = app_state
        .engine
        .expire_spending_bonus(&req.card_name, &req.category, expired_on)
        .await
        .map_err(port_error_response)?;
    Ok(Json(SpendingBonusResponse::new(req.card_name, bonus)))
}

/// Undo a spending bonus completion and delete the credit it produced.
#[utoipa::path(
    post,
    path = "/spending-bonuses/undo",
    request_body = UndoSpendingBonusRequest,
    responses(
        (status = 204, description = "Completion undone"),
        (status = 404, description = "Card, credit or bonus not found"),
        (status = 500, description = "The credit was not produced by that bonus")
    )
)]
pub async fn undo_spending_bonus_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<UndoSpendingBonusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .engine
        .undo_spending_bonus_completion(&req.card_name, req.credit_id, req.spending_bonus_id)
        .await
        .map_err(port_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record the spend accumulated toward a pending spending bonus.
#[utoipa::path(
    post,
    path = "/spending-bonuses/spend",
    request_body = SpendingBonusSpendRequest,
    responses(
        (status = 200, description = "Spend recorded", body = SpendingBonusResponse),
        (status = 404, description = "Card or category not found")
    )
)]
pub async fn record_spending_bonus_spend_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SpendingBonusSpendRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let bonus = app_state
        .engine
        .record_spending_bonus_spend(&req.card_name, &req.category, req.current_spend)
        .await
        .map_err(port_error_response)?;
    Ok(Json(SpendingBonusResponse::new(req.card_name, bonus)))
}

//=========================================================================================
// Maintenance
//=========================================================================================

/// Run the credit reset sweep now.
#[utoipa::path(
    post,
    path = "/maintenance/reset-sweep",
    params(SweepQuery),
    responses((status = 200, description = "Sweep finished", body = ResetSweepResponse))
)]
pub async fn reset_sweep_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SweepQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = query.today.unwrap_or_else(local_today);
    let report = app_state
        .engine
        .run_reset_sweep(today)
        .await
        .map_err(port_error_response)?;
    info!(%today, resets_applied = report.resets_applied, failures = report.failures, "Manual reset sweep finished");
    Ok(Json(ResetSweepResponse {
        today,
        resets_applied: report.resets_applied,
        failures: report.failures,
    }))
}

/// Run the annual spending-bonus sweep now.
#[utoipa::path(
    post,
    path = "/maintenance/annual-sweep",
    params(SweepQuery),
    responses((status = 200, description = "Sweep finished", body = AnnualSweepResponse))
)]
pub async fn annual_sweep_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SweepQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = query.today.unwrap_or_else(local_today);
    let bonuses_recreated = app_state
        .engine
        .run_annual_bonus_sweep(today)
        .await
        .map_err(port_error_response)?;
    Ok(Json(AnnualSweepResponse {
        today,
        bonuses_recreated,
    }))
}
