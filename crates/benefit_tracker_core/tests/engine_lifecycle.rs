use benefit_tracker_core::{
    BenefitEngine, BenefitStore, CreditFilter, Frequency, InMemoryStore, Magnitude,
    NewCreditBenefit, NewMultiplier, NewSignupBonus, NewSpendingBonus, PortError,
    SignupBonusStatus, SpendingBonusFilter, SpendingBonusStatus, StoreTransaction, UsageState,
};
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn setup() -> (BenefitEngine, InMemoryStore) {
    let store = InMemoryStore::new();
    let engine = BenefitEngine::new(Arc::new(store.clone()));
    engine.add_card("Chase", "Chase Sapphire Reserve").await.unwrap();
    (engine, store)
}

fn credit(name: &str, frequency: Frequency, reset_date: Option<NaiveDate>) -> NewCreditBenefit {
    NewCreditBenefit {
        name: name.to_string(),
        description: format!("{} statement credit", name),
        magnitude: Magnitude::Dollars(100.0),
        frequency,
        reset_date,
        required_amount: None,
    }
}

async fn reset_date_of(store: &InMemoryStore, name: &str) -> Option<NaiveDate> {
    let mut tx = store.begin().await.unwrap();
    let credits = tx.list_credits(CreditFilter::default()).await.unwrap();
    credits.into_iter().find(|c| c.name == name).unwrap().reset_date
}

//=========================================================================================
// Usage State Machine
//=========================================================================================

#[tokio::test]
async fn mark_available_without_record_is_success() {
    let (engine, _) = setup().await;

    let flipped = engine
        .mark_available("Chase Sapphire Reserve", "Lyft Credit")
        .await
        .unwrap();

    assert_eq!(flipped, 0);
    let state = engine
        .get_status("Chase Sapphire Reserve", Frequency::Monthly, "Lyft Credit")
        .await
        .unwrap();
    assert_eq!(state, UsageState::Available);
}

#[tokio::test]
async fn mark_used_is_idempotent_and_slug_insensitive() {
    let (engine, _) = setup().await;

    engine
        .mark_used("Chase Sapphire Reserve", Frequency::Monthly, "Lyft Credit")
        .await
        .unwrap();
    engine
        .mark_used("Chase Sapphire Reserve", Frequency::Monthly, "lyft-credit")
        .await
        .unwrap();

    let state = engine
        .get_status("Chase Sapphire Reserve", Frequency::Monthly, "LYFT credit")
        .await
        .unwrap();
    assert_eq!(state, UsageState::Used);

    // A different frequency bucket is a different soft key.
    let other_bucket = engine
        .get_status("Chase Sapphire Reserve", Frequency::Annual, "Lyft Credit")
        .await
        .unwrap();
    assert_eq!(other_bucket, UsageState::Available);

    let flipped = engine
        .mark_available("Chase Sapphire Reserve", "Lyft Credit")
        .await
        .unwrap();
    assert_eq!(flipped, 1);
    let state = engine
        .get_status("Chase Sapphire Reserve", Frequency::Monthly, "Lyft Credit")
        .await
        .unwrap();
    assert_eq!(state, UsageState::Available);
}

#[tokio::test]
async fn unknown_card_is_not_found() {
    let (engine, _) = setup().await;

    let result = engine
        .mark_used("Nonexistent Card", Frequency::Monthly, "Lyft Credit")
        .await;

    assert!(matches!(result, Err(PortError::NotFound(_))));
}

#[tokio::test]
async fn status_survives_credit_redefinition() {
    let (engine, _) = setup().await;
    engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("DoorDash Credit", Frequency::Monthly, Some(date(2025, 5, 1))),
        )
        .await
        .unwrap();
    engine
        .mark_used("Chase Sapphire Reserve", Frequency::Monthly, "DoorDash Credit")
        .await
        .unwrap();

    let replaced = engine
        .redefine_credit_benefits(
            "Chase Sapphire Reserve",
            vec![credit("DoorDash Credit", Frequency::Monthly, Some(date(2025, 5, 1)))],
        )
        .await
        .unwrap();
    assert_eq!(replaced.len(), 1);

    let views = engine.credits_by_frequency(Frequency::Monthly).await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].credit.id, replaced[0].id);
    assert_eq!(views[0].state, UsageState::Used);
}

//=========================================================================================
// Reset Engine
//=========================================================================================

#[tokio::test]
async fn quarterly_credit_resets_and_advances_from_stored_date() {
    let (engine, store) = setup().await;
    engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("Resy Credit", Frequency::Quarterly, Some(date(2025, 3, 31))),
        )
        .await
        .unwrap();
    engine
        .mark_used("Chase Sapphire Reserve", Frequency::Quarterly, "Resy Credit")
        .await
        .unwrap();

    let report = engine.run_reset_sweep(date(2025, 4, 15)).await.unwrap();

    assert_eq!(report.resets_applied, 1);
    assert_eq!(report.failures, 0);
    assert_eq!(reset_date_of(&store, "Resy Credit").await, Some(date(2025, 6, 30)));
    let state = engine
        .get_status("Chase Sapphire Reserve", Frequency::Quarterly, "Resy Credit")
        .await
        .unwrap();
    assert_eq!(state, UsageState::Available);
}

#[tokio::test]
async fn every_recurring_frequency_advances_exactly_one_period() {
    let (engine, store) = setup().await;
    let cases = [
        ("Monthly", Frequency::Monthly, date(2025, 5, 15)),
        ("Quarterly", Frequency::Quarterly, date(2025, 7, 15)),
        ("Semi", Frequency::SemiAnnual, date(2025, 10, 15)),
        ("Annual", Frequency::Annual, date(2026, 4, 15)),
    ];
    for (name, frequency, _) in &cases {
        engine
            .add_credit_benefit(
                "Chase Sapphire Reserve",
                credit(name, *frequency, Some(date(2025, 4, 15))),
            )
            .await
            .unwrap();
        engine
            .mark_used("Chase Sapphire Reserve", *frequency, name)
            .await
            .unwrap();
    }

    let report = engine.run_reset_sweep(date(2025, 4, 20)).await.unwrap();

    assert_eq!(report.resets_applied, 4);
    for (name, frequency, expected) in &cases {
        assert_eq!(reset_date_of(&store, name).await, Some(*expected), "{}", name);
        let state = engine
            .get_status("Chase Sapphire Reserve", *frequency, name)
            .await
            .unwrap();
        assert_eq!(state, UsageState::Available, "{}", name);
    }
}

#[tokio::test]
async fn reset_sweep_is_idempotent_for_the_same_day() {
    let (engine, store) = setup().await;
    engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("Lyft Credit", Frequency::Monthly, Some(date(2025, 4, 1))),
        )
        .await
        .unwrap();

    let first = engine.run_reset_sweep(date(2025, 4, 15)).await.unwrap();
    let second = engine.run_reset_sweep(date(2025, 4, 15)).await.unwrap();

    assert_eq!(first.resets_applied, 1);
    assert_eq!(second.resets_applied, 0);
    assert_eq!(reset_date_of(&store, "Lyft Credit").await, Some(date(2025, 5, 1)));
}

#[tokio::test]
async fn one_time_credit_is_never_advanced() {
    let (engine, store) = setup().await;
    engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("Global Entry Credit", Frequency::OneTime, Some(date(2024, 1, 1))),
        )
        .await
        .unwrap();
    engine
        .mark_used("Chase Sapphire Reserve", Frequency::OneTime, "Global Entry Credit")
        .await
        .unwrap();

    let report = engine.run_reset_sweep(date(2025, 4, 15)).await.unwrap();

    assert_eq!(report.resets_applied, 0);
    assert_eq!(
        reset_date_of(&store, "Global Entry Credit").await,
        Some(date(2024, 1, 1))
    );
    let state = engine
        .get_status("Chase Sapphire Reserve", Frequency::OneTime, "Global Entry Credit")
        .await
        .unwrap();
    assert_eq!(state, UsageState::Used);
}

#[tokio::test]
async fn failing_credit_does_not_abort_the_sweep() {
    let (engine, store) = setup().await;
    let broken = engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("Broken Credit", Frequency::Monthly, Some(date(2025, 4, 1))),
        )
        .await
        .unwrap();
    engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("Lyft Credit", Frequency::Monthly, Some(date(2025, 4, 1))),
        )
        .await
        .unwrap();
    store.fail_updates_for(broken.id);

    let report = engine.run_reset_sweep(date(2025, 4, 15)).await.unwrap();

    assert_eq!(report.resets_applied, 1);
    assert_eq!(report.failures, 1);
    assert_eq!(reset_date_of(&store, "Lyft Credit").await, Some(date(2025, 5, 1)));
    assert_eq!(reset_date_of(&store, "Broken Credit").await, Some(date(2025, 4, 1)));
}

#[tokio::test]
async fn annual_sweep_recreates_completed_bonus_once() {
    let store = InMemoryStore::new();
    let engine = BenefitEngine::new(Arc::new(store.clone()));
    engine.add_card("Hyatt", "Card X").await.unwrap();
    engine
        .add_spending_bonus(
            "Card X",
            NewSpendingBonus {
                category: "Hotel".to_string(),
                bonus_amount: "1 Free Night".parse().unwrap(),
                description: "Free Night".to_string(),
                required_spend: 15000.0,
            },
        )
        .await
        .unwrap();
    engine
        .complete_spending_bonus("Card X", "Hotel", None, date(2025, 9, 1))
        .await
        .unwrap();

    let first = engine.run_annual_bonus_sweep(date(2026, 1, 1)).await.unwrap();
    let second = engine.run_annual_bonus_sweep(date(2026, 1, 1)).await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 0);
    let mut tx = store.begin().await.unwrap();
    let pending = tx
        .list_spending_bonuses(SpendingBonusFilter {
            card_id: None,
            status: Some(SpendingBonusStatus::Pending),
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].description, "Free Night");
    assert_eq!(pending[0].current_spend, 0.0);
}

#[tokio::test]
async fn annual_sweep_ignores_bonus_completed_this_year() {
    let (engine, _) = setup().await;
    engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Southwest Airlines".to_string(),
                bonus_amount: Magnitude::Dollars(500.0),
                description: "Southwest Airlines credit".to_string(),
                required_spend: 75000.0,
            },
        )
        .await
        .unwrap();
    engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Southwest Airlines", None, date(2026, 3, 1))
        .await
        .unwrap();

    let recreated = engine.run_annual_bonus_sweep(date(2026, 6, 1)).await.unwrap();

    assert_eq!(recreated, 0);
}

async fn hotel_bonus(engine: &BenefitEngine) {
    engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Hotel".to_string(),
                bonus_amount: "1 Free Night".parse().unwrap(),
                description: "Free night after $15,000".to_string(),
                required_spend: 15000.0,
            },
        )
        .await
        .unwrap();
}

async fn pending_count(store: &InMemoryStore) -> usize {
    let mut tx = store.begin().await.unwrap();
    tx.list_spending_bonuses(SpendingBonusFilter {
        card_id: None,
        status: Some(SpendingBonusStatus::Pending),
    })
    .await
    .unwrap()
    .len()
}

#[tokio::test]
async fn restarted_sweep_mid_year_does_not_reopen_a_completed_cycle() {
    let (engine, store) = setup().await;
    hotel_bonus(&engine).await;
    engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2025, 6, 1))
        .await
        .unwrap();
    assert_eq!(engine.run_annual_bonus_sweep(date(2026, 1, 1)).await.unwrap(), 1);
    engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2026, 3, 1))
        .await
        .unwrap();

    // A fresh process runs the sweep again on its first tick.
    let rerun = engine.run_annual_bonus_sweep(date(2026, 5, 1)).await.unwrap();

    assert_eq!(rerun, 0);
    assert_eq!(pending_count(&store).await, 0);
    let again = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2026, 5, 2))
        .await;
    assert!(matches!(again, Err(PortError::Conflict(_))));

    assert_eq!(engine.run_annual_bonus_sweep(date(2027, 1, 1)).await.unwrap(), 1);
    assert_eq!(pending_count(&store).await, 1);
}

#[tokio::test]
async fn each_cycles_bonus_credit_tracks_its_own_usage() {
    let (engine, store) = setup().await;
    hotel_bonus(&engine).await;
    let first_credit = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2025, 6, 1))
        .await
        .unwrap();
    engine
        .mark_used("Chase Sapphire Reserve", Frequency::Annual, "Hotel Bonus 2025")
        .await
        .unwrap();
    engine.run_annual_bonus_sweep(date(2026, 1, 1)).await.unwrap();

    let second_credit = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2026, 3, 1))
        .await
        .unwrap();

    let views = engine.credits_by_frequency(Frequency::Annual).await.unwrap();
    let state_of = |id: Uuid| views.iter().find(|v| v.credit.id == id).unwrap().state;
    assert_eq!(state_of(first_credit), UsageState::Used);
    assert_eq!(state_of(second_credit), UsageState::Available);

    let second_bonus = {
        let mut tx = store.begin().await.unwrap();
        tx.get_credit(second_credit)
            .await
            .unwrap()
            .unwrap()
            .source_bonus_id
            .unwrap()
    };
    engine
        .undo_spending_bonus_completion("Chase Sapphire Reserve", second_credit, second_bonus)
        .await
        .unwrap();

    let state = engine
        .get_status("Chase Sapphire Reserve", Frequency::Annual, "Hotel Bonus 2025")
        .await
        .unwrap();
    assert_eq!(state, UsageState::Used);
}

#[tokio::test]
async fn expired_bonus_is_renewed_only_in_the_following_year() {
    let (engine, store) = setup().await;
    hotel_bonus(&engine).await;

    let expired = engine
        .expire_spending_bonus("Chase Sapphire Reserve", "Hotel", date(2025, 12, 31))
        .await
        .unwrap();
    assert_eq!(expired.status, SpendingBonusStatus::Expired);
    assert_eq!(expired.completed_date, Some(date(2025, 12, 31)));

    let twice = engine
        .expire_spending_bonus("Chase Sapphire Reserve", "Hotel", date(2025, 12, 31))
        .await;
    assert!(matches!(twice, Err(PortError::Conflict(_))));
    assert_eq!(engine.run_annual_bonus_sweep(date(2025, 12, 31)).await.unwrap(), 0);

    assert_eq!(engine.run_annual_bonus_sweep(date(2026, 1, 1)).await.unwrap(), 1);
    assert_eq!(pending_count(&store).await, 1);
    assert!(engine
        .credits_by_frequency(Frequency::Annual)
        .await
        .unwrap()
        .is_empty());
}

//=========================================================================================
// Spending Bonus Conversion
//=========================================================================================

#[tokio::test]
async fn complete_then_undo_restores_pre_completion_state() {
    let (engine, store) = setup().await;
    let bonus = engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Shops at Chase".to_string(),
                bonus_amount: Magnitude::Dollars(250.0),
                description: "Shops at Chase credit".to_string(),
                required_spend: 75000.0,
            },
        )
        .await
        .unwrap();

    let credit_id = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Shops at Chase", None, date(2025, 8, 10))
        .await
        .unwrap();

    {
        let mut tx = store.begin().await.unwrap();
        let credit = tx.get_credit(credit_id).await.unwrap().unwrap();
        assert!(credit.is_bonus_derived);
        assert_eq!(credit.source_bonus_id, Some(bonus.id));
        assert_eq!(credit.frequency, Frequency::Annual);
        assert_eq!(credit.reset_date, Some(date(2026, 8, 10)));
        assert_eq!(credit.magnitude, Magnitude::Dollars(250.0));
        let completed = tx.get_spending_bonus(bonus.id).await.unwrap().unwrap();
        assert_eq!(completed.status, SpendingBonusStatus::Completed);
        assert_eq!(completed.completed_date, Some(date(2025, 8, 10)));
    }

    engine
        .undo_spending_bonus_completion("Chase Sapphire Reserve", credit_id, bonus.id)
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.get_credit(credit_id).await.unwrap().is_none());
    let restored = tx.get_spending_bonus(bonus.id).await.unwrap().unwrap();
    assert_eq!(restored, bonus);
}

#[tokio::test]
async fn magnitude_override_is_used_for_the_credit() {
    let (engine, store) = setup().await;
    engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Hotel".to_string(),
                bonus_amount: "1 Free Night".parse().unwrap(),
                description: "Second free night".to_string(),
                required_spend: 15000.0,
            },
        )
        .await
        .unwrap();

    let credit_id = engine
        .complete_spending_bonus(
            "Chase Sapphire Reserve",
            "hotel",
            Some(Magnitude::Other("2 Free Nights".to_string())),
            date(2025, 8, 10),
        )
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let credit = tx.get_credit(credit_id).await.unwrap().unwrap();
    assert_eq!(credit.magnitude, Magnitude::Other("2 Free Nights".to_string()));
}

#[tokio::test]
async fn completing_twice_is_a_conflict() {
    let (engine, _) = setup().await;
    engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Hotel".to_string(),
                bonus_amount: Magnitude::Dollars(100.0),
                description: "Hotel credit".to_string(),
                required_spend: 10000.0,
            },
        )
        .await
        .unwrap();
    engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2025, 1, 2))
        .await
        .unwrap();

    let again = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2025, 1, 3))
        .await;
    let missing = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Dining", None, date(2025, 1, 3))
        .await;

    assert!(matches!(again, Err(PortError::Conflict(_))));
    assert!(matches!(missing, Err(PortError::NotFound(_))));
}

#[tokio::test]
async fn spend_progress_shows_on_pending_bonuses() {
    let (engine, _) = setup().await;
    engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Travel".to_string(),
                bonus_amount: Magnitude::Dollars(250.0),
                description: "Travel bonus".to_string(),
                required_spend: 5000.0,
            },
        )
        .await
        .unwrap();

    let bonus = engine
        .record_spending_bonus_spend("Chase Sapphire Reserve", "travel", 1250.0)
        .await
        .unwrap();
    let negative = engine
        .record_spending_bonus_spend("Chase Sapphire Reserve", "Travel", -1.0)
        .await;

    assert_eq!(bonus.current_spend, 1250.0);
    assert!(matches!(negative, Err(PortError::InvalidInput(_))));
    let pending = engine.pending_spending_bonuses().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].card_name, "Chase Sapphire Reserve");
    assert!((pending[0].progress_percent - 25.0).abs() < 1e-9);
}

#[tokio::test]
async fn failed_commit_leaves_no_half_conversion() {
    let (engine, store) = setup().await;
    let bonus = engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Hotel".to_string(),
                bonus_amount: Magnitude::Dollars(100.0),
                description: "Hotel credit".to_string(),
                required_spend: 10000.0,
            },
        )
        .await
        .unwrap();
    store.fail_next_commit();

    let result = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2025, 1, 2))
        .await;

    assert!(matches!(result, Err(PortError::Transient(_))));
    let mut tx = store.begin().await.unwrap();
    assert!(tx.list_credits(CreditFilter::default()).await.unwrap().is_empty());
    let untouched = tx.get_spending_bonus(bonus.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, SpendingBonusStatus::Pending);
}

#[tokio::test]
async fn undo_with_missing_half_is_not_found() {
    let (engine, _) = setup().await;
    let bonus = engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Hotel".to_string(),
                bonus_amount: Magnitude::Dollars(100.0),
                description: "Hotel credit".to_string(),
                required_spend: 10000.0,
            },
        )
        .await
        .unwrap();
    let credit_id = engine
        .complete_spending_bonus("Chase Sapphire Reserve", "Hotel", None, date(2025, 1, 2))
        .await
        .unwrap();

    let wrong_bonus = engine
        .undo_spending_bonus_completion("Chase Sapphire Reserve", credit_id, uuid::Uuid::new_v4())
        .await;
    let wrong_credit = engine
        .undo_spending_bonus_completion("Chase Sapphire Reserve", uuid::Uuid::new_v4(), bonus.id)
        .await;

    assert!(matches!(wrong_bonus, Err(PortError::NotFound(_))));
    assert!(matches!(wrong_credit, Err(PortError::NotFound(_))));
}

#[tokio::test]
async fn undo_against_unlinked_credit_is_integrity_fault() {
    let (engine, _) = setup().await;
    let bonus = engine
        .add_spending_bonus(
            "Chase Sapphire Reserve",
            NewSpendingBonus {
                category: "Hotel".to_string(),
                bonus_amount: Magnitude::Dollars(100.0),
                description: "Hotel credit".to_string(),
                required_spend: 10000.0,
            },
        )
        .await
        .unwrap();
    let plain = engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("Travel Credit", Frequency::Annual, Some(date(2025, 12, 1))),
        )
        .await
        .unwrap();

    let result = engine
        .undo_spending_bonus_completion("Chase Sapphire Reserve", plain.id, bonus.id)
        .await;

    assert!(matches!(result, Err(PortError::IntegrityFault(_))));
}

//=========================================================================================
// Sign-up Bonus State Machine
//=========================================================================================

async fn signup(engine: &BenefitEngine, current_spend: f64) {
    engine
        .add_signup_bonus(
            "Chase Sapphire Reserve",
            NewSignupBonus {
                bonus_amount: "60,000 points".to_string(),
                description: "Welcome bonus".to_string(),
                required_spend: 4000.0,
                deadline: Some(date(2025, 12, 31)),
            },
        )
        .await
        .unwrap();
    if current_spend > 0.0 {
        engine
            .record_signup_spend("Chase Sapphire Reserve", "Welcome bonus", current_spend)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn revert_with_progress_returns_to_in_progress() {
    let (engine, _) = setup().await;
    signup(&engine, 150.0).await;
    engine
        .complete_signup_bonus("Chase Sapphire Reserve", "Welcome bonus")
        .await
        .unwrap();

    let reverted = engine
        .revert_signup_bonus("Chase Sapphire Reserve", "Welcome bonus")
        .await
        .unwrap();

    assert_eq!(reverted.status, SignupBonusStatus::InProgress);
    assert_eq!(reverted.current_spend, 150.0);
}

#[tokio::test]
async fn revert_without_progress_returns_to_not_started() {
    let (engine, _) = setup().await;
    signup(&engine, 0.0).await;
    engine
        .complete_signup_bonus("Chase Sapphire Reserve", "Welcome bonus")
        .await
        .unwrap();

    let reverted = engine
        .revert_signup_bonus("Chase Sapphire Reserve", "Welcome bonus")
        .await
        .unwrap();

    assert_eq!(reverted.status, SignupBonusStatus::NotStarted);
}

#[tokio::test]
async fn recorded_spend_never_regresses_completion() {
    let (engine, _) = setup().await;
    signup(&engine, 0.0).await;
    engine
        .complete_signup_bonus("Chase Sapphire Reserve", "Welcome bonus")
        .await
        .unwrap();

    let bonus = engine
        .record_signup_spend("Chase Sapphire Reserve", "Welcome bonus", 0.0)
        .await
        .unwrap();

    assert_eq!(bonus.status, SignupBonusStatus::Completed);
    assert!(engine.active_signup_bonuses().await.unwrap().is_empty());
}

#[tokio::test]
async fn revert_of_unfinished_bonus_is_a_conflict() {
    let (engine, _) = setup().await;
    signup(&engine, 150.0).await;

    let result = engine
        .revert_signup_bonus("Chase Sapphire Reserve", "Welcome bonus")
        .await;

    assert!(matches!(result, Err(PortError::Conflict(_))));
    let views = engine.active_signup_bonuses().await.unwrap();
    assert_eq!(views.len(), 1);
    assert!((views[0].progress_percent - 3.75).abs() < 1e-9);
}

//=========================================================================================
// Anchored Resets
//=========================================================================================

#[tokio::test]
async fn monthly_month_end_credit_returns_to_the_31st() {
    let (engine, store) = setup().await;
    engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("DoorDash Credit", Frequency::Monthly, Some(date(2025, 1, 31))),
        )
        .await
        .unwrap();

    let mut dates = Vec::new();
    for today in [date(2025, 2, 1), date(2025, 3, 1), date(2025, 4, 1)] {
        engine.run_reset_sweep(today).await.unwrap();
        dates.push(reset_date_of(&store, "DoorDash Credit").await.unwrap());
    }

    assert_eq!(dates, vec![date(2025, 2, 28), date(2025, 3, 31), date(2025, 4, 30)]);
}

//=========================================================================================
// Multipliers, Card Details and Activation
//=========================================================================================

fn multiplier(category: &str, rate: f64) -> NewMultiplier {
    NewMultiplier {
        category: category.to_string(),
        multiplier: rate,
        description: String::new(),
        cap_amount: None,
        cap_frequency: None,
    }
}

#[tokio::test]
async fn multipliers_sort_by_rate_and_reject_bad_input() {
    let (engine, _) = setup().await;
    engine
        .add_multiplier("Chase Sapphire Reserve", multiplier("Dining", 3.0))
        .await
        .unwrap();
    engine
        .add_multiplier("Chase Sapphire Reserve", multiplier("Travel Portal", 10.0))
        .await
        .unwrap();
    let uncapped = engine
        .add_multiplier(
            "Chase Sapphire Reserve",
            NewMultiplier {
                cap_amount: Some(0.0),
                cap_frequency: Some(Frequency::Annual),
                ..multiplier("Other", 1.0)
            },
        )
        .await
        .unwrap();
    assert_eq!(uncapped.cap_amount, None);
    assert_eq!(uncapped.cap_frequency, None);

    let zero_rate = engine
        .add_multiplier("Chase Sapphire Reserve", multiplier("Gas", 0.0))
        .await;
    let no_card = engine.add_multiplier("Unknown", multiplier("Gas", 2.0)).await;
    assert!(matches!(zero_rate, Err(PortError::InvalidInput(_))));
    assert!(matches!(no_card, Err(PortError::NotFound(_))));

    let categories: Vec<String> = engine
        .card_multipliers("Chase Sapphire Reserve")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.category)
        .collect();
    assert_eq!(categories, vec!["Travel Portal", "Dining", "Other"]);
}

#[tokio::test]
async fn used_credits_lists_only_used_ones() {
    let (engine, _) = setup().await;
    for name in ["Lyft Credit", "DoorDash Credit"] {
        engine
            .add_credit_benefit("Chase Sapphire Reserve", credit(name, Frequency::Monthly, None))
            .await
            .unwrap();
    }
    engine
        .mark_used("Chase Sapphire Reserve", Frequency::Monthly, "Lyft Credit")
        .await
        .unwrap();

    let used = engine
        .used_credits_by_frequency(Frequency::Monthly)
        .await
        .unwrap();

    assert_eq!(used.len(), 1);
    assert_eq!(used[0].credit.name, "Lyft Credit");
    assert_eq!(used[0].state, UsageState::Used);
}

#[tokio::test]
async fn inactive_card_leaves_dashboards_but_keeps_details() {
    let (engine, _) = setup().await;
    engine
        .add_credit_benefit(
            "Chase Sapphire Reserve",
            credit("Travel Credit", Frequency::Annual, Some(date(2026, 12, 31))),
        )
        .await
        .unwrap();
    hotel_bonus(&engine).await;
    engine
        .add_multiplier("Chase Sapphire Reserve", multiplier("Dining", 3.0))
        .await
        .unwrap();

    let card = engine
        .set_card_active("Chase Sapphire Reserve", false)
        .await
        .unwrap();

    assert!(!card.is_active);
    assert!(engine
        .credits_by_frequency(Frequency::Annual)
        .await
        .unwrap()
        .is_empty());
    assert!(engine.pending_spending_bonuses().await.unwrap().is_empty());
    let details = engine.card_details("Chase Sapphire Reserve").await.unwrap();
    assert!(!details.card.is_active);
    assert_eq!(details.credits.len(), 1);
    assert_eq!(details.spending_bonuses.len(), 1);
    assert_eq!(details.multipliers.len(), 1);
    assert!(matches!(
        engine.card_details("Unknown").await,
        Err(PortError::NotFound(_))
    ));
}
