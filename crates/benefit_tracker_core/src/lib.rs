pub mod bonus;
pub mod dashboard;
pub mod domain;
pub mod engine;
pub mod memory;
pub mod ports;
pub mod reset;
pub mod usage;

pub use dashboard::{CardDetails, CreditView, SignupBonusView, SpendingBonusView};
pub use domain::{
    Card, CreditBenefit, CreditUsageStatus, Frequency, Magnitude, Multiplier, NewCreditBenefit,
    NewMultiplier, NewSignupBonus, NewSpendingBonus, SignupBonus, SignupBonusStatus,
    SpendingBonus, SpendingBonusStatus, StatusKey, UsageState,
};
pub use engine::BenefitEngine;
pub use memory::InMemoryStore;
pub use ports::{
    BenefitStore, CreditFilter, PortError, PortResult, SpendingBonusFilter, StoreTransaction,
};
pub use reset::{next_reset_date, ResetReport};
