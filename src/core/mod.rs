mod allocation;
mod glide;
mod pension;
mod types;

pub use allocation::{AllocationError, validate_allocation};
pub use glide::{GlideError, equity_pct_for_age, oldest_person, recommended_glide_path};
pub use pension::{pension_projection, pension_projections};
pub use types::{
    Account, AccountBalance, AccountKind, BalanceEntry, BalanceSnapshot, CppEstimate,
    GlideWaypoint, IncomeKind, IncomeSource, NewAccount, NewIncomeSource, NewPerson, NewProperty,
    OasEstimate, PensionProjection, Person, Property, ReturnEntry,
};
