use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("{field} percentage must be between 0 and 100")]
    OutOfRange { field: &'static str },
    #[error("allocation percentages must sum to 100 (got {total})")]
    BadTotal { total: f64 },
}

pub fn validate_allocation(
    equity_pct: f64,
    fixed_income_pct: f64,
    cash_pct: f64,
) -> Result<(), AllocationError> {
    for (field, value) in [
        ("equity", equity_pct),
        ("fixed income", fixed_income_pct),
        ("cash", cash_pct),
    ] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(AllocationError::OutOfRange { field });
        }
    }

    let total = equity_pct + fixed_income_pct + cash_pct;
    if total.round() != 100.0 {
        return Err(AllocationError::BadTotal { total });
    }

    Ok(())
}
