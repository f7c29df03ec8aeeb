use thiserror::Error;

use super::types::{GlideWaypoint, Person};

const EQUITY_PCT_FLOOR: f64 = 30.0;
const EQUITY_PCT_CEILING: f64 = 90.0;
const EQUITY_AGE_OFFSET: f64 = 115.0;
const FIXED_INCOME_SHARE: f64 = 0.6;
const CASH_SHARE: f64 = 0.4;
const PLANNING_HORIZON_AGE: i32 = 85;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GlideError {
    #[error("Retirement age cannot be less than current age")]
    RetirementBeforeCurrentAge,
}

pub fn equity_pct_for_age(age: i32) -> f64 {
    (EQUITY_AGE_OFFSET - age as f64).clamp(EQUITY_PCT_FLOOR, EQUITY_PCT_CEILING)
}

/// Waypoints at the current year, the retirement year and three five-year
/// steps after it, plus the age-85 year when that is still in the future.
pub fn recommended_glide_path(
    birth_year: i32,
    retirement_age: u32,
    current_year: i32,
) -> Result<Vec<GlideWaypoint>, GlideError> {
    let current_age = current_year - birth_year;
    if (retirement_age as i32) < current_age {
        return Err(GlideError::RetirementBeforeCurrentAge);
    }

    let retirement_year = birth_year + retirement_age as i32;
    let mut years = vec![
        current_year,
        retirement_year,
        retirement_year + 5,
        retirement_year + 10,
        retirement_year + 15,
    ];
    years.sort_unstable();
    years.dedup();

    let horizon_year = birth_year + PLANNING_HORIZON_AGE;
    if horizon_year > current_year && !years.contains(&horizon_year) {
        years.push(horizon_year);
        years.sort_unstable();
    }

    Ok(years
        .into_iter()
        .map(|year| waypoint_for_year(birth_year, year))
        .collect())
}

fn waypoint_for_year(birth_year: i32, year: i32) -> GlideWaypoint {
    let equity_pct = equity_pct_for_age(year - birth_year);
    let non_equity = 100.0 - equity_pct;
    GlideWaypoint {
        year,
        equity_pct,
        fixed_income_pct: round1(non_equity * FIXED_INCOME_SHARE),
        cash_pct: round1(non_equity * CASH_SHARE),
    }
}

pub fn oldest_person(people: &[Person]) -> Option<&Person> {
    people
        .iter()
        .filter(|person| person.birth_year.is_some())
        .min_by_key(|person| person.birth_year)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
