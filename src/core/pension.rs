use super::types::{CppEstimate, OasEstimate, PensionProjection, Person};

// Published 2025 maximums, flat estimates in today's dollars.
const CPP_MAX_MONTHLY_AT_65: f64 = 1_433.00;
const CPP_ESTIMATE_FACTOR: f64 = 0.70;
const CPP_EARLY_REDUCTION_PER_MONTH: f64 = 0.006;
const CPP_LATE_BONUS_PER_MONTH: f64 = 0.007;
const OAS_MAX_MONTHLY_65_TO_74: f64 = 727.67;
const OAS_MAX_MONTHLY_75_PLUS: f64 = 800.44;
const OAS_FULL_RESIDENCE_YEARS: f64 = 40.0;
const STANDARD_CLAIM_AGE: u32 = 65;
const DEFAULT_OAS_RESIDENCE_YEARS: u32 = 40;

pub fn pension_projection(person: &Person, current_year: i32) -> PensionProjection {
    let Some(birth_year) = person.birth_year else {
        return PensionProjection::MissingBirthYear {
            person_id: person.id,
            name: person.name.clone(),
        };
    };

    let age = current_year - birth_year;
    let claim_age = person.pension_claim_age.unwrap_or(STANDARD_CLAIM_AGE);
    let claim_year = birth_year + claim_age as i32;
    let residence_years = person
        .oas_residence_years
        .unwrap_or(DEFAULT_OAS_RESIDENCE_YEARS);

    let cpp_monthly = round2(
        CPP_MAX_MONTHLY_AT_65 * CPP_ESTIMATE_FACTOR * cpp_claim_factor(claim_age),
    );

    let oas_max = if age >= 75 || claim_age >= 75 {
        OAS_MAX_MONTHLY_75_PLUS
    } else {
        OAS_MAX_MONTHLY_65_TO_74
    };
    let residence_fraction = (residence_years as f64 / OAS_FULL_RESIDENCE_YEARS).min(1.0);
    let oas_monthly = round2(oas_max * residence_fraction);

    PensionProjection::Estimate {
        person_id: person.id,
        name: person.name.clone(),
        age,
        claim_age,
        claim_year,
        years_until_claim: (claim_year - current_year).max(0),
        is_over_65: age >= 65,
        is_over_75: age >= 75,
        cpp: CppEstimate {
            monthly: cpp_monthly,
            annual: round2(cpp_monthly * 12.0),
        },
        oas: OasEstimate {
            monthly: oas_monthly,
            annual: round2(oas_monthly * 12.0),
            residence_years,
            residence_fraction,
        },
    }
}

pub fn pension_projections(people: &[Person], current_year: i32) -> Vec<PensionProjection> {
    people
        .iter()
        .map(|person| pension_projection(person, current_year))
        .collect()
}

fn cpp_claim_factor(claim_age: u32) -> f64 {
    if claim_age < STANDARD_CLAIM_AGE {
        let months_early = (STANDARD_CLAIM_AGE - claim_age) * 12;
        1.0 - CPP_EARLY_REDUCTION_PER_MONTH * months_early as f64
    } else {
        let months_late = (claim_age - STANDARD_CLAIM_AGE) * 12;
        1.0 + CPP_LATE_BONUS_PER_MONTH * months_late as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
