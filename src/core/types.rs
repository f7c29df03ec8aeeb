use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    Rrsp,
    Tfsa,
    #[serde(alias = "nonRegistered", alias = "non_registered")]
    NonRegistered,
    Lira,
    Other,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Rrsp => "rrsp",
            AccountKind::Tfsa => "tfsa",
            AccountKind::NonRegistered => "non-registered",
            AccountKind::Lira => "lira",
            AccountKind::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rrsp" => Some(AccountKind::Rrsp),
            "tfsa" => Some(AccountKind::Tfsa),
            "non-registered" => Some(AccountKind::NonRegistered),
            "lira" => Some(AccountKind::Lira),
            "other" => Some(AccountKind::Other),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeKind {
    Employment,
    Rental,
    Business,
    Pension,
    Other,
}

impl IncomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IncomeKind::Employment => "employment",
            IncomeKind::Rental => "rental",
            IncomeKind::Business => "business",
            IncomeKind::Pension => "pension",
            IncomeKind::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "employment" => Some(IncomeKind::Employment),
            "rental" => Some(IncomeKind::Rental),
            "business" => Some(IncomeKind::Business),
            "pension" => Some(IncomeKind::Pension),
            "other" => Some(IncomeKind::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub birth_year: Option<i32>,
    pub pension_claim_age: Option<u32>,
    pub oas_residence_years: Option<u32>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct NewPerson {
    pub name: String,
    pub birth_year: Option<i32>,
    pub pension_claim_age: Option<u32>,
    pub oas_residence_years: Option<u32>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub person_id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub equity_pct: f64,
    pub fixed_income_pct: f64,
    pub cash_pct: f64,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub person_id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub equity_pct: f64,
    pub fixed_income_pct: f64,
    pub cash_pct: f64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub id: i64,
    pub account_id: i64,
    pub recorded_on: NaiveDate,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct BalanceEntry {
    pub account_id: i64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnEntry {
    pub id: i64,
    pub account_id: i64,
    pub year: i32,
    pub return_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    pub id: i64,
    pub person_id: i64,
    pub name: String,
    pub kind: IncomeKind,
    pub annual_amount: f64,
    pub starts_year: Option<i32>,
    pub ends_year: Option<i32>,
    pub sort_order: i64,
}

impl IncomeSource {
    pub fn active_in(&self, year: i32) -> bool {
        self.starts_year.is_none_or(|start| start <= year)
            && self.ends_year.is_none_or(|end| year <= end)
    }
}

#[derive(Debug, Clone)]
pub struct NewIncomeSource {
    pub person_id: i64,
    pub name: String,
    pub kind: IncomeKind,
    pub annual_amount: f64,
    pub starts_year: Option<i32>,
    pub ends_year: Option<i32>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: i64,
    pub name: String,
    pub estimated_value: f64,
    pub mortgage_balance: f64,
    pub sort_order: i64,
}

impl Property {
    pub fn equity(&self) -> f64 {
        self.estimated_value - self.mortgage_balance
    }
}

#[derive(Debug, Clone)]
pub struct NewProperty {
    pub name: String,
    pub estimated_value: f64,
    pub mortgage_balance: f64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlideWaypoint {
    pub year: i32,
    pub equity_pct: f64,
    pub fixed_income_pct: f64,
    pub cash_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub account_id: i64,
    pub person_id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CppEstimate {
    pub monthly: f64,
    pub annual: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OasEstimate {
    pub monthly: f64,
    pub annual: f64,
    pub residence_years: u32,
    pub residence_fraction: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PensionProjection {
    #[serde(rename_all = "camelCase")]
    MissingBirthYear { person_id: i64, name: String },
    #[serde(rename_all = "camelCase")]
    Estimate {
        person_id: i64,
        name: String,
        age: i32,
        claim_age: u32,
        claim_year: i32,
        years_until_claim: i32,
        is_over_65: bool,
        is_over_75: bool,
        cpp: CppEstimate,
        oas: OasEstimate,
    },
}
