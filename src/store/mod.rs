use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::core::{
    Account, AccountBalance, AccountKind, AllocationError, BalanceEntry, BalanceSnapshot,
    GlideWaypoint, IncomeKind, IncomeSource, NewAccount, NewIncomeSource, NewPerson, NewProperty,
    Person, Property, ReturnEntry, validate_allocation,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let store = Self::from_connection(Connection::open(path)?)?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        setup_schema(&conn)?;
        Ok(Self { conn })
    }

    // People

    pub fn create_person(&self, person: &NewPerson) -> Result<Person, StoreError> {
        self.conn.execute(
            "INSERT INTO people (name, birth_year, pension_claim_age, oas_residence_years, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                person.name,
                person.birth_year,
                person.pension_claim_age,
                person.oas_residence_years,
                person.sort_order,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, name = %person.name, "created person");
        self.get_person(id)
    }

    pub fn list_people(&self) -> Result<Vec<Person>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, birth_year, pension_claim_age, oas_residence_years, sort_order
             FROM people ORDER BY sort_order, name",
        )?;
        let rows = stmt.query_map([], person_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_person(&self, id: i64) -> Result<Person, StoreError> {
        self.conn
            .query_row(
                "SELECT id, name, birth_year, pension_claim_age, oas_residence_years, sort_order
                 FROM people WHERE id = ?1",
                params![id],
                person_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "person",
                id,
            })
    }

    pub fn update_person(&self, id: i64, person: &NewPerson) -> Result<Person, StoreError> {
        let changed = self.conn.execute(
            "UPDATE people
             SET name = ?1, birth_year = ?2, pension_claim_age = ?3,
                 oas_residence_years = ?4, sort_order = ?5
             WHERE id = ?6",
            params![
                person.name,
                person.birth_year,
                person.pension_claim_age,
                person.oas_residence_years,
                person.sort_order,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "person",
                id,
            });
        }
        self.get_person(id)
    }

    pub fn delete_person(&self, id: i64) -> Result<(), StoreError> {
        self.delete_by_id("DELETE FROM people WHERE id = ?1", "person", id)
    }

    // Accounts

    pub fn create_account(&self, account: &NewAccount) -> Result<Account, StoreError> {
        validate_allocation(
            account.equity_pct,
            account.fixed_income_pct,
            account.cash_pct,
        )?;
        self.get_person(account.person_id)?;
        self.conn.execute(
            "INSERT INTO accounts
                 (person_id, name, kind, equity_pct, fixed_income_pct, cash_pct, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.person_id,
                account.name,
                account.kind.as_str(),
                account.equity_pct,
                account.fixed_income_pct,
                account.cash_pct,
                account.sort_order,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, name = %account.name, "created account");
        self.get_account(id)
    }

    pub fn list_accounts(&self, person_id: Option<i64>) -> Result<Vec<Account>, StoreError> {
        let mut stmt = match person_id {
            Some(_) => self.conn.prepare(
                "SELECT id, person_id, name, kind, equity_pct, fixed_income_pct, cash_pct, sort_order
                 FROM accounts WHERE person_id = ?1 ORDER BY sort_order, name",
            )?,
            None => self.conn.prepare(
                "SELECT id, person_id, name, kind, equity_pct, fixed_income_pct, cash_pct, sort_order
                 FROM accounts ORDER BY sort_order, name",
            )?,
        };
        let rows = match person_id {
            Some(person_id) => stmt.query_map(params![person_id], account_from_row)?,
            None => stmt.query_map([], account_from_row)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        self.conn
            .query_row(
                "SELECT id, person_id, name, kind, equity_pct, fixed_income_pct, cash_pct, sort_order
                 FROM accounts WHERE id = ?1",
                params![id],
                account_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "account",
                id,
            })
    }

    pub fn update_account(&self, id: i64, account: &NewAccount) -> Result<Account, StoreError> {
        validate_allocation(
            account.equity_pct,
            account.fixed_income_pct,
            account.cash_pct,
        )?;
        self.get_person(account.person_id)?;
        let changed = self.conn.execute(
            "UPDATE accounts
             SET person_id = ?1, name = ?2, kind = ?3, equity_pct = ?4,
                 fixed_income_pct = ?5, cash_pct = ?6, sort_order = ?7
             WHERE id = ?8",
            params![
                account.person_id,
                account.name,
                account.kind.as_str(),
                account.equity_pct,
                account.fixed_income_pct,
                account.cash_pct,
                account.sort_order,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "account",
                id,
            });
        }
        self.get_account(id)
    }

    pub fn set_account_allocation(
        &self,
        id: i64,
        equity_pct: f64,
        fixed_income_pct: f64,
        cash_pct: f64,
    ) -> Result<Account, StoreError> {
        validate_allocation(equity_pct, fixed_income_pct, cash_pct)?;
        let changed = self.conn.execute(
            "UPDATE accounts SET equity_pct = ?1, fixed_income_pct = ?2, cash_pct = ?3
             WHERE id = ?4",
            params![equity_pct, fixed_income_pct, cash_pct, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "account",
                id,
            });
        }
        self.get_account(id)
    }

    pub fn delete_account(&self, id: i64) -> Result<(), StoreError> {
        self.delete_by_id("DELETE FROM accounts WHERE id = ?1", "account", id)
    }

    // Balance snapshots

    pub fn record_balance(
        &self,
        account_id: i64,
        recorded_on: NaiveDate,
        balance: f64,
    ) -> Result<BalanceSnapshot, StoreError> {
        self.get_account(account_id)?;
        match self.conn.execute(
            "INSERT INTO balance_snapshots (account_id, recorded_on, balance) VALUES (?1, ?2, ?3)",
            params![account_id, recorded_on, balance],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Invalid(format!(
                    "balance for account {account_id} on {recorded_on} is already recorded"
                )));
            }
            Err(err) => return Err(err.into()),
        }
        let id = self.conn.last_insert_rowid();
        Ok(BalanceSnapshot {
            id,
            account_id,
            recorded_on,
            balance,
        })
    }

    /// Records one snapshot per entry, all dated the same day, in a single
    /// transaction; any bad entry rolls back the whole batch.
    pub fn record_balances_bulk(
        &mut self,
        recorded_on: NaiveDate,
        entries: &[BalanceEntry],
    ) -> Result<Vec<BalanceSnapshot>, StoreError> {
        let tx = self.conn.transaction()?;
        let mut recorded = Vec::with_capacity(entries.len());
        for entry in entries {
            let known: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?1)",
                params![entry.account_id],
                |row| row.get(0),
            )?;
            if !known {
                return Err(StoreError::NotFound {
                    entity: "account",
                    id: entry.account_id,
                });
            }
            match tx.execute(
                "INSERT INTO balance_snapshots (account_id, recorded_on, balance)
                 VALUES (?1, ?2, ?3)",
                params![entry.account_id, recorded_on, entry.balance],
            ) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::Invalid(format!(
                        "balance for account {} on {recorded_on} is already recorded",
                        entry.account_id
                    )));
                }
                Err(err) => return Err(err.into()),
            }
            recorded.push(BalanceSnapshot {
                id: tx.last_insert_rowid(),
                account_id: entry.account_id,
                recorded_on,
                balance: entry.balance,
            });
        }
        tx.commit()?;
        tracing::debug!(count = recorded.len(), %recorded_on, "recorded balance batch");
        Ok(recorded)
    }

    pub fn list_balances(&self, account_id: i64) -> Result<Vec<BalanceSnapshot>, StoreError> {
        self.get_account(account_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, recorded_on, balance
             FROM balance_snapshots WHERE account_id = ?1 ORDER BY recorded_on",
        )?;
        let rows = stmt.query_map(params![account_id], snapshot_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_balance(&self, id: i64) -> Result<(), StoreError> {
        self.delete_by_id(
            "DELETE FROM balance_snapshots WHERE id = ?1",
            "balance snapshot",
            id,
        )
    }

    /// Newest snapshot per account, zero when an account has none.
    pub fn latest_account_balances(&self) -> Result<Vec<AccountBalance>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.person_id, a.name, a.kind,
                    COALESCE((SELECT b.balance FROM balance_snapshots b
                              WHERE b.account_id = a.id
                              ORDER BY b.recorded_on DESC, b.id DESC
                              LIMIT 1), 0.0)
             FROM accounts a ORDER BY a.sort_order, a.name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AccountBalance {
                account_id: row.get(0)?,
                person_id: row.get(1)?,
                name: row.get(2)?,
                kind: parse_account_kind(row.get::<_, String>(3)?),
                balance: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Return entries

    pub fn record_return(
        &self,
        account_id: i64,
        year: i32,
        return_pct: f64,
    ) -> Result<ReturnEntry, StoreError> {
        self.get_account(account_id)?;
        match self.conn.execute(
            "INSERT INTO return_entries (account_id, year, return_pct) VALUES (?1, ?2, ?3)",
            params![account_id, year, return_pct],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Invalid(format!(
                    "return for account {account_id} in {year} is already recorded"
                )));
            }
            Err(err) => return Err(err.into()),
        }
        Ok(ReturnEntry {
            id: self.conn.last_insert_rowid(),
            account_id,
            year,
            return_pct,
        })
    }

    pub fn list_returns(&self, account_id: i64) -> Result<Vec<ReturnEntry>, StoreError> {
        self.get_account(account_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, account_id, year, return_pct
             FROM return_entries WHERE account_id = ?1 ORDER BY year",
        )?;
        let rows = stmt.query_map(params![account_id], return_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_return(&self, id: i64) -> Result<(), StoreError> {
        self.delete_by_id(
            "DELETE FROM return_entries WHERE id = ?1",
            "return entry",
            id,
        )
    }

    // Income sources

    pub fn create_income_source(
        &self,
        source: &NewIncomeSource,
    ) -> Result<IncomeSource, StoreError> {
        self.get_person(source.person_id)?;
        self.conn.execute(
            "INSERT INTO income_sources
                 (person_id, name, kind, annual_amount, starts_year, ends_year, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                source.person_id,
                source.name,
                source.kind.as_str(),
                source.annual_amount,
                source.starts_year,
                source.ends_year,
                source.sort_order,
            ],
        )?;
        self.get_income_source(self.conn.last_insert_rowid())
    }

    pub fn list_income_sources(
        &self,
        person_id: Option<i64>,
    ) -> Result<Vec<IncomeSource>, StoreError> {
        let mut stmt = match person_id {
            Some(_) => self.conn.prepare(
                "SELECT id, person_id, name, kind, annual_amount, starts_year, ends_year, sort_order
                 FROM income_sources WHERE person_id = ?1 ORDER BY sort_order, name",
            )?,
            None => self.conn.prepare(
                "SELECT id, person_id, name, kind, annual_amount, starts_year, ends_year, sort_order
                 FROM income_sources ORDER BY sort_order, name",
            )?,
        };
        let rows = match person_id {
            Some(person_id) => stmt.query_map(params![person_id], income_from_row)?,
            None => stmt.query_map([], income_from_row)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_income_source(&self, id: i64) -> Result<IncomeSource, StoreError> {
        self.conn
            .query_row(
                "SELECT id, person_id, name, kind, annual_amount, starts_year, ends_year, sort_order
                 FROM income_sources WHERE id = ?1",
                params![id],
                income_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "income source",
                id,
            })
    }

    pub fn update_income_source(
        &self,
        id: i64,
        source: &NewIncomeSource,
    ) -> Result<IncomeSource, StoreError> {
        self.get_person(source.person_id)?;
        let changed = self.conn.execute(
            "UPDATE income_sources
             SET person_id = ?1, name = ?2, kind = ?3, annual_amount = ?4,
                 starts_year = ?5, ends_year = ?6, sort_order = ?7
             WHERE id = ?8",
            params![
                source.person_id,
                source.name,
                source.kind.as_str(),
                source.annual_amount,
                source.starts_year,
                source.ends_year,
                source.sort_order,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "income source",
                id,
            });
        }
        self.get_income_source(id)
    }

    pub fn delete_income_source(&self, id: i64) -> Result<(), StoreError> {
        self.delete_by_id(
            "DELETE FROM income_sources WHERE id = ?1",
            "income source",
            id,
        )
    }

    // Properties

    pub fn create_property(&self, property: &NewProperty) -> Result<Property, StoreError> {
        self.conn.execute(
            "INSERT INTO properties (name, estimated_value, mortgage_balance, sort_order)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                property.name,
                property.estimated_value,
                property.mortgage_balance,
                property.sort_order,
            ],
        )?;
        self.get_property(self.conn.last_insert_rowid())
    }

    pub fn list_properties(&self) -> Result<Vec<Property>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, estimated_value, mortgage_balance, sort_order
             FROM properties ORDER BY sort_order, name",
        )?;
        let rows = stmt.query_map([], property_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_property(&self, id: i64) -> Result<Property, StoreError> {
        self.conn
            .query_row(
                "SELECT id, name, estimated_value, mortgage_balance, sort_order
                 FROM properties WHERE id = ?1",
                params![id],
                property_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                entity: "property",
                id,
            })
    }

    pub fn update_property(&self, id: i64, property: &NewProperty) -> Result<Property, StoreError> {
        let changed = self.conn.execute(
            "UPDATE properties
             SET name = ?1, estimated_value = ?2, mortgage_balance = ?3, sort_order = ?4
             WHERE id = ?5",
            params![
                property.name,
                property.estimated_value,
                property.mortgage_balance,
                property.sort_order,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "property",
                id,
            });
        }
        self.get_property(id)
    }

    pub fn delete_property(&self, id: i64) -> Result<(), StoreError> {
        self.delete_by_id("DELETE FROM properties WHERE id = ?1", "property", id)
    }

    // Stored glide path

    pub fn list_glide_waypoints(&self) -> Result<Vec<GlideWaypoint>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT year, equity_pct, fixed_income_pct, cash_pct
             FROM glide_waypoints ORDER BY year",
        )?;
        let rows = stmt.query_map([], waypoint_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Replaces the stored glide path wholesale. Every waypoint is validated
    /// before anything is written, so a bad batch leaves the old path intact.
    pub fn replace_glide_waypoints(
        &mut self,
        waypoints: &[GlideWaypoint],
    ) -> Result<Vec<GlideWaypoint>, StoreError> {
        let mut seen_years = std::collections::HashSet::new();
        for waypoint in waypoints {
            validate_allocation(
                waypoint.equity_pct,
                waypoint.fixed_income_pct,
                waypoint.cash_pct,
            )?;
            if !seen_years.insert(waypoint.year) {
                return Err(StoreError::Invalid(format!(
                    "duplicate glide path year {}",
                    waypoint.year
                )));
            }
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM glide_waypoints", [])?;
        for waypoint in waypoints {
            tx.execute(
                "INSERT INTO glide_waypoints (year, equity_pct, fixed_income_pct, cash_pct)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    waypoint.year,
                    waypoint.equity_pct,
                    waypoint.fixed_income_pct,
                    waypoint.cash_pct,
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(count = waypoints.len(), "replaced stored glide path");
        self.list_glide_waypoints()
    }

    fn delete_by_id(&self, sql: &str, entity: &'static str, id: i64) -> Result<(), StoreError> {
        let changed = self.conn.execute(sql, params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity, id });
        }
        Ok(())
    }
}

fn setup_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_year INTEGER,
            pension_claim_age INTEGER,
            oas_residence_years INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            equity_pct REAL NOT NULL,
            fixed_income_pct REAL NOT NULL,
            cash_pct REAL NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS balance_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            recorded_on TEXT NOT NULL,
            balance REAL NOT NULL,
            UNIQUE(account_id, recorded_on)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS return_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            year INTEGER NOT NULL,
            return_pct REAL NOT NULL,
            UNIQUE(account_id, year)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS income_sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES people(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            annual_amount REAL NOT NULL,
            starts_year INTEGER,
            ends_year INTEGER,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS properties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            estimated_value REAL NOT NULL,
            mortgage_balance REAL NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS glide_waypoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            year INTEGER NOT NULL UNIQUE,
            equity_pct REAL NOT NULL,
            fixed_income_pct REAL NOT NULL,
            cash_pct REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_person ON accounts(person_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_account ON balance_snapshots(account_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_returns_account ON return_entries(account_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_income_person ON income_sources(person_id)",
        [],
    )?;

    Ok(())
}

fn person_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        name: row.get(1)?,
        birth_year: row.get(2)?,
        pension_claim_age: row.get(3)?,
        oas_residence_years: row.get(4)?,
        sort_order: row.get(5)?,
    })
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        person_id: row.get(1)?,
        name: row.get(2)?,
        kind: parse_account_kind(row.get::<_, String>(3)?),
        equity_pct: row.get(4)?,
        fixed_income_pct: row.get(5)?,
        cash_pct: row.get(6)?,
        sort_order: row.get(7)?,
    })
}

fn snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BalanceSnapshot> {
    Ok(BalanceSnapshot {
        id: row.get(0)?,
        account_id: row.get(1)?,
        recorded_on: row.get(2)?,
        balance: row.get(3)?,
    })
}

fn return_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReturnEntry> {
    Ok(ReturnEntry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        year: row.get(2)?,
        return_pct: row.get(3)?,
    })
}

fn income_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IncomeSource> {
    Ok(IncomeSource {
        id: row.get(0)?,
        person_id: row.get(1)?,
        name: row.get(2)?,
        kind: IncomeKind::parse(&row.get::<_, String>(3)?).unwrap_or(IncomeKind::Other),
        annual_amount: row.get(4)?,
        starts_year: row.get(5)?,
        ends_year: row.get(6)?,
        sort_order: row.get(7)?,
    })
}

fn property_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: row.get(0)?,
        name: row.get(1)?,
        estimated_value: row.get(2)?,
        mortgage_balance: row.get(3)?,
        sort_order: row.get(4)?,
    })
}

fn waypoint_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GlideWaypoint> {
    Ok(GlideWaypoint {
        year: row.get(0)?,
        equity_pct: row.get(1)?,
        fixed_income_pct: row.get(2)?,
        cash_pct: row.get(3)?,
    })
}

fn parse_account_kind(value: String) -> AccountKind {
    AccountKind::parse(&value).unwrap_or(AccountKind::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> Store {
        Store::open_in_memory().expect("in-memory store")
    }

    fn sample_person() -> NewPerson {
        NewPerson {
            name: "Ann".to_string(),
            birth_year: Some(1971),
            pension_claim_age: None,
            oas_residence_years: None,
            sort_order: 0,
        }
    }

    fn sample_account(person_id: i64) -> NewAccount {
        NewAccount {
            person_id,
            name: "RRSP".to_string(),
            kind: AccountKind::Rrsp,
            equity_pct: 60.0,
            fixed_income_pct: 30.0,
            cash_pct: 10.0,
            sort_order: 0,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn count_rows(store: &Store, table: &str) -> i64 {
        store
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .expect("count query")
    }

    #[test]
    fn person_crud_round_trip() {
        let store = test_store();
        let created = store.create_person(&sample_person()).expect("create");
        assert_eq!(created.name, "Ann");
        assert_eq!(created.birth_year, Some(1971));

        let fetched = store.get_person(created.id).expect("get");
        assert_eq!(fetched.name, "Ann");

        let mut update = sample_person();
        update.name = "Ann B".to_string();
        update.pension_claim_age = Some(60);
        let updated = store.update_person(created.id, &update).expect("update");
        assert_eq!(updated.name, "Ann B");
        assert_eq!(updated.pension_claim_age, Some(60));

        store.delete_person(created.id).expect("delete");
        assert!(matches!(
            store.get_person(created.id),
            Err(StoreError::NotFound {
                entity: "person",
                ..
            })
        ));
    }

    #[test]
    fn people_are_listed_by_sort_order_then_name() {
        let store = test_store();
        let mut first = sample_person();
        first.name = "Zoe".to_string();
        first.sort_order = 0;
        let mut second = sample_person();
        second.name = "Abe".to_string();
        second.sort_order = 1;
        let mut third = sample_person();
        third.name = "Ada".to_string();
        third.sort_order = 1;
        store.create_person(&second).expect("create");
        store.create_person(&first).expect("create");
        store.create_person(&third).expect("create");

        let names: Vec<String> = store
            .list_people()
            .expect("list")
            .into_iter()
            .map(|person| person.name)
            .collect();
        assert_eq!(names, vec!["Zoe", "Abe", "Ada"]);
    }

    #[test]
    fn missing_person_lookup_reports_entity_and_id() {
        let store = test_store();
        let err = store.get_person(42).expect_err("must be missing");
        assert_eq!(err.to_string(), "person 42 not found");
    }

    #[test]
    fn create_account_requires_existing_person() {
        let store = test_store();
        let err = store
            .create_account(&sample_account(99))
            .expect_err("person 99 does not exist");
        assert!(matches!(
            err,
            StoreError::NotFound {
                entity: "person",
                id: 99
            }
        ));
        assert_eq!(count_rows(&store, "accounts"), 0);
    }

    #[test]
    fn bad_allocation_never_reaches_storage() {
        let store = test_store();
        let person = store.create_person(&sample_person()).expect("create");

        let mut account = sample_account(person.id);
        account.cash_pct = 5.0;
        let err = store
            .create_account(&account)
            .expect_err("allocation sums to 95");
        assert!(matches!(
            err,
            StoreError::Allocation(AllocationError::BadTotal { .. })
        ));
        assert_eq!(count_rows(&store, "accounts"), 0);
    }

    #[test]
    fn set_account_allocation_validates_then_persists() {
        let store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let account = store
            .create_account(&sample_account(person.id))
            .expect("create");

        let err = store
            .set_account_allocation(account.id, 80.0, 10.0, 5.0)
            .expect_err("sums to 95");
        assert!(matches!(err, StoreError::Allocation(_)));
        let unchanged = store.get_account(account.id).expect("get");
        assert_eq!(unchanged.equity_pct, 60.0);

        let updated = store
            .set_account_allocation(account.id, 80.0, 12.0, 8.0)
            .expect("valid split");
        assert_eq!(updated.equity_pct, 80.0);
        assert_eq!(updated.fixed_income_pct, 12.0);
        assert_eq!(updated.cash_pct, 8.0);
    }

    #[test]
    fn deleting_a_person_cascades_to_owned_rows() {
        let store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let account = store
            .create_account(&sample_account(person.id))
            .expect("create");
        store
            .record_balance(account.id, date(2026, 1, 31), 10_000.0)
            .expect("record");
        store
            .record_return(account.id, 2025, 7.5)
            .expect("record return");
        store
            .create_income_source(&NewIncomeSource {
                person_id: person.id,
                name: "Salary".to_string(),
                kind: IncomeKind::Employment,
                annual_amount: 90_000.0,
                starts_year: None,
                ends_year: None,
                sort_order: 0,
            })
            .expect("create income");

        store.delete_person(person.id).expect("delete");

        assert_eq!(count_rows(&store, "accounts"), 0);
        assert_eq!(count_rows(&store, "balance_snapshots"), 0);
        assert_eq!(count_rows(&store, "return_entries"), 0);
        assert_eq!(count_rows(&store, "income_sources"), 0);
    }

    #[test]
    fn duplicate_balance_date_is_rejected() {
        let store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let account = store
            .create_account(&sample_account(person.id))
            .expect("create");

        store
            .record_balance(account.id, date(2026, 1, 31), 10_000.0)
            .expect("first snapshot");
        let err = store
            .record_balance(account.id, date(2026, 1, 31), 11_000.0)
            .expect_err("same account and date");
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(err.to_string().contains("already recorded"));
        assert_eq!(count_rows(&store, "balance_snapshots"), 1);
    }

    #[test]
    fn bulk_balance_batch_shares_one_date() {
        let mut store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let first = store
            .create_account(&sample_account(person.id))
            .expect("create");
        let mut other = sample_account(person.id);
        other.name = "TFSA".to_string();
        other.kind = AccountKind::Tfsa;
        let second = store.create_account(&other).expect("create");

        let recorded = store
            .record_balances_bulk(
                date(2026, 6, 30),
                &[
                    BalanceEntry {
                        account_id: first.id,
                        balance: 120_000.0,
                    },
                    BalanceEntry {
                        account_id: second.id,
                        balance: 45_000.0,
                    },
                ],
            )
            .expect("bulk record");

        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|s| s.recorded_on == date(2026, 6, 30)));
        assert_eq!(store.list_balances(first.id).expect("list").len(), 1);
        assert_eq!(store.list_balances(second.id).expect("list").len(), 1);
    }

    #[test]
    fn bulk_balance_batch_rolls_back_as_a_whole() {
        let mut store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let account = store
            .create_account(&sample_account(person.id))
            .expect("create");

        // Second entry repeats the account, which collides on (account, date).
        let err = store
            .record_balances_bulk(
                date(2026, 6, 30),
                &[
                    BalanceEntry {
                        account_id: account.id,
                        balance: 120_000.0,
                    },
                    BalanceEntry {
                        account_id: account.id,
                        balance: 121_000.0,
                    },
                ],
            )
            .expect_err("duplicate within batch");
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(count_rows(&store, "balance_snapshots"), 0);

        let err = store
            .record_balances_bulk(
                date(2026, 7, 31),
                &[
                    BalanceEntry {
                        account_id: account.id,
                        balance: 120_000.0,
                    },
                    BalanceEntry {
                        account_id: 999,
                        balance: 1.0,
                    },
                ],
            )
            .expect_err("unknown account in batch");
        assert!(matches!(
            err,
            StoreError::NotFound {
                entity: "account",
                id: 999
            }
        ));
        assert_eq!(count_rows(&store, "balance_snapshots"), 0);
    }

    #[test]
    fn balances_list_in_date_order() {
        let store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let account = store
            .create_account(&sample_account(person.id))
            .expect("create");

        store
            .record_balance(account.id, date(2026, 3, 31), 102_000.0)
            .expect("record");
        store
            .record_balance(account.id, date(2026, 1, 31), 100_000.0)
            .expect("record");
        store
            .record_balance(account.id, date(2026, 2, 28), 101_000.0)
            .expect("record");

        let dates: Vec<NaiveDate> = store
            .list_balances(account.id)
            .expect("list")
            .into_iter()
            .map(|snapshot| snapshot.recorded_on)
            .collect();
        assert_eq!(
            dates,
            vec![date(2026, 1, 31), date(2026, 2, 28), date(2026, 3, 31)]
        );
    }

    #[test]
    fn latest_balances_pick_newest_snapshot_and_default_to_zero() {
        let store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let funded = store
            .create_account(&sample_account(person.id))
            .expect("create");
        let mut empty = sample_account(person.id);
        empty.name = "TFSA".to_string();
        let unfunded = store.create_account(&empty).expect("create");

        store
            .record_balance(funded.id, date(2026, 1, 31), 100_000.0)
            .expect("record");
        store
            .record_balance(funded.id, date(2026, 5, 31), 110_000.0)
            .expect("record");

        let balances = store.latest_account_balances().expect("latest");
        let by_id = |id: i64| {
            balances
                .iter()
                .find(|b| b.account_id == id)
                .expect("account present")
        };
        assert_eq!(by_id(funded.id).balance, 110_000.0);
        assert_eq!(by_id(unfunded.id).balance, 0.0);
    }

    #[test]
    fn duplicate_return_year_is_invalid() {
        let store = test_store();
        let person = store.create_person(&sample_person()).expect("create");
        let account = store
            .create_account(&sample_account(person.id))
            .expect("create");

        store
            .record_return(account.id, 2025, 7.5)
            .expect("first entry");
        let err = store
            .record_return(account.id, 2025, 8.0)
            .expect_err("same year");
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(err.to_string().contains("2025"));

        let years: Vec<i32> = store
            .list_returns(account.id)
            .expect("list")
            .into_iter()
            .map(|entry| entry.year)
            .collect();
        assert_eq!(years, vec![2025]);
    }

    #[test]
    fn income_sources_filter_by_person() {
        let store = test_store();
        let ann = store.create_person(&sample_person()).expect("create");
        let mut other = sample_person();
        other.name = "Ben".to_string();
        let ben = store.create_person(&other).expect("create");

        for (person_id, name) in [(ann.id, "Salary"), (ben.id, "Rent")] {
            store
                .create_income_source(&NewIncomeSource {
                    person_id,
                    name: name.to_string(),
                    kind: IncomeKind::Employment,
                    annual_amount: 50_000.0,
                    starts_year: None,
                    ends_year: None,
                    sort_order: 0,
                })
                .expect("create income");
        }

        assert_eq!(store.list_income_sources(None).expect("list").len(), 2);
        let only_ann = store.list_income_sources(Some(ann.id)).expect("list");
        assert_eq!(only_ann.len(), 1);
        assert_eq!(only_ann[0].name, "Salary");
    }

    #[test]
    fn property_crud_round_trip() {
        let store = test_store();
        let created = store
            .create_property(&NewProperty {
                name: "Home".to_string(),
                estimated_value: 650_000.0,
                mortgage_balance: 260_000.0,
                sort_order: 0,
            })
            .expect("create");
        assert_eq!(created.equity(), 390_000.0);

        let updated = store
            .update_property(
                created.id,
                &NewProperty {
                    name: "Home".to_string(),
                    estimated_value: 700_000.0,
                    mortgage_balance: 250_000.0,
                    sort_order: 0,
                },
            )
            .expect("update");
        assert_eq!(updated.estimated_value, 700_000.0);

        store.delete_property(created.id).expect("delete");
        assert!(store.list_properties().expect("list").is_empty());
    }

    #[test]
    fn glide_waypoints_replace_wholesale_and_read_sorted() {
        let mut store = test_store();
        let waypoints = vec![
            GlideWaypoint {
                year: 2056,
                equity_pct: 50.0,
                fixed_income_pct: 30.0,
                cash_pct: 20.0,
            },
            GlideWaypoint {
                year: 2026,
                equity_pct: 80.0,
                fixed_income_pct: 12.0,
                cash_pct: 8.0,
            },
        ];
        let stored = store.replace_glide_waypoints(&waypoints).expect("replace");
        let years: Vec<i32> = stored.iter().map(|w| w.year).collect();
        assert_eq!(years, vec![2026, 2056]);

        let replacement = vec![GlideWaypoint {
            year: 2030,
            equity_pct: 70.0,
            fixed_income_pct: 18.0,
            cash_pct: 12.0,
        }];
        let stored = store
            .replace_glide_waypoints(&replacement)
            .expect("replace");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].year, 2030);
    }

    #[test]
    fn bad_waypoint_batch_leaves_old_path_intact() {
        let mut store = test_store();
        store
            .replace_glide_waypoints(&[GlideWaypoint {
                year: 2026,
                equity_pct: 80.0,
                fixed_income_pct: 12.0,
                cash_pct: 8.0,
            }])
            .expect("seed");

        let bad_sum = vec![
            GlideWaypoint {
                year: 2030,
                equity_pct: 70.0,
                fixed_income_pct: 18.0,
                cash_pct: 12.0,
            },
            GlideWaypoint {
                year: 2035,
                equity_pct: 70.0,
                fixed_income_pct: 18.0,
                cash_pct: 2.0,
            },
        ];
        assert!(matches!(
            store.replace_glide_waypoints(&bad_sum),
            Err(StoreError::Allocation(_))
        ));

        let duplicate_years = vec![
            GlideWaypoint {
                year: 2030,
                equity_pct: 70.0,
                fixed_income_pct: 18.0,
                cash_pct: 12.0,
            },
            GlideWaypoint {
                year: 2030,
                equity_pct: 60.0,
                fixed_income_pct: 24.0,
                cash_pct: 16.0,
            },
        ];
        assert!(matches!(
            store.replace_glide_waypoints(&duplicate_years),
            Err(StoreError::Invalid(_))
        ));

        let kept = store.list_glide_waypoints().expect("list");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].year, 2026);
    }
}
