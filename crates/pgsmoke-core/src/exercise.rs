//! Fixed SQL exercise run against the provisioned database.
//!
//! # Design
//! - Statements are static text; every value travels as a positional bind parameter.
//! - Each step maps driver failures to its own error kind so callers can tell
//!   schema, write, query, and decode failures apart.
//! - Row reads are streamed; a stream is consumed once and a fresh query is
//!   needed to read the rows again.

use futures_util::{Stream, StreamExt};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::connection::DatabaseHandle;
use crate::error::{HarnessError, HarnessResult};

/// DDL for the exercised table. Deliberately not `IF NOT EXISTS`.
pub const CREATE_USERS_TABLE: &str = "CREATE TABLE users (id SERIAL PRIMARY KEY, name VARCHAR(255));";

/// Two-row insert with positional parameters.
pub const INSERT_USERS: &str = "INSERT INTO users (name) VALUES ($1), ($2);";

/// Reads every row back.
pub const SELECT_USERS: &str = "SELECT id, name FROM users;";

/// Aggregate row count.
pub const COUNT_USERS: &str = "SELECT COUNT(*) FROM users;";

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    /// Generated primary key.
    pub id: i32,
    /// Stored name.
    pub name: String,
}

impl UserRow {
    fn decode(row: &PgRow) -> HarnessResult<Self> {
        let id = row
            .try_get::<i32, _>("id")
            .map_err(HarnessError::decode("id"))?;
        let name = row
            .try_get::<String, _>("name")
            .map_err(HarnessError::decode("name"))?;
        Ok(Self { id, name })
    }
}

/// Issues the exercise statements over a borrowed connection.
pub struct ExerciseDriver<'h> {
    conn: &'h mut PgConnection,
}

impl<'h> ExerciseDriver<'h> {
    /// Drive the exercise over `handle`.
    pub const fn new(handle: &'h mut DatabaseHandle) -> Self {
        Self {
            conn: handle.connection(),
        }
    }

    /// Create the `users` table.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Schema`] if the statement fails, including when
    /// the table already exists.
    pub async fn create_schema(&mut self) -> HarnessResult<()> {
        sqlx::query(CREATE_USERS_TABLE)
            .execute(&mut *self.conn)
            .await
            .map_err(HarnessError::schema("users.create"))?;
        debug!("users table created");
        Ok(())
    }

    /// Insert both names in a single statement.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Write`] if the insert fails.
    pub async fn insert_users(&mut self, names: [&str; 2]) -> HarnessResult<u64> {
        let [first, second] = names;
        let inserted = sqlx::query(INSERT_USERS)
            .bind(first.to_owned())
            .bind(second.to_owned())
            .execute(&mut *self.conn)
            .await
            .map_err(HarnessError::write("users.insert"))?
            .rows_affected();
        debug!(inserted, "users inserted");
        Ok(inserted)
    }

    /// Stream every row of the table.
    ///
    /// The stream yields [`HarnessError::Query`] if the query fails and
    /// [`HarnessError::Decode`] for a row whose columns cannot be read into a
    /// [`UserRow`]. Callers stop at the first error.
    pub fn users(&mut self) -> impl Stream<Item = HarnessResult<UserRow>> + '_ {
        sqlx::query(SELECT_USERS)
            .fetch(&mut *self.conn)
            .map(|fetched| -> HarnessResult<UserRow> {
                let row = fetched.map_err(|source| HarnessError::Query {
                    operation: "users.select",
                    source,
                })?;
                let user = UserRow::decode(&row)?;
                info!(id = user.id, name = %user.name, "user row scanned");
                Ok(user)
            })
    }

    /// Count the rows in the table.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Query`] if the aggregate query fails.
    pub async fn count_users(&mut self) -> HarnessResult<i64> {
        let count: i64 = sqlx::query_scalar(COUNT_USERS)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(HarnessError::query("users.count"))?;
        debug!(count, "users counted");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_never_interpolate_values() {
        assert!(INSERT_USERS.contains("$1") && INSERT_USERS.contains("$2"));
        for statement in [CREATE_USERS_TABLE, INSERT_USERS, SELECT_USERS, COUNT_USERS] {
            assert!(!statement.contains("Alice"));
            assert!(!statement.contains("Bob"));
        }
    }

    #[test]
    fn table_creation_is_not_idempotent() {
        assert!(!CREATE_USERS_TABLE.to_ascii_uppercase().contains("IF NOT EXISTS"));
    }
}
