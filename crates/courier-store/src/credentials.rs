use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

/// A named secret persisted in the `credentials` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Insert or replace the credential stored under `name`.
    pub fn set_credential(&self, name: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO credentials (name, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value,
                                             updated_at = excluded.updated_at",
            params![name, value, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(name, "credential stored");
        Ok(())
    }

    pub fn get_credential(&self, name: &str) -> Result<Option<Credential>> {
        let row = self
            .conn()
            .query_row(
                "SELECT name, value, updated_at FROM credentials WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((name, value, ts)) => {
                let updated_at = DateTime::parse_from_rfc3339(&ts)?.with_timezone(&Utc);
                Ok(Some(Credential {
                    name,
                    value,
                    updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Remove the credential stored under `name`. Returns whether a row existed.
    pub fn remove_credential(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM credentials WHERE name = ?1", params![name])?;
        tracing::debug!(name, removed = affected > 0, "credential removed");
        Ok(affected > 0)
    }
}
