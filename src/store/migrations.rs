use rusqlite::{Connection, Transaction};

use crate::error::DataError;

const CURRENT_SCHEMA_VERSION: i32 = 2;

pub(crate) fn run_migrations(conn: &mut Connection) -> Result<(), DataError> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(DataError::Migration(format!(
            "database version ({version}) is newer than supported schema ({CURRENT_SCHEMA_VERSION})"
        )));
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version).map_err(|e| {
            DataError::Migration(format!("migration to version {next_version} failed: {e}"))
        })?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), DataError> {
    match version {
        1 => {
            tx.execute_batch(include_str!("schemas/schema_v1.sql"))?;
            Ok(())
        }
        // Pads whole-second timestamps to the microsecond storage format
        2 => {
            tx.execute_batch(include_str!("schemas/schema_v2.sql"))?;
            Ok(())
        }
        _ => Err(DataError::Migration(format!(
            "unknown migration target version: {version}"
        ))),
    }
}
