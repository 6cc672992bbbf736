//! Database schema migration engine.
//!
//! Tracks a monotonically increasing schema version in the `meta` database
//! and runs sequential migration functions to bring an older store up to
//! date.

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// The schema version that the current code writes and expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    /// Check the stored schema version and run any needed migrations.
    ///
    /// - A store without a header is fresh; genesis stamps the version.
    /// - A header without a version key is version 0.
    /// - If the stored version is *higher* than what this code supports,
    ///   the store was written by a newer node and we refuse to open it.
    pub fn run(env: &LmdbEnvironment) -> Result<(), LmdbError> {
        let rtxn = env.env().read_txn()?;
        let has_header = crate::meta::read_meta(&env.meta_db, &rtxn)?.is_some();
        let stored = crate::meta::read_version(&env.meta_db, &rtxn)?;
        drop(rtxn);

        if !has_header {
            return Ok(());
        }
        let current = stored.unwrap_or(0);

        if current == CURRENT_SCHEMA_VERSION {
            tracing::info!(version = current, "database schema is up to date");
            return Ok(());
        }

        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::SchemaTooNew {
                found: current,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        let mut wtxn = env.env().write_txn()?;
        for version in current..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_migration(version, version + 1)?;
        }
        crate::meta::write_version(&env.meta_db, &mut wtxn, CURRENT_SCHEMA_VERSION)?;
        wtxn.commit()?;

        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }
}

fn run_migration(from: u32, to: u32) -> Result<(), LmdbError> {
    match (from, to) {
        (0, 1) => {
            // Version 0 headers predate the version key; the layout is the same.
            Ok(())
        }
        _ => Err(LmdbError::UnknownMigration { from, to }),
    }
}
