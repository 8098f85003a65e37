//! Embedded schema migrations for the PostgreSQL backend.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// Migrations in chronological order: (version, description, sql).
///
/// To add a migration, create the SQL file under `migrations/` and append an
/// entry here.
macro_rules! embedded_migrations {
    () => {
        &[(
            20240601000001i64,
            "orders",
            include_str!("../../migrations/20240601000001_orders.sql"),
        )]
    };
}

fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Runs all pending migrations. Applied versions are tracked in
/// `_sqlx_migrations`.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running embedded database migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(format!("Migration failed: {e}")))?;

    info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered_and_create_the_view() {
        let migrations = build_migrations();
        assert!(migrations.windows(2).all(|w| w[0].version < w[1].version));

        let sql = &migrations[0].sql;
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS orders"));
        assert!(sql.contains("daily_sales_mv"));
        assert!(sql.contains("CREATE UNIQUE INDEX"));
    }
}
