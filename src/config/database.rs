//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! models without hand-written SQL. Creation is idempotent and safe to run on
//! every startup.

use crate::entities::{
    Ambassador, BenefitSlab, Campus, CampusGradeFee, ReferralLead, Student, SystemState,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::info;

/// Database used when `DATABASE_URL` is not set
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/referral_buddy.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, or the
/// default local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Establishes a connection to `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_sqlite_dir(database_url)?;
    let db = Database::connect(database_url).await?;
    info!("Connected to database");
    Ok(db)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables that do not exist yet, parents before children.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Campus).await?;
    create_table(db, &schema, CampusGradeFee).await?;
    create_table(db, &schema, BenefitSlab).await?;
    create_table(db, &schema, Ambassador).await?;
    create_table(db, &schema, ReferralLead).await?;
    create_table(db, &schema, Student).await?;
    create_table(db, &schema, SystemState).await?;

    Ok(())
}
