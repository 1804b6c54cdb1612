/// Database configuration and connection management
pub mod database;

/// Program configuration loading from config.toml and first-run seeding
pub mod program;
