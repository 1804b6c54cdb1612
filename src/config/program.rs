//! Program configuration loading from config.toml
//!
//! The program file holds everything an operator sets up once: when the
//! academic year starts, the default benefit tier table, the campuses with
//! their grade fees, and a few display settings. Tiers and campuses are only
//! used to seed an empty database; afterwards they are managed through the
//! bot.

use crate::{
    core::{
        academic_year::AcademicYear,
        campus::{self, NewCampus},
        tier::{self, NewSlab},
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::{info, warn};

/// Program file used when `PROGRAM_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const fn default_start_month() -> u32 {
    6
}

const fn default_live_refresh_secs() -> u64 {
    10
}

const fn default_leaderboard_size() -> usize {
    5
}

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramConfig {
    /// Month (1-12) on whose first day each academic year begins
    #[serde(default = "default_start_month")]
    pub academic_year_start_month: u32,
    /// Refresh period of live referral feeds, in seconds
    #[serde(default = "default_live_refresh_secs")]
    pub live_refresh_secs: u64,
    /// Landing page that referral links point to
    #[serde(default)]
    pub referral_base_url: String,
    /// Entries shown on the leaderboard
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    /// Tier table seeded into an empty database
    #[serde(default)]
    pub benefit_tiers: Vec<NewSlab>,
    /// Campuses seeded when their code is missing
    #[serde(default)]
    pub campuses: Vec<CampusConfig>,
}

/// One campus and its fee table.
#[derive(Debug, Clone, Deserialize)]
pub struct CampusConfig {
    #[serde(flatten)]
    pub campus: NewCampus,
    #[serde(default)]
    pub grade_fees: Vec<GradeFeeConfig>,
}

/// Annual fees of one grade.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeFeeConfig {
    pub grade: String,
    pub otp_fee: f64,
    pub wotp_fee: f64,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            academic_year_start_month: default_start_month(),
            live_refresh_secs: default_live_refresh_secs(),
            referral_base_url: String::new(),
            leaderboard_size: default_leaderboard_size(),
            benefit_tiers: Vec::new(),
            campuses: Vec::new(),
        }
    }
}

impl ProgramConfig {
    /// Checks value ranges and the tier table contract.
    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.academic_year_start_month) {
            return Err(Error::Config {
                message: format!(
                    "academic_year_start_month must be between 1 and 12, got {}",
                    self.academic_year_start_month
                ),
            });
        }
        if self.live_refresh_secs == 0 {
            return Err(Error::Config {
                message: "live_refresh_secs must be at least 1".to_string(),
            });
        }
        if self.leaderboard_size == 0 {
            return Err(Error::Config {
                message: "leaderboard_size must be at least 1".to_string(),
            });
        }
        tier::validate_new_slabs(&self.benefit_tiers).map_err(|e| Error::Config {
            message: format!("Invalid benefit_tiers: {e}"),
        })
    }

    /// The academic year containing today.
    #[must_use]
    pub fn current_academic_year(&self) -> AcademicYear {
        AcademicYear::current(self.academic_year_start_month)
    }

    #[must_use]
    pub const fn live_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.live_refresh_secs)
    }
}

/// Parses and validates a program configuration.
pub fn parse_config(contents: &str) -> Result<ProgramConfig> {
    let config: ProgramConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse program config: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads program configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid or a value is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ProgramConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!(
            "Failed to read config file {}: {e}",
            path.as_ref().display()
        ),
    })?;
    parse_config(&contents)
}

/// Loads the file named by `PROGRAM_CONFIG` (default `config.toml`). A
/// missing file yields the defaults.
pub fn load_default_config() -> Result<ProgramConfig> {
    let path = std::env::var("PROGRAM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        warn!("Program config {path} not found, using defaults");
        Ok(ProgramConfig::default())
    }
}

/// What seeding added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub slabs_created: usize,
    pub campuses_created: usize,
}

/// Seeds the tier table when it is empty and every configured campus whose
/// code is not present yet.
pub async fn seed_program(db: &DatabaseConnection, config: &ProgramConfig) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    if tier::list_slabs(db).await?.is_empty() && !config.benefit_tiers.is_empty() {
        summary.slabs_created = tier::replace_slabs(db, &config.benefit_tiers).await?.len();
    }

    for entry in &config.campuses {
        if campus::get_campus_by_code(db, &entry.campus.code).await?.is_some() {
            continue;
        }
        let created = campus::create_campus(db, entry.campus.clone()).await?;
        for fee in &entry.grade_fees {
            campus::set_grade_fee(db, created.id, &fee.grade, fee.otp_fee, fee.wotp_fee).await?;
        }
        summary.campuses_created += 1;
    }

    info!(
        "Seeded {} benefit slabs and {} campuses",
        summary.slabs_created, summary.campuses_created
    );
    Ok(summary)
}
