//! Application configuration and durable target persistence

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::SyncTarget;

/// Name of the config file inside the data directory
const CONFIG_FILE: &str = "gridsync.json";

/// Name of the targets file inside the data directory
const TARGETS_FILE: &str = "targets.json";

/// Default global backup storage budget (500 MiB)
pub const DEFAULT_BACKUP_BUDGET_BYTES: u64 = 500 * 1024 * 1024;

/// Schema migration for versioned on-disk documents
pub trait Migrate {
	fn current_version(&self) -> u32;
	fn target_version() -> u32;
	fn migrate(&mut self) -> Result<()>;
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Logging level
	pub log_level: String,

	/// Global storage budget for backups across all targets, in bytes
	pub backup_budget_bytes: u64,

	/// Remote read calls allowed per sliding minute
	pub reads_per_minute: usize,

	/// Remote write calls allowed per sliding minute
	pub writes_per_minute: usize,
}

impl AppConfig {
	/// Load configuration from a specific data directory, creating a default
	/// one when none exists.
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let mut config: AppConfig = serde_json::from_str(&json)?;

			// Apply migrations if needed
			if config.version < Self::target_version() {
				info!(
					"Migrating config from v{} to v{}",
					config.version,
					Self::target_version()
				);
				config.migrate()?;
				config.save()?;
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Load or create configuration
	pub fn load_or_create(data_dir: &Path) -> Result<Self> {
		Self::load_from(data_dir).or_else(|_| {
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		})
	}

	/// Create default configuration with specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			backup_budget_bytes: DEFAULT_BACKUP_BUDGET_BYTES,
			reads_per_minute: 60,
			writes_per_minute: 60,
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	/// Directory holding per-target baseline snapshots
	pub fn baselines_dir(&self) -> PathBuf {
		self.data_dir.join("baselines")
	}

	/// Directory holding backup files (one subdirectory per target)
	pub fn backups_dir(&self) -> PathBuf {
		self.data_dir.join("backups")
	}

	/// Path of the durable backup index
	pub fn backup_index_path(&self) -> PathBuf {
		self.data_dir.join("backup_index.json")
	}

	/// Path of the durable targets file
	pub fn targets_path(&self) -> PathBuf {
		self.data_dir.join(TARGETS_FILE)
	}

	/// Ensure all required directories exist
	pub fn ensure_directories(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;
		fs::create_dir_all(self.baselines_dir())?;
		fs::create_dir_all(self.backups_dir())?;
		Ok(())
	}
}

impl Default for AppConfig {
	fn default() -> Self {
		let data_dir = default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
		Self::default_with_dir(data_dir)
	}
}

impl Migrate for AppConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		1
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			0 => {
				self.version = 1;
				Ok(())
			}
			1 => Ok(()),
			v => Err(anyhow!("Unknown config version: {}", v)),
		}
	}
}

/// Default data directory for the current platform
pub fn default_data_dir() -> Result<PathBuf> {
	dirs::data_dir()
		.map(|d| d.join("gridsync"))
		.ok_or_else(|| anyhow!("Could not determine platform data directory"))
}

/// Initialize tracing for binaries and tests, honoring `RUST_LOG`.
pub fn init_logging(default_level: &str) {
	use tracing_subscriber::EnvFilter;

	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Durable store for configured sync targets
pub struct TargetStore {
	path: PathBuf,
}

impl TargetStore {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	/// Load all persisted targets; an absent file means no targets yet.
	pub fn load(&self) -> Result<Vec<SyncTarget>> {
		if !self.path.exists() {
			return Ok(Vec::new());
		}
		let json = fs::read_to_string(&self.path)?;
		Ok(serde_json::from_str(&json)?)
	}

	/// Persist the full target list, overwriting the previous file.
	pub fn save(&self, targets: &[SyncTarget]) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(targets)?;
		fs::write(&self.path, json)?;
		Ok(())
	}

	/// Remove one target by id and persist the remainder.
	pub fn remove(&self, target_id: Uuid) -> Result<()> {
		let mut targets = self.load()?;
		targets.retain(|t| t.id != target_id);
		self.save(&targets)
	}
}
