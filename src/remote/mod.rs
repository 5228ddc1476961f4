//! Remote sheet service boundary
//!
//! The engine only consumes these traits; the concrete wire protocol and the
//! sign-in flow live outside this crate. Tests substitute mock
//! implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication errors from the external auth collaborator
#[derive(Error, Debug)]
pub enum AuthError {
	/// No credential is available at all; the user must sign in
	#[error("Not authenticated")]
	NotAuthenticated,

	/// Credential expired and could not be refreshed
	#[error("Credential expired")]
	TokenExpired,
}

/// Remote API errors, classified per the engine's retry policy
#[derive(Error, Debug)]
pub enum RemoteError {
	/// The remote sheet no longer exists
	#[error("Remote sheet not found: {0}")]
	NotFound(String),

	/// Access to the sheet was revoked
	#[error("Permission denied for sheet {0}")]
	PermissionDenied(String),

	/// Explicit rate-limit signal, optionally carrying a retry-after hint
	#[error("Rate limited by remote service")]
	RateLimited { retry_after: Option<std::time::Duration> },

	/// Any other remote status error
	#[error("Remote API error {code}: {message}")]
	Api { code: u16, message: String },

	/// Connectivity failure; wrapped cause kept for diagnostics only
	#[error("Network error: {0}")]
	Network(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Metadata for one tab of a remote sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabMetadata {
	pub name: String,
	pub row_count: usize,
	pub col_count: usize,
}

/// Metadata for a remote sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetMetadata {
	pub tabs: Vec<TabMetadata>,
}

impl SheetMetadata {
	/// Reported row bound for a tab, if the tab exists.
	pub fn row_count(&self, tab_name: &str) -> Option<usize> {
		self.tabs.iter().find(|t| t.name == tab_name).map(|t| t.row_count)
	}
}

/// One cell write queued for upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
	pub tab_name: String,
	pub row: usize,
	pub col: usize,
	pub value: String,
}

/// Provider of valid credentials, refreshing transparently when expired
#[async_trait]
pub trait AuthProvider: Send + Sync {
	async fn get_valid_token(&self) -> Result<String, AuthError>;
}

/// Minimal read/write surface of the remote sheet service
#[async_trait]
pub trait RemoteClient: Send + Sync {
	/// Tab names and reported dimensions.
	async fn fetch_sheet_metadata(&self, sheet_id: &str) -> Result<SheetMetadata, RemoteError>;

	/// All values of one tab as a grid of strings. Typed remote values are
	/// stringified; blank cells come back as empty strings.
	async fn fetch_tab_values(
		&self,
		sheet_id: &str,
		tab_name: &str,
	) -> Result<Vec<Vec<String>>, RemoteError>;

	/// Apply a batch of cell updates; returns the number of cells updated.
	async fn push_cell_updates(
		&self,
		sheet_id: &str,
		updates: &[CellUpdate],
	) -> Result<usize, RemoteError>;

	/// Last-modified timestamp of the sheet.
	async fn fetch_last_modified(&self, sheet_id: &str) -> Result<DateTime<Utc>, RemoteError>;
}
