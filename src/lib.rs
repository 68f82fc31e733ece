//! Workspace facade crate.
//!
//! Re-exports the Google Drive transporter together with the auth and runtime
//! pieces a host needs to construct one. Host applications can depend on
//! `drive-transporter` alone instead of wiring each workspace crate.
//!
//! ```ignore
//! use drive_transporter::{auth, scope, DriveConfig};
//!
//! let config = DriveConfig::builder().build()?;
//! let transporter = auth::authenticate_service_account_json(
//!     &config,
//!     "service-account.json",
//!     &[scope::DRIVE],
//! )?;
//! let page = transporter.list().await?;
//! ```

pub use core_auth;
pub use core_runtime;
pub use provider_google_drive;

pub use core_runtime::config::{DriveConfig, DriveConfigBuilder};
pub use provider_google_drive::{
    auth, scope, Channel, DriveError, DriveFile, DriveTransporter, FileList, GeneratedIds,
    ListQuery, RequestFailure, Result,
};
