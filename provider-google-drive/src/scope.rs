//! Google Drive OAuth 2.0 scopes
//!
//! See: https://developers.google.com/drive/api/guides/api-specific-auth

/// Full access to all files
pub const DRIVE: &str = "https://www.googleapis.com/auth/drive";

/// Files created or opened by the app
pub const DRIVE_FILE: &str = "https://www.googleapis.com/auth/drive.file";

pub const DRIVE_READONLY: &str = "https://www.googleapis.com/auth/drive.readonly";

pub const DRIVE_METADATA_READONLY: &str =
    "https://www.googleapis.com/auth/drive.metadata.readonly";

/// The hidden application data folder
pub const DRIVE_APPDATA: &str = "https://www.googleapis.com/auth/drive.appdata";
