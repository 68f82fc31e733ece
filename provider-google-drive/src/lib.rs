//! # Google Drive Transporter
//!
//! Typed async facade over the Google Drive API v3 `files` resource.
//!
//! ## Overview
//!
//! This module provides:
//! - [`DriveTransporter`], one method per Drive operation: copy, create,
//!   upload, update, delete, empty trash, export, generate ids, get, list
//!   and watch
//! - [`auth`], constructors for user OAuth and service account (JSON or
//!   PKCS#12) credentials
//! - [`scope`], the standard Drive OAuth scopes
//!
//! Every request is a single round trip. Failures are returned as
//! [`DriveError`] with the original cause kept as the error source; nothing is
//! retried.

pub mod auth;
pub mod error;
pub mod scope;
pub mod transporter;
pub mod types;

pub use error::{DriveError, RequestFailure, Result};
pub use transporter::DriveTransporter;
pub use types::{Channel, DriveFile, FileList, GeneratedIds, ListQuery, FOLDER_MIME_TYPE};
