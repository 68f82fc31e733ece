//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//! - `SecureStore` as a private directory of token files
//! - `AuthorizationCodeReceiver` as a loopback HTTP listener that opens the
//!   consent page in the default browser
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DirectorySecureStore, LoopbackCodeReceiver, ReqwestHttpClient};
//!
//! let http = ReqwestHttpClient::new()?;
//! let store = DirectorySecureStore::new("/home/me/.cache/drive-transporter");
//! let receiver = LoopbackCodeReceiver::bind().await?;
//! ```

mod http;
mod loopback;
mod secure_store;

pub use http::ReqwestHttpClient;
pub use loopback::LoopbackCodeReceiver;
pub use secure_store::DirectorySecureStore;
