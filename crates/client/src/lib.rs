//! Blocking HTTP client for the archive API: stored login, record
//! fetch, remote field validation, batch save.
//!
//! The editor engine never sees this crate. The embedding application
//! owns the event loop and dispatches requests through it, feeding
//! responses back into the engine.

mod auth;
mod client;

pub use auth::{AuthCredentials, auth_file_path, load_auth, save_auth, delete_auth};
pub use client::{ArchiveClient, ClientError};
