//! Sticky - verified offline cache with pinned worker updates
//!
//! Serves a static deployment only from content whose digest matches its
//! build manifest, keeps each deployment in its own cache generation, and
//! pins the worker script so a new version installs only when the
//! application asks for it. An unsolicited install puts the client into
//! brick mode until its state is reset.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod integrity;
pub mod manifest;
pub mod net;
pub mod proxy;
pub mod resolve;
pub mod store;
pub mod ui;
pub mod worker;

pub use error::{StickyError, StickyResult};
