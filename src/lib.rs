//! # Campdesk
//!
//! Roster and curriculum service for youth camp programs, usable both as a
//! standalone binary and as a library.
//!
//! Guardians share students, instructors share programs, programs keep an
//! ordered list of levels, and camps run a program with a roster of
//! instructors led by one primary instructor.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! campdesk = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use campdesk::policy::AccessPolicy;
//! use campdesk::server::{AppState, create_router};
//! use campdesk::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/campdesk.db").unwrap();
//! store.initialize().unwrap();
//! let policy = AccessPolicy::load(&store).unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), policy, Duration::from_secs(60)));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `campdesk` binary. Disable with `default-features = false`.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod membership;
pub mod ordering;
pub mod policy;
pub mod repository;
pub mod server;
pub mod store;
pub mod types;
