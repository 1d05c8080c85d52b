//! Polls a student's registration data behind a CAS single sign-on, keeps
//! the last payload per term, and reports when it changes.
//!
//! Everything here takes its configuration as parameters; the binary in
//! `main.rs` is just one front end.

pub mod config;
pub mod credentials;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod journal;
pub mod notify;
pub mod parse;
pub mod rweb;
pub mod scrape;
pub mod session;
pub mod store;
pub mod structs;
pub mod watch;

pub use config::{Quarter, Settings, Term};
pub use credentials::Credentials;
pub use detect::detect;
pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use fetch::{FetchMode, Fetcher, Portal, Source};
pub use journal::Journal;
pub use notify::{Dispatch, Notifier};
pub use store::SnapshotStore;
pub use structs::{ChangeReport, Course, DeliveryResult, Snapshot};
