//! courier — asynchronous SMS dispatch service.
//!
//! Accepts requests to deliver a text message to a phone number, durably
//! records the intent, dispatches it asynchronously through a third-party
//! transport behind a blacklist gate, and tracks the outcome through a
//! small status/failure-code state machine. Lifecycle state is read from
//! the row store; free-text and time-range queries go through a
//! denormalized search index.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blacklist;
pub mod config;
pub mod dispatch;
pub mod index;
pub mod logging;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;
