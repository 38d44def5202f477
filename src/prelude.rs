//! small collection of widely used core types and traits
//!
//! The goal in using the prelude is to reduce the number of imports needed to
//! (mostly) only those that have direct impact on wiring the scanner into a
//! host application.
//!
//! # Traits
//!
//! - [`ActiveCheck`] - exposes the `active_scan` method on every check
//! - [`Transport`] - the wire every attack request goes over
//! - [`InsertionPoint`] - the host's payload-substitution capability
//! - [`IssueSink`] / [`PassiveScanSink`] - where findings and interesting
//!   exchanges are delivered
//! - [`Timed`] - exposes the `elapsed` method on attack exchanges
//! - [`Named`] - fixed names for checks and findings
//!
//! # Structs & Enums
//!
//! Core aspects of any scan with no alternatives within the library, included
//! for convenience.
//!
//! [`ActiveCheck`]: crate::checks::ActiveCheck
//! [`Transport`]: crate::client::Transport
//! [`InsertionPoint`]: crate::requests::InsertionPoint
//! [`IssueSink`]: crate::issues::IssueSink
//! [`PassiveScanSink`]: crate::issues::PassiveScanSink
//! [`Timed`]: crate::responses::Timed
//! [`Named`]: crate::Named

// traits that are likely to be used by anyone when wiring up a scan
pub use crate::checks::ActiveCheck as _;
pub use crate::client::Transport as _;
pub use crate::issues::IssueSink as _;
pub use crate::issues::PassiveScanSink as _;
pub use crate::requests::InsertionPoint as _;
pub use crate::responses::Timed as _;
pub use crate::AsInner as _;
pub use crate::Named as _;

// core structs needed by everyone
pub use crate::checks::ScanContext;
pub use crate::fingerprint::Fingerprint;
pub use crate::issues::{Confidence, Issue, Severity};
pub use crate::requests::{BaselinePair, HttpService, Scheme};
pub use crate::responses::AttackResult;
pub use crate::scanner::ActiveScanner;
pub use crate::state::ReportedTargets;

// crate's error type
pub use crate::error::FeroxScanError;
