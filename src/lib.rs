#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::perf,
    rustdoc::broken_intra_doc_links,
    missing_docs,
    clippy::missing_const_for_fn
)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! active-probing vulnerability detection over a pluggable blocking transport
//!
//! Given a baseline request/response pair and an insertion point, the checks in
//! this crate build mutated requests, send them, and analyze response deltas —
//! structural fingerprints, reflected taint markers, and timing side channels —
//! to infer server-side behavior worth reporting. The host application owns
//! scheduling, insertion-point discovery, and issue storage; this crate owns
//! the decision logic.

pub mod checks;
pub mod client;
pub mod error;
pub mod fingerprint;
pub mod issues;
pub mod markers;
pub mod payloads;
pub mod prelude;
pub mod requests;
pub mod responses;
pub mod scanner;
pub mod state;
mod std_ext;

// re-exported traits, to be available as top-level imports for users
pub use std_ext::convert::{AsBytes, AsInner, IntoInner};
pub use std_ext::Named;
