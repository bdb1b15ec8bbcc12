//! readeval-core: evaluation model, markup decoding and diagnostics.
//!
//! This crate defines the request/result model, the decoded evaluation
//! tree, correctness derivation, batch mapping and the admission-limited
//! engine that the rest of readeval builds on.

pub mod batch;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod markup;
pub mod model;
pub mod reference;
pub mod report;
pub mod statistics;
pub mod traits;
pub mod tree;
