//! Batch generation with MarkovJunior models.
//!
//! - `markov_junior`: the rule-rewrite engine, frame rendering and `.vox` export
//! - `batch`: the run orchestrator driving many model configurations
//! - `xml`: the element tree used by every document loader

pub mod batch;
pub mod markov_junior;
pub mod xml;
