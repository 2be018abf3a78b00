//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `Record` is opaque payload: nothing upstream of a sink inspects its fields
//! - `Batch` is an ordered, bounded group of records, loaned read-only to sinks
//! - `SinkResult` is the per (batch, sink) outcome, folded into a `RunReport`

mod blueprint;
mod error;
mod observer;
mod record;
mod report;
mod result;
mod sink;
mod source;

pub use blueprint::*;
pub use error::*;
pub use observer::{NoopObserver, PipelineObserver, RunState};
pub use record::{Batch, Record};
pub use report::{RunReport, SinkTotals, MAX_ERROR_SAMPLES};
pub use result::SinkResult;
pub use sink::*;
pub use source::*;
