//! List scheduling of operation segments into VLIW bundles.
//!
//! Packs each segment's operations into cycles subject to per-engine slot
//! limits, honouring strict edges with a gap of at least one cycle and
//! weak edges with a gap of at least zero. Priorities are driven by
//! critical-path length with optional seeded perturbation, and a
//! multi-start driver picks the best of several independent runs.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod schedule;
pub mod stats;

pub use config::SchedulerConfig;
pub use error::ScheduleError;
pub use schedule::{schedule_segment, schedule_segment_best, Schedule};
pub use stats::{segment_stats, EngineStats, SegmentStats};
