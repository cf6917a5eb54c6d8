//! Document model types for outline extraction.
//!
//! Raw decoder output ([`PageRuns`] of [`TextRun`]s) flows through the
//! pipeline as [`TextBlock`]s and [`HeadingCandidate`]s and ends up as an
//! [`ExtractionResult`], the only type that leaves the crate as JSON.

mod block;
mod outline;
mod run;

pub use block::{HeadingCandidate, TextBlock};
pub use outline::{ExtractionResult, OutlineNode};
pub use run::{BBox, PageRuns, TextRun};
