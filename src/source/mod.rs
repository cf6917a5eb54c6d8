//! Page source abstraction.
//!
//! The extraction pipeline never touches a concrete PDF library. It consumes
//! [`PageRuns`] from a [`PageSource`], which keeps the decoder swappable and
//! lets tests feed hand-built documents.

mod lopdf_source;

pub use lopdf_source::LopdfSource;

use std::path::Path;

use crate::error::Result;
use crate::model::PageRuns;

/// Supplies positioned text runs for every page of a document.
///
/// Implementations must return an entry (possibly with no runs) for an empty
/// page rather than failing, and may fail for unreadable or corrupt files.
/// Pages are 0-indexed and returned in order.
pub trait PageSource: Send + Sync {
    /// Load the runs of every page of the document at `path`.
    fn load_pages(&self, path: &Path) -> Result<Vec<PageRuns>>;

    /// Short name used in log messages.
    fn name(&self) -> &str;
}
