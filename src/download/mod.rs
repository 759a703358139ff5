//! Track download pipeline
//!
//! A track goes through [`planner`] (where does it go), [`resolver`] (find and
//! fetch it), [`tagger`] (add metadata) under the control of [`orchestrator`];
//! [`batch`] runs the orchestrator over a whole collection.

pub mod batch;
pub mod orchestrator;
pub mod planner;
pub mod resolver;
pub mod tagger;

pub use batch::{progress_bar, summary_line, BatchDownloader, BatchSummary, CancelFlag};
pub use orchestrator::TrackDownloader;
pub use resolver::YtDlp;
pub use tagger::LoftyTagger;
