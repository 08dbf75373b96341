pub mod encoder;
pub mod parser;
pub mod source;
pub mod worker;

pub use encoder::encode;
pub use parser::{parse_apps_installed, parse_line, Rejection};
pub use source::{discover, mark_committed, SourceError};
pub use worker::{ingest_source, IngestSettings, SourceOutcome, SourceStats};
