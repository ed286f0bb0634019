pub mod comparator;
pub mod engine;
pub mod paths;
pub mod scanner;
pub mod transfer;

pub use comparator::{contents_equal, is_strictly_newer, FileComparator, SyncDecision};
pub use engine::{FileOutcome, SyncEngine, SyncEvent, SyncReport, SyncStatus};
pub use paths::{create_dir_all, resolve_or_create_destination, resolve_source, ResolvedDestination};
pub use scanner::{list_regular_files, sort_bytewise, FileScanner, ScanConfig};
pub use transfer::transfer;
