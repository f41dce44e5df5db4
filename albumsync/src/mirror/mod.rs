pub mod diff;
pub mod engine;
pub mod scan;
pub mod tree;

pub use diff::diff;
pub use engine::{FileFailure, MirrorEngine, MirrorError, MirrorOptions, MirrorReport};
pub use scan::{LocalScanner, ScanError, ScanResult};
pub use tree::{DirId, DirectoryTree, UploadDirectory, UploadItem};
