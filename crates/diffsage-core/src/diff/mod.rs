mod chunker;
mod fetch;
mod locator;
pub mod parse;

pub use chunker::{strip_binary_patches, ChunkedDiff, DiffChunk, DiffChunker};
pub use fetch::{HttpPatchFetcher, PatchFetcher};
pub use locator::locate_diff;
pub use parse::{parse_diff, FileDiff, Hunk};
