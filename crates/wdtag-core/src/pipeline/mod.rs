//! File-level stages around the tagger.
//!
//! - **discovery**: find image files under a path
//! - **decode**: size, signature and dimension checks, then decoding
//! - **hash**: BLAKE3 content hashes for skip-existing
//! - **batch**: tag many files in sequence with per-image recovery

pub mod batch;
pub mod decode;
pub mod discovery;
pub mod hash;

pub use batch::{BatchEvent, BatchTagger};
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::FileDiscovery;
pub use hash::Hasher;
