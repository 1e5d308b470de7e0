//! Cover art resolution for album directories.
//!
//! Sources in priority order: art embedded in a track, a cover file already
//! in the directory, then network providers. Whatever wins is checked for
//! decodability and repaired when possible.

mod format;
mod providers;
mod resolve;

#[cfg(test)]
pub(crate) mod testing;

pub use format::{ImageFormat, sniff_image_format};
pub use providers::{CoverProvider, ProviderError, build_providers};
pub use resolve::{CoverOutcome, CoverResolver};
