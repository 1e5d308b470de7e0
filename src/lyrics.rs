//! Lyric files: LRC parsing, subtitle generation and binding loose lyric
//! files to their tracks.

mod align;
pub mod lrc;

pub use align::{AlignStats, LyricAligner};
