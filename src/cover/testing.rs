//! Fake images, a fake decoder and scripted providers.

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use super::{CoverProvider, ProviderError, sniff_image_format};
use crate::tools::ToolOutcome;
use crate::tools::testing::{ScriptedRunner, fail, last_arg, ok};

pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0 a decodable jpeg";
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n a decodable png";
pub const BROKEN_JPEG: &[u8] = b"\xff\xd8\xff\xe0 truncated BROKEN";
pub const REPAIRED_JPEG: &[u8] = b"\xff\xd8\xff\xe0 re-encoded";

/// Decodes when the bytes carry image magic and are not marked broken.
pub fn decodes(path: &Path) -> bool {
    fs::read(path)
        .map(|b| sniff_image_format(&b).is_some() && !b.ends_with(b"BROKEN"))
        .unwrap_or(false)
}

/// Answers image decode checks and re-encodes. `ffprobe` always fails so
/// format detection relies on magic bytes.
pub fn image_outcome(program: &Path, args: &[String], can_repair: bool) -> Option<ToolOutcome> {
    let is_probe = program.file_name().is_some_and(|n| n == "ffprobe");
    if is_probe && args.iter().any(|a| a == "default=nw=1:nk=1") {
        return Some(fail("probe unavailable"));
    }
    if args.iter().any(|a| a == "null") {
        let input = Path::new(&args[3]);
        return Some(if decodes(input) {
            ok(b"")
        } else {
            fail("Invalid data found when processing input")
        });
    }
    if args.iter().any(|a| a == "-q:v") {
        if !can_repair {
            return Some(fail("Error while decoding stream"));
        }
        fs::write(last_arg(args), REPAIRED_JPEG).unwrap();
        return Some(ok(b""));
    }
    None
}

pub fn image_runner(can_repair: bool) -> ScriptedRunner {
    ScriptedRunner::new(move |program, args| {
        image_outcome(program, args, can_repair).unwrap_or_else(|| fail("unexpected call"))
    })
}

/// Provider answering with fixed bytes (or nothing) and counting calls.
pub struct FakeProvider {
    pub name: &'static str,
    pub image: Option<Vec<u8>>,
    pub calls: Rc<Cell<usize>>,
}

impl FakeProvider {
    pub fn boxed(
        name: &'static str,
        image: Option<&[u8]>,
    ) -> (Box<dyn CoverProvider>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let provider = FakeProvider {
            name,
            image: image.map(<[u8]>::to_vec),
            calls: Rc::clone(&calls),
        };
        (Box::new(provider), calls)
    }
}

impl CoverProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fetch(&self, _artist: &str, album: &str) -> Result<Vec<u8>, ProviderError> {
        self.calls.set(self.calls.get() + 1);
        self.image
            .clone()
            .ok_or_else(|| ProviderError::NotFound(album.to_string()))
    }
}
