use std::fs::File;
use std::io::Read;
use std::path::Path;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";

/// The two cover encodings the library layout knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    /// Canonical cover file name for this encoding.
    pub fn cover_name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "Cover.jpg",
            ImageFormat::Png => "Cover.png",
        }
    }

    /// The format a file name claims by its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    /// Map an `ffprobe` codec name.
    pub fn from_codec_name(codec: &str) -> Option<Self> {
        match codec.trim().to_ascii_lowercase().as_str() {
            "mjpeg" | "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            ImageFormat::Jpeg => ImageFormat::Png,
            ImageFormat::Png => ImageFormat::Jpeg,
        }
    }
}

/// Encoding from magic bytes.
pub fn sniff_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_MAGIC) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(JPEG_MAGIC) {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

pub fn sniff_file_format(path: &Path) -> Option<ImageFormat> {
    let mut header = Vec::with_capacity(PNG_MAGIC.len());
    File::open(path)
        .ok()?
        .take(PNG_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .ok()?;
    sniff_image_format(&header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_and_jpeg() {
        assert_eq!(sniff_image_format(b"\x89PNG\r\n\x1a\nrest"), Some(ImageFormat::Png));
        assert_eq!(sniff_image_format(b"\xff\xd8\xff\xe0JFIF"), Some(ImageFormat::Jpeg));
        assert_eq!(sniff_image_format(b"GIF89a"), None);
        assert_eq!(sniff_image_format(b""), None);
    }

    #[test]
    fn codec_names_map_to_formats() {
        assert_eq!(ImageFormat::from_codec_name("mjpeg\n"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_codec_name("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_codec_name("webp"), None);
    }

    #[test]
    fn extension_claims() {
        assert_eq!(ImageFormat::from_path(Path::new("Cover.JPEG")), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_path(Path::new("Cover.png")), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_path(Path::new("Cover")), None);
        assert_eq!(ImageFormat::Png.other().cover_name(), "Cover.jpg");
    }
}
