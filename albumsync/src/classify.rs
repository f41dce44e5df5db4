use std::fs::File;
use std::io::Read;
use std::path::Path;

const SNIFF_LEN: u64 = 32;

/// Signatures too short to tell media from text on their own. Each one only
/// counts when the file carries one of the listed extensions.
const SHORT_SIGNATURES: &[(&[u8], &[&str], ContentKind)] = &[
    (b"BM", &["bmp", "dib"], ContentKind::Image),
    (b"FLV", &["flv"], ContentKind::Video),
    (&[0x00, 0x00, 0x01, 0xBA], &["mpg", "mpeg", "vob"], ContentKind::Video),
    (&[0x00, 0x00, 0x01, 0xB3], &["mpg", "mpeg", "m1v", "m2v"], ContentKind::Video),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Image,
    Video,
    Other,
}

impl ContentKind {
    pub fn is_media(self) -> bool {
        matches!(self, ContentKind::Image | ContentKind::Video)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a local file is worth uploading.
///
/// Implementations must not fail: anything that cannot be inspected is
/// reported as [`ContentKind::Other`].
pub trait ContentClassifier: Send + Sync {
    fn classify(&self, path: &Path) -> ContentKind;
}

impl<F> ContentClassifier for F
where
    F: Fn(&Path) -> ContentKind + Send + Sync,
{
    fn classify(&self, path: &Path) -> ContentKind {
        self(path)
    }
}

/// Content sniffing by file signature, with an extension fallback for
/// container formats that have no stable leading magic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SniffingClassifier;

impl SniffingClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ContentClassifier for SniffingClassifier {
    fn classify(&self, path: &Path) -> ContentKind {
        let header = match read_header(path) {
            Ok(header) => header,
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "cannot read file for classification");
                return ContentKind::Other;
            }
        };
        let ext = lowercase_extension(path);
        let ext = ext.as_deref();
        sniff(&header)
            .or_else(|| sniff_short(&header, ext?))
            .or_else(|| kind_from_extension(ext?))
            .unwrap_or(ContentKind::Other)
    }
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SNIFF_LEN as usize);
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut header)?;
    Ok(header)
}

fn sniff(bytes: &[u8]) -> Option<ContentKind> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || bytes.starts_with(b"II*\0")
        || bytes.starts_with(b"MM\0*")
    {
        return Some(ContentKind::Image);
    }

    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") {
        return match &bytes[8..12] {
            b"WEBP" => Some(ContentKind::Image),
            b"AVI " => Some(ContentKind::Video),
            _ => None,
        };
    }

    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some(iso_media_kind(&bytes[8..12]));
    }

    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3])
        || bytes.starts_with(&[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11])
    {
        return Some(ContentKind::Video);
    }

    None
}

// ISO base media files share one container; the major brand tells stills
// (HEIF family, Canon CR3) from audio-only and video.
fn iso_media_kind(brand: &[u8]) -> ContentKind {
    match brand {
        b"heic" | b"heix" | b"heim" | b"heis" | b"hevc" | b"hevx" | b"mif1" | b"msf1"
        | b"avif" | b"avis" | b"crx " => ContentKind::Image,
        b"M4A " | b"M4B " | b"M4P " => ContentKind::Other,
        _ => ContentKind::Video,
    }
}

fn sniff_short(bytes: &[u8], ext: &str) -> Option<ContentKind> {
    SHORT_SIGNATURES
        .iter()
        .find(|(magic, exts, _)| bytes.starts_with(magic) && exts.contains(&ext))
        .map(|(_, _, kind)| *kind)
}

fn lowercase_extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_str()?.to_ascii_lowercase())
}

fn kind_from_extension(ext: &str) -> Option<ContentKind> {
    match ext {
        "mts" | "m2ts" | "ts" | "mpg" | "mpeg" | "vob" => Some(ContentKind::Video),
        "svg" | "arw" | "raf" | "srw" | "pef" | "x3f" => Some(ContentKind::Image),
        _ => None,
    }
}
