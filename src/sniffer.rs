//! # Type Sniffer
//!
//! Classificazione dei contenuti tramite magic bytes, senza I/O.
//!
//! ## Responsabilità:
//! - `sniff()`: dai primi ≥261 byte restituisce il MIME type, oppure rifiuta
//!   se i byte sono troppo pochi o nessuna firma corrisponde
//! - `classify()`: immagine / video / altro, con l'estensione usata solo quando
//!   la firma non è conclusiva (mai in contrasto con una firma trovata)
//! - Firme sconosciute diventano "other" e attraversano la pipeline senza modifiche
//!
//! ## Firme riconosciute:
//! - **Immagini**: JPEG, PNG, GIF, WebP, BMP, TIFF, ICO; HEIC/AVIF vengono
//!   riconosciuti ma non c'è un decoder, quindi passano invariati
//! - **Video**: MP4/M4V (solo brand noti), QuickTime, 3GP, WebM, Matroska, AVI,
//!   FLV, MPEG-PS, ASF/WMV, Ogg con stream Theora o VP8
//! - **Altri**: PDF, ZIP, MP3 (ID3), WAV, Ogg audio (trattati come "other")

use crate::error::NormalizeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of leading bytes the sniffer needs
pub const MIN_SNIFF_LEN: usize = 261;

/// Coarse classification driving the pipeline branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

/// Image types the bundled decoders can read
const DECODABLE_IMAGES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
    "image/x-icon",
];

/// `ftyp` brands of MP4-family video files
const MP4_BRANDS: &[&[u8; 4]] = &[
    b"isom", b"iso2", b"iso3", b"iso4", b"iso5", b"iso6", b"mp41", b"mp42", b"avc1", b"dash",
    b"M4V ", b"M4VH", b"M4VP", b"f4v ", b"mmp4", b"MSNV", b"NDAS", b"XAVC",
];

impl MediaKind {
    /// Images without a decoder are `Other`, so they pass through unchanged
    pub fn from_mime(mime: &str) -> Self {
        if DECODABLE_IMAGES.contains(&mime) {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: MediaKind,
    pub mime: String,
}

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "wmv", "flv", "webm", "mkv", "m4v", "3gp", "ogg", "ogv", "mpg", "mpeg",
    "ts", "mts", "vob", "divx", "m2ts", "mxf", "asf", "rm", "rmvb", "dv", "f4v",
];

/// Fast extension check, case-insensitive
pub fn is_video_extension(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// MIME type from magic bytes.
///
/// Fails with `UnknownFormat` when fewer than `MIN_SNIFF_LEN` bytes are supplied or
/// no signature matches.
pub fn sniff(head: &[u8]) -> Result<&'static str, NormalizeError> {
    if head.len() < MIN_SNIFF_LEN {
        return Err(NormalizeError::UnknownFormat(format!(
            "need at least {} bytes to sniff, got {}",
            MIN_SNIFF_LEN,
            head.len()
        )));
    }

    detect_image(head)
        .or_else(|| detect_video(head))
        .or_else(|| detect_other(head))
        .ok_or_else(|| NormalizeError::UnknownFormat("no matching signature".to_string()))
}

/// Classify an upload. A signature always wins; the extension set is only consulted
/// when the signature scan is inconclusive.
pub fn classify(filename: &str, head: &[u8]) -> Classification {
    match sniff(head) {
        Ok(mime) => Classification {
            kind: MediaKind::from_mime(mime),
            mime: mime.to_string(),
        },
        Err(_) if is_video_extension(filename) => {
            let ext = extension_of(filename).unwrap_or_default();
            Classification {
                kind: MediaKind::Video,
                mime: format!("video/{}", ext),
            }
        }
        Err(_) => Classification {
            kind: MediaKind::Other,
            mime: "application/octet-stream".to_string(),
        },
    }
}

/// Preferred file extension for a sniffed MIME type
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/x-icon" => "ico",
        "image/heif" => "heic",
        "image/avif" => "avif",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/3gpp" => "3gp",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/x-msvideo" => "avi",
        "video/x-flv" => "flv",
        "video/mpeg" => "mpg",
        "video/x-ms-asf" => "asf",
        "video/ogg" => "ogv",
        _ => return None,
    };
    Some(ext)
}

fn ftyp_brand(data: &[u8]) -> Option<&[u8]> {
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        Some(&data[8..12])
    } else {
        None
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn detect_image(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if data.starts_with(b"BM") {
        return Some("image/bmp");
    }
    if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some("image/tiff");
    }
    if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return Some("image/x-icon");
    }
    match ftyp_brand(data) {
        Some(b"avif") | Some(b"avis") => Some("image/avif"),
        Some(b"heic") | Some(b"heix") | Some(b"mif1") | Some(b"msf1") => Some("image/heif"),
        _ => None,
    }
}

fn detect_video(data: &[u8]) -> Option<&'static str> {
    if let Some(brand) = ftyp_brand(data) {
        return match brand {
            b"qt  " => Some("video/quicktime"),
            b"3gp4" | b"3gp5" | b"3gp6" | b"3g2a" => Some("video/3gpp"),
            _ if MP4_BRANDS.iter().any(|known| known.as_slice() == brand) => Some("video/mp4"),
            _ => None,
        };
    }

    // the first Ogg page carries the identification header of its only stream
    if data.starts_with(b"OggS") {
        let page = &data[..data.len().min(MIN_SNIFF_LEN)];
        if contains(page, b"\x80theora") || contains(page, b"OVP80") {
            return Some("video/ogg");
        }
        return None;
    }

    // EBML header: doctype decides between WebM and Matroska
    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        let window = &data[..data.len().min(64)];
        if window.windows(4).any(|w| w == b"webm") {
            return Some("video/webm");
        }
        return Some("video/x-matroska");
    }

    if data.starts_with(b"RIFF") && &data[8..12] == b"AVI " {
        return Some("video/x-msvideo");
    }
    if data.starts_with(b"FLV\x01") {
        return Some("video/x-flv");
    }
    if data.starts_with(&[0x00, 0x00, 0x01, 0xBA]) || data.starts_with(&[0x00, 0x00, 0x01, 0xB3]) {
        return Some("video/mpeg");
    }
    if data.starts_with(&[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11]) {
        return Some("video/x-ms-asf");
    }
    // QuickTime files without ftyp start straight with a moov/mdat/wide atom
    if matches!(&data[4..8], b"moov" | b"mdat" | b"wide" | b"free") {
        return Some("video/quicktime");
    }
    None
}

fn detect_other(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if data.starts_with(&[0x50, 0x4B, 0x03, 0x04]) || data.starts_with(&[0x50, 0x4B, 0x05, 0x06]) {
        return Some("application/zip");
    }
    if data.starts_with(b"ID3") {
        return Some("audio/mpeg");
    }
    if data.starts_with(b"RIFF") && &data[8..12] == b"WAVE" {
        return Some("audio/x-wav");
    }
    if data.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut data = prefix.to_vec();
        data.resize(MIN_SNIFF_LEN.max(prefix.len()), 0x20);
        data
    }

    #[test]
    fn test_sniff_images() {
        assert_eq!(sniff(&padded(&[0xFF, 0xD8, 0xFF, 0xE0])).unwrap(), "image/jpeg");
        assert_eq!(
            sniff(&padded(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])).unwrap(),
            "image/png"
        );
        assert_eq!(sniff(&padded(b"GIF89a")).unwrap(), "image/gif");
        assert_eq!(sniff(&padded(b"RIFF\x00\x00\x00\x00WEBPVP8 ")).unwrap(), "image/webp");
    }

    #[test]
    fn test_sniff_videos() {
        assert_eq!(sniff(&padded(b"\x00\x00\x00\x18ftypisom")).unwrap(), "video/mp4");
        assert_eq!(sniff(&padded(b"\x00\x00\x00\x14ftypqt  ")).unwrap(), "video/quicktime");
        assert_eq!(
            sniff(&padded(b"\x1A\x45\xDF\xA3\x9F\x42\x86\x81\x01B\x82\x84webm")).unwrap(),
            "video/webm"
        );
        assert_eq!(
            sniff(&padded(b"\x1A\x45\xDF\xA3\x9F\x42\x86\x81\x01B\x82\x88matroska")).unwrap(),
            "video/x-matroska"
        );
        assert_eq!(sniff(&padded(b"RIFF\x00\x00\x00\x00AVI LIST")).unwrap(), "video/x-msvideo");
    }

    #[test]
    fn test_sniff_rejects_short_input() {
        let err = sniff(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownFormat(_)));
    }

    #[test]
    fn test_text_file_classifies_as_other() {
        let text = "hello world, this is a plain text upload\n".repeat(10);
        let classification = classify("notes.txt", text.as_bytes());
        assert_eq!(classification.kind, MediaKind::Other);
    }

    #[test]
    fn test_signature_wins_over_extension() {
        // a JPEG uploaded with a video extension is still an image
        let jpeg = padded(&[0xFF, 0xD8, 0xFF, 0xE0]);
        let classification = classify("clip.mp4", &jpeg);
        assert_eq!(classification.kind, MediaKind::Image);
        assert_eq!(classification.mime, "image/jpeg");
    }

    #[test]
    fn test_extension_used_when_signature_inconclusive() {
        let unknown = padded(b"\x00\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b");
        assert_eq!(classify("movie.MKV", &unknown).kind, MediaKind::Video);
        assert_eq!(classify("movie.bin", &unknown).kind, MediaKind::Other);
    }

    #[test]
    fn test_is_video_extension() {
        assert!(is_video_extension("a.mp4"));
        assert!(is_video_extension("b.MoV"));
        assert!(!is_video_extension("c.jpg"));
        assert!(!is_video_extension("no_extension"));
    }

    #[test]
    fn test_audio_ftyp_is_not_video() {
        let m4a = padded(b"\x00\x00\x00\x20ftypM4A ");
        assert!(sniff(&m4a).is_err());
    }

    #[test]
    fn test_unknown_ftyp_brands_are_not_video() {
        for brand in [&b"crx "[..], b"jp2 ", b"zzzz"] {
            let mut head = b"\x00\x00\x00\x18ftyp".to_vec();
            head.extend_from_slice(brand);
            assert!(sniff(&padded(&head)).is_err(), "{:?}", brand);
        }
        assert_eq!(sniff(&padded(b"\x00\x00\x00\x18ftypmp42")).unwrap(), "video/mp4");
        assert_eq!(sniff(&padded(b"\x00\x00\x00\x18ftypM4V ")).unwrap(), "video/mp4");
    }

    #[test]
    fn test_undecodable_images_pass_through() {
        let heic = classify("photo.heic", &padded(b"\x00\x00\x00\x18ftypheic"));
        assert_eq!(heic.mime, "image/heif");
        assert_eq!(heic.kind, MediaKind::Other);

        let avif = classify("photo.avif", &padded(b"\x00\x00\x00\x1cftypavif"));
        assert_eq!(avif.kind, MediaKind::Other);

        let tiff = classify("scan.tif", &padded(&[0x49, 0x49, 0x2A, 0x00]));
        assert_eq!(tiff.kind, MediaKind::Image);
        let ico = classify("favicon.ico", &padded(&[0x00, 0x00, 0x01, 0x00]));
        assert_eq!(ico.kind, MediaKind::Image);
    }

    #[test]
    fn test_ogg_video_and_audio() {
        let mut theora = b"OggS\x00\x02".to_vec();
        theora.resize(28, 0);
        theora.extend_from_slice(b"\x80theora\x03\x02\x01");
        let class = classify("clip.ogv", &padded(&theora));
        assert_eq!(class.kind, MediaKind::Video);
        assert_eq!(extension_for_mime(&class.mime), Some("ogv"));

        let mut vorbis = b"OggS\x00\x02".to_vec();
        vorbis.resize(28, 0);
        vorbis.extend_from_slice(b"\x01vorbis\x00\x00\x00\x00");
        let class = classify("song.ogg", &padded(&vorbis));
        assert_eq!(class.mime, "audio/ogg");
        assert_eq!(class.kind, MediaKind::Other);
    }
}
