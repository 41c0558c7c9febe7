//! Content type detection for response bodies written without an explicit
//! `Content-Type`.
//!
//! Implements the subset of the WHATWG MIME sniffing algorithm that browsers
//! and `net/http` agree on. At most [`SNIFF_LEN`] bytes are considered.

/// Maximum number of bytes inspected.
pub const SNIFF_LEN: usize = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

enum Signature {
    /// Case-insensitive HTML tag followed by a space or `>`.
    Html(&'static [u8]),
    /// Byte pattern with a mask, compared after optional leading whitespace.
    Masked {
        mask: &'static [u8],
        pattern: &'static [u8],
        skip_ws: bool,
        content_type: &'static str,
    },
    Exact(&'static [u8], &'static str),
    Mp4,
    Text,
}

const SIGNATURES: &[Signature] = &[
    Signature::Html(b"<!DOCTYPE HTML"),
    Signature::Html(b"<HTML"),
    Signature::Html(b"<HEAD"),
    Signature::Html(b"<SCRIPT"),
    Signature::Html(b"<IFRAME"),
    Signature::Html(b"<H1"),
    Signature::Html(b"<DIV"),
    Signature::Html(b"<FONT"),
    Signature::Html(b"<TABLE"),
    Signature::Html(b"<A"),
    Signature::Html(b"<STYLE"),
    Signature::Html(b"<TITLE"),
    Signature::Html(b"<B"),
    Signature::Html(b"<BODY"),
    Signature::Html(b"<BR"),
    Signature::Html(b"<P"),
    Signature::Html(b"<!--"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pattern: b"<?xml",
        skip_ws: true,
        content_type: "text/xml; charset=utf-8",
    },
    Signature::Exact(b"%PDF-", "application/pdf"),
    Signature::Exact(b"%!PS-Adobe-", "application/postscript"),
    // UTF-16 and UTF-8 byte order marks.
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFE\xFF\x00\x00",
        skip_ws: false,
        content_type: "text/plain; charset=utf-16be",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\x00\x00",
        pattern: b"\xFF\xFE\x00\x00",
        skip_ws: false,
        content_type: "text/plain; charset=utf-16le",
    },
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\x00",
        pattern: b"\xEF\xBB\xBF\x00",
        skip_ws: false,
        content_type: TEXT_PLAIN,
    },
    Signature::Exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Signature::Exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Signature::Exact(b"BM", "image/bmp"),
    Signature::Exact(b"GIF87a", "image/gif"),
    Signature::Exact(b"GIF89a", "image/gif"),
    Signature::Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WEBPVP",
        skip_ws: false,
        content_type: "image/webp",
    },
    Signature::Exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Signature::Exact(b"\xFF\xD8\xFF", "image/jpeg"),
    Signature::Exact(b"OggS\x00", "application/ogg"),
    Signature::Exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    Signature::Exact(b"ID3", "audio/mpeg"),
    Signature::Mp4,
    Signature::Exact(b"wOFF", "font/woff"),
    Signature::Exact(b"wOF2", "font/woff2"),
    Signature::Exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Signature::Exact(b"PK\x03\x04", "application/zip"),
    Signature::Exact(b"\x00\x61\x73\x6D", "application/wasm"),
    Signature::Text,
];

/// Returns the MIME type of `data`, always a valid content type.
///
/// ```rust,ignore
/// assert_eq!(detect_content_type(b"<html><body>"), "text/html; charset=utf-8");
/// assert_eq!(detect_content_type(b"\x89PNG\r\n\x1a\n"), "image/png");
/// ```
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let first_non_ws = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());

    SIGNATURES
        .iter()
        .find_map(|sig| sig.matches(data, first_non_ws))
        .unwrap_or(OCTET_STREAM)
}

impl Signature {
    fn matches(&self, data: &[u8], first_non_ws: usize) -> Option<&'static str> {
        match self {
            Self::Html(tag) => {
                let data = &data[first_non_ws..];
                if data.len() < tag.len() + 1 {
                    return None;
                }
                let head = &data[..tag.len()];
                if !head.eq_ignore_ascii_case(tag) {
                    return None;
                }
                matches!(data[tag.len()], b' ' | b'>').then_some("text/html; charset=utf-8")
            }
            Self::Masked {
                mask,
                pattern,
                skip_ws,
                content_type,
            } => {
                let data = if *skip_ws { &data[first_non_ws..] } else { data };
                if data.len() < pattern.len() {
                    return None;
                }
                let hit = data
                    .iter()
                    .zip(mask.iter())
                    .zip(pattern.iter())
                    .all(|((d, m), p)| d & m == *p);
                hit.then_some(*content_type)
            }
            Self::Exact(sig, content_type) => data.starts_with(sig).then_some(*content_type),
            Self::Mp4 => is_mp4(data).then_some("video/mp4"),
            Self::Text => (!data[first_non_ws..].iter().any(|b| is_binary(*b))).then_some(TEXT_PLAIN),
        }
    }
}

fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || box_size < 12 {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|st| *st != 12)
        .any(|st| data.get(st..st + 3) == Some(&b"mp4"[..]))
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_types() {
        assert_eq!(detect_content_type(b""), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"hello"), TEXT_PLAIN);
        assert_eq!(
            detect_content_type(b"  <HTML><body>hi</body>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            detect_content_type(b"<!-- comment -->"),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            detect_content_type(b"\n<?xml version=\"1.0\"?>"),
            "text/xml; charset=utf-8"
        );
        assert_eq!(detect_content_type(b"{\"a\":1}"), TEXT_PLAIN);
    }

    #[test]
    fn test_html_tag_needs_terminator() {
        // `<Bx` is not a `<B` tag.
        assert_eq!(detect_content_type(b"<Bx"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"<b>bold"), "text/html; charset=utf-8");
    }

    #[test]
    fn test_byte_order_marks() {
        assert_eq!(
            detect_content_type(b"\xFE\xFF\x00\x41"),
            "text/plain; charset=utf-16be"
        );
        assert_eq!(
            detect_content_type(b"\xFF\xFE\x41\x00"),
            "text/plain; charset=utf-16le"
        );
        assert_eq!(detect_content_type(b"\xEF\xBB\xBFhi"), TEXT_PLAIN);
    }

    #[test]
    fn test_binary_signatures() {
        assert_eq!(detect_content_type(b"%PDF-1.7"), "application/pdf");
        assert_eq!(detect_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(detect_content_type(b"\x89PNG\x0D\x0A\x1A\x0A...."), "image/png");
        assert_eq!(detect_content_type(b"\xFF\xD8\xFF\xE0"), "image/jpeg");
        assert_eq!(detect_content_type(b"RIFF\x10\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(detect_content_type(b"\x1F\x8B\x08\x00"), "application/x-gzip");
        assert_eq!(detect_content_type(b"PK\x03\x04rest"), "application/zip");
        assert_eq!(detect_content_type(b"\x00asm\x01\x00\x00\x00"), "application/wasm");
        assert_eq!(detect_content_type(b"wOF2...."), "font/woff2");
    }

    #[test]
    fn test_mp4() {
        let mut data = vec![0x00, 0x00, 0x00, 0x18];
        data.extend_from_slice(b"ftypmp42");
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"mp41isom");
        assert_eq!(detect_content_type(&data), "video/mp4");
    }

    #[test]
    fn test_binary_fallback() {
        assert_eq!(detect_content_type(b"\x01\x02\x03"), OCTET_STREAM);
    }

    #[test]
    fn test_only_prefix_is_inspected() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(detect_content_type(&data), TEXT_PLAIN);
    }
}
