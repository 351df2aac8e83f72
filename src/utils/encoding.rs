//! Binary detection and text decoding
//!
//! UTF-8 is tried first; anything else goes through charset detection with
//! `chardetng` and decoding with `encoding_rs`. Both checks are heuristics.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read at most `cap` bytes of `path`. The flag is true when the file had more.
pub fn read_capped(path: &Path, cap: u64) -> io::Result<(Vec<u8>, bool)> {
    let file = File::open(path)?;
    let mut bytes = Vec::new();
    file.take(cap.saturating_add(1)).read_to_end(&mut bytes)?;
    let truncated = bytes.len() as u64 > cap;
    if truncated {
        bytes.truncate(cap as usize);
    }
    Ok((bytes, truncated))
}

/// True if the leading bytes of a file look binary.
///
/// A NUL byte anywhere in the sample, or a sample no text encoding decodes
/// cleanly, marks the file as binary.
pub fn is_binary_sample(sample: &[u8]) -> bool {
    sample.contains(&0) || decode_text(sample).is_none()
}

/// Decode bytes to text, or `None` if they do not look like text.
///
/// An incomplete UTF-8 sequence at the very end is treated as a cut (from a
/// sample or a size cap) and dropped rather than rejected.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => return Some(text.to_string()),
        Err(err) if err.error_len().is_none() => {
            return std::str::from_utf8(&bytes[..err.valid_up_to()]).ok().map(str::to_string);
        }
        Err(_) => {}
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    if encoding == encoding_rs::UTF_8 {
        return None;
    }
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}
