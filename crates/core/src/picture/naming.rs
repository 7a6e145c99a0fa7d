//! Picture filename convention.
//!
//! Encodes the `(ticket_number, camera_number, sequence)` key into a file
//! basename and decodes it back. Pure functions, no I/O.

use std::sync::LazyLock;

use regex::Regex;

use super::PictureKey;

/// Regex pattern matching an encoded stem (extension already stripped).
///
/// The ticket group is greedy, so the *last* `-CMR<digits>_<digits>` at the
/// end of the stem is taken as the suffix.
pub const STEM_PATTERN: &str = r"^(.+)-CMR([0-9]+)_([0-9]+)$";

static STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(STEM_PATTERN).expect("valid regex"));

/// Build the stem for a picture key.
///
/// Convention: `{ticket_number}-CMR{camera_number}_{sequence}`. No escaping
/// is performed.
///
/// # Examples
///
/// ```
/// use weighbridge_core::picture::naming::encode;
///
/// assert_eq!(encode("5", 1, 1), "5-CMR1_1");
/// assert_eq!(encode("PH001", 2, 3), "PH001-CMR2_3");
/// ```
pub fn encode(ticket_number: &str, camera_number: u32, sequence: u32) -> String {
    format!("{ticket_number}-CMR{camera_number}_{sequence}")
}

/// Build the full filename for a key plus an extension (`".png"` or `""`).
pub fn filename_for(key: &PictureKey, extension: &str) -> String {
    let mut name = encode(&key.ticket_number, key.camera_number, key.sequence);
    name.push_str(extension);
    name
}

/// Split a basename into `(stem, extension)`.
///
/// The extension starts at the last `.`; leading dots never start an
/// extension, so `".png"` has none.
///
/// ```
/// use weighbridge_core::picture::naming::split_extension;
///
/// assert_eq!(split_extension("5-CMR1_1.png"), ("5-CMR1_1", ".png"));
/// assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
/// assert_eq!(split_extension(".png"), (".png", ""));
/// ```
pub fn split_extension(filename: &str) -> (&str, &str) {
    let leading_dots = filename.len() - filename.trim_start_matches('.').len();
    match filename[leading_dots..].rfind('.') {
        Some(idx) => filename.split_at(leading_dots + idx),
        None => (filename, ""),
    }
}

/// Extension of the last path component of a client-supplied filename.
///
/// Both `/` and `\` count as separators since uploads come from Windows
/// clients as well.
pub fn extension_of(client_filename: &str) -> &str {
    let basename = client_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(client_filename);
    split_extension(basename).1
}

/// Decode a filename back into its key.
///
/// Strips one extension, then matches [`STEM_PATTERN`]. Returns `None` for
/// anything that does not follow the convention or whose numbers overflow.
pub fn decode(filename: &str) -> Option<PictureKey> {
    let (stem, _) = split_extension(filename);
    let caps = STEM_RE.captures(stem)?;
    let camera_number = caps[2].parse().ok()?;
    let sequence = caps[3].parse().ok()?;
    Some(PictureKey::new(&caps[1], camera_number, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_simple() {
        assert_eq!(encode("5", 1, 1), "5-CMR1_1");
    }

    #[test]
    fn filename_with_extension() {
        let key = PictureKey::new("PH001", 2, 1);
        assert_eq!(filename_for(&key, ".jpg"), "PH001-CMR2_1.jpg");
        assert_eq!(filename_for(&key, ""), "PH001-CMR2_1");
    }

    #[test]
    fn decode_with_extension() {
        assert_eq!(decode("5-CMR1_1.png"), Some(PictureKey::new("5", 1, 1)));
    }

    #[test]
    fn decode_without_extension() {
        assert_eq!(decode("PH001-CMR12_7"), Some(PictureKey::new("PH001", 12, 7)));
    }

    #[test]
    fn round_trip_over_extensions() {
        for ext in ["", ".png", ".jpg", ".JPEG", ".bin", "."] {
            for (ticket, camera, seq) in [("5", 1, 1), ("PH-001", 3, 12), ("Số phiếu 9", 2, 4)] {
                let key = PictureKey::new(ticket, camera, seq);
                assert_eq!(decode(&filename_for(&key, ext)), Some(key), "ext {ext:?}");
            }
        }
    }

    #[test]
    fn greedy_suffix_takes_last_occurrence() {
        // A ticket that itself looks like an encoded stem keeps that text;
        // only the trailing occurrence is the suffix.
        assert_eq!(
            decode("T-CMR1_2-CMR3_4.png"),
            Some(PictureKey::new("T-CMR1_2", 3, 4))
        );
    }

    #[test]
    fn trailing_lookalike_is_always_the_suffix() {
        // A bare ticket "T-CMR1_2" saved without the encoded suffix reads as
        // ticket "T", camera 1, sequence 2.
        assert_eq!(decode("T-CMR1_2"), Some(PictureKey::new("T", 1, 2)));
    }

    #[test]
    fn dotted_ticket_without_extension_is_invisible() {
        // The dot inside the ticket is taken as the extension separator.
        assert_eq!(decode("PH.001-CMR1_1"), None);
        assert_eq!(decode("PH.001-CMR1_1.png"), Some(PictureKey::new("PH.001", 1, 1)));
    }

    #[test]
    fn decode_rejects_non_matching_names() {
        assert_eq!(decode("photo.png"), None);
        assert_eq!(decode("-CMR1_1.png"), None);
        assert_eq!(decode("5-CMR_1.png"), None);
        assert_eq!(decode("5-CMR1_.png"), None);
        assert_eq!(decode("5-cmr1_1.png"), None);
        assert_eq!(decode("5-CMR1_1x.png"), None);
        assert_eq!(decode(""), None);
    }

    #[test]
    fn decode_rejects_overflowing_numbers() {
        assert_eq!(decode("5-CMR99999999999_1.png"), None);
    }

    #[test]
    fn decode_keeps_zero_values() {
        // Zero is not a valid upload value but is reported as stored.
        assert_eq!(decode("5-CMR0_0.png"), Some(PictureKey::new("5", 0, 0)));
    }

    #[test]
    fn split_extension_edge_cases() {
        assert_eq!(split_extension("a."), ("a", "."));
        assert_eq!(split_extension("..png"), ("..png", ""));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(""), ("", ""));
    }

    #[test]
    fn extension_of_client_paths() {
        assert_eq!(extension_of("photo.png"), ".png");
        assert_eq!(extension_of(r"C:\cam\shot.v2\img.JPG"), ".JPG");
        assert_eq!(extension_of("dir.d/noext"), "");
        assert_eq!(extension_of(""), "");
    }
}
