//! Name heuristics used by the scan filters.

use itertools::Itertools;
use linkkeep_core::HashHeuristic;

/// Share of non-ASCII characters above which a name counts as mojibake.
const MAX_NON_ASCII_RATIO: f64 = 0.7;

const BASE64_EXTRA: &[char] = &['+', '/', '=', '-', '_'];

/// Whether a link name looks mis-decoded.
///
/// Flags the replacement character, control and format characters other
/// than tab and newline, and names that are mostly non-ASCII.
pub fn is_garbled_name(name: &str) -> bool {
    if name.contains('\u{FFFD}') {
        return true;
    }

    if name.chars().any(|c| c != '\t' && c != '\n' && is_other_category(c)) {
        return true;
    }

    let total = name.chars().count();
    if total == 0 {
        return false;
    }
    let non_ascii = name.chars().filter(|c| !c.is_ascii()).count();
    non_ascii as f64 / total as f64 > MAX_NON_ASCII_RATIO
}

/// Control, format and private-use characters.
fn is_other_category(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{00AD}'
                | '\u{0600}'..='\u{0605}'
                | '\u{061C}'
                | '\u{06DD}'
                | '\u{070F}'
                | '\u{180E}'
                | '\u{200B}'..='\u{200F}'
                | '\u{202A}'..='\u{202E}'
                | '\u{2060}'..='\u{2064}'
                | '\u{2066}'..='\u{206F}'
                | '\u{FEFF}'
                | '\u{FFF9}'..='\u{FFFB}'
                | '\u{E000}'..='\u{F8FF}'
                | '\u{F0000}'..='\u{FFFFD}'
                | '\u{100000}'..='\u{10FFFD}'
        )
}

/// Whether a directory name looks like a random identifier such as a
/// sync-client cache hash.
///
/// Runs four checks in order, any of which flags the name:
///
/// 1. exact length with high character diversity,
/// 2. base64 alphabet within a length window, mixing at least two of
///    upper case, lower case and digits,
/// 3. mixed case plus digits with very high diversity,
/// 4. long names where no character repeats more than a couple of times.
///
/// Lengths in checks 1 and 2 count the raw name; the others count the
/// name with `-` and `_` removed.
pub fn is_hash_like_name(name: &str, heuristic: &HashHeuristic) -> bool {
    let name_len = name.chars().count();
    if name_len < heuristic.min_len {
        return false;
    }

    let clean: String = name.chars().filter(|c| *c != '-' && *c != '_').collect();
    if clean.is_empty() || !clean.chars().all(char::is_alphanumeric) {
        return false;
    }
    let clean_len = clean.chars().count();

    let lower: Vec<char> = clean.chars().flat_map(char::to_lowercase).collect();
    let diversity = lower.iter().unique().count() as f64 / clean_len as f64;

    let has_upper = clean.chars().any(char::is_uppercase);
    let has_lower = clean.chars().any(char::is_lowercase);
    let has_digit = clean.chars().any(char::is_numeric);

    if name_len == heuristic.exact_len && diversity > heuristic.exact_diversity {
        return true;
    }

    if (heuristic.base64_min_len..=heuristic.base64_max_len).contains(&name_len)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || BASE64_EXTRA.contains(&c))
    {
        let kinds = [has_upper, has_lower, has_digit].iter().filter(|k| **k).count();
        if kinds < 2 {
            return false;
        }
        if diversity > heuristic.base64_diversity {
            return true;
        }
    }

    if (heuristic.mixed_min_len..=heuristic.mixed_max_len).contains(&clean_len)
        && has_upper
        && has_lower
        && has_digit
        && diversity > heuristic.mixed_diversity
    {
        return true;
    }

    if clean_len >= heuristic.entropy_min_len {
        let max_repeat = lower.iter().counts().into_values().max().unwrap_or(0);
        if max_repeat <= heuristic.entropy_max_repeat && clean_len >= heuristic.entropy_flag_len {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASHES: &[&str] = &[
        "1R3_9ZoEWvefI4rTylIiU",
        "6UA9a6LZnqYXSA8WzC-ZV",
        "tv5NqM2yTK-Aik4TtsKhy",
        "pzl5hFDLa-32dKP6a8g4U",
        "4ST9V50OiHPY6-3rJf-ui",
        "vXl-51VXN9oL4BHwxOC5Q",
        "Drj342tLwOyOwhj9--HVA",
        "40LzdGD4hWt7iHxo1oQzR",
        "iUvBobAubJTesUfDTxjnm",
        "ebm4FRwMjKFxacDzB2xZ2",
    ];

    const NAMES: &[&str] = &[
        "my-project-data",
        "video-downloader",
        "custom",
        "rss-inbox-data",
        "MediaCrawler",
        "build-depends.sh",
        "aaaaaaaaaaaaaaaaaaaa",
        "abcdefghijklmnopqrst",
    ];

    #[test]
    fn test_hash_like_names_flagged() {
        let h = HashHeuristic::default();
        for name in HASHES {
            assert!(is_hash_like_name(name, &h), "{name} should be hash-like");
        }
    }

    #[test]
    fn test_ordinary_names_kept() {
        let h = HashHeuristic::default();
        for name in NAMES {
            assert!(!is_hash_like_name(name, &h), "{name} should not be hash-like");
        }
    }

    #[test]
    fn test_thresholds_are_tunable() {
        let strict = HashHeuristic {
            min_len: 64,
            ..HashHeuristic::default()
        };
        assert!(!is_hash_like_name(HASHES[0], &strict));
    }

    #[test]
    fn test_garbled_names() {
        assert!(is_garbled_name("bad\u{FFFD}name"));
        assert!(is_garbled_name("bell\u{7}"));
        assert!(is_garbled_name("zero\u{200B}width"));
        assert!(is_garbled_name("ÃÂÃÂÃÂ"));

        assert!(!is_garbled_name("project-data"));
        assert!(!is_garbled_name("tab\there"));
        assert!(!is_garbled_name("café-notes"));
        assert!(!is_garbled_name(""));
    }
}
