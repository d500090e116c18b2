//! Resource language ids.
//!
//! A resource may carry one string per language. Language ids are the
//! indices of the ISO 639-1 codes in alphabetical order, which is exactly
//! [`MAX_LANGUAGE_ID`] entries.

use crate::limits::MAX_LANGUAGE_ID;

/// ISO 639-1 codes, indexed by language id.
pub const LANGUAGE_CODES: [&str; MAX_LANGUAGE_ID] = [
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg", "bh",
    "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv", "cy", "da",
    "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi", "fj", "fo", "fr",
    "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr", "ht", "hu", "hy", "hz",
    "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja", "jv", "ka", "kg", "ki", "kj",
    "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw", "ky", "la", "lb", "lg", "li", "ln",
    "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "na", "nb",
    "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv", "ny", "oc", "oj", "om", "or", "os", "pa", "pi",
    "pl", "ps", "pt", "qu", "rm", "rn", "ro", "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk",
    "sl", "sm", "sn", "so", "sq", "sr", "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti",
    "tk", "tl", "tn", "to", "tr", "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo",
    "wa", "wo", "xh", "yi", "yo", "za", "zh", "zu",
];

/// Language used for resources declared without an explicit language.
pub const ENGLISH: u8 = 37;

/// Look up the language id for an ISO 639-1 code (case-insensitive).
pub fn language_id(code: &str) -> Option<u8> {
    LANGUAGE_CODES
        .iter()
        .position(|c| c.eq_ignore_ascii_case(code))
        .map(|index| index as u8)
}

/// The ISO 639-1 code for a language id.
pub fn language_code(id: u8) -> Option<&'static str> {
    LANGUAGE_CODES.get(id as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_is_default() {
        assert_eq!(LANGUAGE_CODES[ENGLISH as usize], "en");
        assert_eq!(language_id("EN"), Some(ENGLISH));
    }

    #[test]
    fn codes_are_sorted_and_unique() {
        assert!(LANGUAGE_CODES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unknown_code() {
        assert_eq!(language_id("xx"), None);
        assert_eq!(language_code(200), None);
        assert_eq!(language_code(32), Some("de"));
    }
}
