//! Verification code extraction from raw SMS text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Four to eight digits, optionally split once by a dash or space
/// ("482913", "482-913", "482 913").
static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(\d{3,4})[- ]?(\d{3,4})(?:\D|$)|(?:^|\D)(\d{4,8})(?:\D|$)")
        .expect("code regex is valid")
});

/// Pull the first verification code out of an SMS body.
///
/// Vendors usually parse the code themselves; this is the fallback for
/// messages where they only forward the text.
pub fn extract_code(text: &str) -> Option<String> {
    let caps = CODE_RE.captures(text)?;
    if let (Some(a), Some(b)) = (caps.get(1), caps.get(2)) {
        return Some(format!("{}{}", a.as_str(), b.as_str()));
    }
    caps.get(3).map(|m| m.as_str().to_string())
}
