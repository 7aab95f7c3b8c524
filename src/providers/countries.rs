//! Vendor country name to ISO alpha-2 matching.
//!
//! Vendors publish their catalogs with free-form English country names
//! ("usa", "England", "Ivory Coast"). The region policy works on ISO
//! alpha-2 codes, so every catalog entry gets an `iso_hint` resolved here.

use crate::types::PhoneNumber;
use keshvar::{Alpha2, Country, CountryIterator};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Name normalization for stable comparison.
/// Converts to lowercase and removes punctuation/extra whitespace.
fn norm(s: &str) -> String {
    const PUNCT: &[char] = &[
        '\'', '"', '`', ',', '.', '-', '_', '(', ')', '\u{2018}',
        '\u{2019}', // curly single quotes
        '\u{00B4}', // acute accent
    ];
    s.to_ascii_lowercase()
        .replace(PUNCT, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Overrides: normalized vendor name -> ISO alpha-2 code.
/// Used where vendor names differ from ISO short names.
static NAME_OVERRIDES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("usa", "US"),
        ("usa virtual", "US"),
        ("united states", "US"),
        ("united kingdom", "GB"),
        ("england", "GB"),
        ("uk", "GB"),
        ("uae", "AE"),
        ("russia", "RU"),
        ("vietnam", "VN"),
        ("south korea", "KR"),
        ("korea", "KR"),
        ("north korea", "KP"),
        ("dr congo", "CD"),
        ("ivory coast", "CI"),
        ("czech", "CZ"),
        ("czech republic", "CZ"),
        ("moldova", "MD"),
        ("laos", "LA"),
        ("syria", "SY"),
        ("iran", "IR"),
        ("venezuela", "VE"),
        ("tanzania", "TZ"),
        ("bolivia", "BO"),
        ("bosnia", "BA"),
        ("brunei", "BN"),
        ("palestine", "PS"),
        ("taiwan", "TW"),
        ("swaziland", "SZ"),
        ("cape verde", "CV"),
        ("north macedonia", "MK"),
        ("macedonia", "MK"),
        ("timor leste", "TL"),
        ("salvador", "SV"),
        ("papua", "PG"),
        ("reunion", "RE"),
        ("hong kong", "HK"),
        ("hongkong", "HK"),
        ("macao", "MO"),
        ("puerto rico", "PR"),
        ("turkey", "TR"),
        ("netherlands", "NL"),
        ("holland", "NL"),
    ])
});

/// ISO short names: normalized ISO name -> Alpha2.
/// Built from keshvar on first use.
static ISO_NAME2ALPHA2: Lazy<HashMap<String, Alpha2>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for country in CountryIterator::new() {
        m.insert(norm(country.iso_short_name()), country.alpha2());
    }
    m
});

/// Resolve a vendor country name to an ISO alpha-2 code.
///
/// Tries the override table first, then ISO short names, then accepts the
/// input if it already is an alpha-2 code. Returns `None` when nothing
/// matches.
pub fn iso_hint_from_name(name: &str) -> Option<String> {
    let key = norm(name);
    if key.is_empty() {
        return None;
    }

    if let Some(&alpha2) = NAME_OVERRIDES.get(key.as_str()) {
        return Some(alpha2.to_string());
    }

    if let Some(alpha2) = ISO_NAME2ALPHA2.get(&key) {
        return Some(alpha2.to_string());
    }

    if key.len() == 2
        && let Ok(country) = Country::try_from(key.to_ascii_uppercase().as_str())
    {
        return Some(country.alpha2().to_string());
    }

    tracing::debug!(name, "No ISO match for vendor country name");
    None
}

/// Owner of a calling code shared by several countries.
const SHARED_CALLING_CODES: &[(usize, &str)] = &[
    (1, "US"),
    (7, "RU"),
    (39, "IT"),
    (44, "GB"),
    (47, "NO"),
    (61, "AU"),
    (212, "MA"),
    (262, "RE"),
    (290, "SH"),
    (358, "FI"),
    (590, "GP"),
    (599, "CW"),
    (672, "NF"),
];

/// International calling code -> ISO alpha-2.
static CALLING_CODE2ALPHA2: Lazy<HashMap<String, String>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for country in CountryIterator::new() {
        m.entry(country.country_code().to_string())
            .or_insert_with(|| country.alpha2().to_string());
    }
    for (code, alpha2) in SHARED_CALLING_CODES {
        m.insert(code.to_string(), (*alpha2).to_string());
    }
    m
});

/// Resolve the country of an international number from its calling code.
///
/// Calling codes are prefix-free, so the first of the one to three digit
/// prefixes that matches wins. Codes shared by several countries resolve to
/// their main owner (`+1` is `US`, `+7` is `RU`).
pub fn iso_hint_from_phone(phone: &PhoneNumber) -> Option<String> {
    let digits = phone.as_str();
    (1..=3)
        .filter_map(|len| digits.get(..len))
        .find_map(|prefix| CALLING_CODE2ALPHA2.get(prefix).cloned())
}
