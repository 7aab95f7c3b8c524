//! Country to proxy-region policy.

use crate::types::Region;
use std::collections::HashMap;

/// Maps a number's country to the proxy region it should egress from.
///
/// Kept behind a trait so deployments can swap the table without touching
/// assignment logic.
pub trait RegionPolicy: Send + Sync {
    /// Preferred region for an ISO alpha-2 country code.
    fn region_for(&self, iso_alpha2: &str) -> Option<Region>;
}

/// Static lookup table.
///
/// Unmapped countries resolve to a region named after their lowercase ISO
/// code (`"US"` -> `"us"`) unless [`RegionTable::strict`] is used, so a pool
/// labelled per country works without any table at all.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    entries: HashMap<String, Region>,
    default: Option<Region>,
    strict: bool,
}

impl RegionTable {
    /// Empty table resolving every country to its own ISO region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that resolves only mapped countries (and the default).
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Map one country.
    pub fn with_mapping(mut self, iso_alpha2: &str, region: impl AsRef<str>) -> Self {
        self.entries
            .insert(iso_alpha2.trim().to_ascii_uppercase(), Region::new(region));
        self
    }

    /// Map every country in `countries` to `region`.
    pub fn with_region(mut self, region: impl AsRef<str>, countries: &[&str]) -> Self {
        let region = Region::new(region);
        for iso in countries {
            self.entries
                .insert(iso.trim().to_ascii_uppercase(), region.clone());
        }
        self
    }

    /// Region for countries the table does not map.
    pub fn with_default(mut self, region: impl AsRef<str>) -> Self {
        self.default = Some(Region::new(region));
        self
    }
}

impl RegionPolicy for RegionTable {
    fn region_for(&self, iso_alpha2: &str) -> Option<Region> {
        let iso = iso_alpha2.trim().to_ascii_uppercase();
        if let Some(region) = self.entries.get(&iso) {
            return Some(region.clone());
        }
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        (!self.strict && !iso.is_empty()).then(|| Region::new(&iso))
    }
}
