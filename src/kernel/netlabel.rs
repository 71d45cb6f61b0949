//! CIPSO category mapping for labels crossing the network.
//!
//! Short labels are carried directly: their bytes, read as a bitmap, become
//! the category set. Labels too long for that travel by secid instead.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Labels shorter than this many bytes use direct mapping.
pub const SMK_CIPSOLEN: usize = 24;

/// Default CIPSO level for directly mapped labels.
pub const DEFAULT_CIPSO_DIRECT: u32 = 250;

/// Default CIPSO level for secid-mapped labels.
pub const DEFAULT_CIPSO_MAPPED: u32 = 251;

/// CIPSO levels used when computing label attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipsoLevels {
    /// Level for directly mapped labels.
    pub direct: u32,
    /// Level for secid-mapped labels.
    pub mapped: u32,
}

impl Default for CipsoLevels {
    fn default() -> Self {
        Self {
            direct: DEFAULT_CIPSO_DIRECT,
            mapped: DEFAULT_CIPSO_MAPPED,
        }
    }
}

/// How a label's categories were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CipsoMapping {
    /// From the label text.
    Direct,
    /// From the secid.
    Mapped,
}

/// Network security attributes of a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetLabelAttrs {
    /// Label text, used as the NetLabel domain.
    pub domain: String,
    /// Which mapping produced the categories.
    pub mapping: CipsoMapping,
    /// MLS level.
    pub level: u32,
    /// MLS categories, 1-based.
    pub categories: BTreeSet<u32>,
}

impl NetLabelAttrs {
    /// Compute attributes for `text` with the given `secid`.
    pub fn for_label(text: &str, secid: u32, levels: CipsoLevels) -> Self {
        if text.len() < SMK_CIPSOLEN {
            Self {
                domain: text.to_owned(),
                mapping: CipsoMapping::Direct,
                level: levels.direct,
                categories: category_set(text.as_bytes()),
            }
        } else {
            Self {
                domain: text.to_owned(),
                mapping: CipsoMapping::Mapped,
                level: levels.mapped,
                categories: category_set(&secid.to_ne_bytes()),
            }
        }
    }
}

/// Read `bytes` as a most-significant-bit-first bitmap of 1-based categories.
pub fn category_set(bytes: &[u8]) -> BTreeSet<u32> {
    let mut cats = BTreeSet::new();
    let mut cat: u32 = 1;
    for byte in bytes {
        for shift in (0..8u32).rev() {
            if byte & (1u8 << shift) != 0 {
                cats.insert(cat);
            }
            cat = cat.saturating_add(1);
        }
    }
    cats
}
