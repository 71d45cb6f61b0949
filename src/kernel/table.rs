//! Label interning table.
//!
//! Maps label text to a single canonical [`Label`] handle. The table is
//! append-only: entries are created under one mutex, published once fully
//! built, and never changed or removed afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use super::label::{parse_label, parse_whole_label, Label, LabelError, Universal, SHARED_TAG};
use super::netlabel::{CipsoLevels, NetLabelAttrs};
use super::rules::RuleList;

/// First secid handed out to labels created at runtime.
pub const FIRST_DYNAMIC_SECID: u32 = 10;

/// One interned label and everything it owns.
#[derive(Debug)]
pub struct LabelEntry {
    /// Handle of this entry.
    pub label: Label,
    /// Canonical text.
    pub text: Arc<str>,
    /// Compact numeric identifier.
    pub secid: u32,
    /// Network attributes.
    pub netlabel: NetLabelAttrs,
    /// Rules where this label is the subject.
    pub rules: RuleList,
}

#[derive(Debug, Default)]
struct Index {
    by_text: HashMap<Arc<str>, Label>,
    entries: Vec<Arc<LabelEntry>>,
}

/// Append-only interning arena of labels.
#[derive(Debug)]
pub struct LabelTable {
    /// Stamped on every handle this table issues.
    tag: u64,
    index: RwLock<Index>,
    /// Serializes creation; holds the next secid to assign.
    next_secid: Mutex<u32>,
    levels: CipsoLevels,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new(CipsoLevels::default())
    }
}

impl LabelTable {
    /// Create a table holding only the universal labels.
    pub fn new(levels: CipsoLevels) -> Self {
        let mut index = Index::default();
        for (position, u) in Universal::ALL.iter().enumerate() {
            let label = u.label();
            debug_assert_eq!(label.index(), position);
            let text: Arc<str> = Arc::from(u.text());
            index.by_text.insert(Arc::clone(&text), label);
            index.entries.push(Arc::new(LabelEntry {
                label,
                netlabel: NetLabelAttrs::for_label(u.text(), u.secid(), levels),
                text,
                secid: u.secid(),
                rules: RuleList::new(),
            }));
        }

        Self {
            tag: fresh_tag(),
            index: RwLock::new(index),
            next_secid: Mutex::new(FIRST_DYNAMIC_SECID),
            levels,
        }
    }

    /// Return the canonical label for `text`, creating it if needed.
    ///
    /// `max_len` bounds how many bytes of `text` are considered; `0` means
    /// all of it. The table is unchanged when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError`] when `text` does not yield a valid label or
    /// the table cannot assign another identifier.
    pub fn intern(&self, text: &str, max_len: usize) -> Result<Label, LabelError> {
        let text = parse_label(text, max_len)?;

        if let Some(label) = self.find(text) {
            return Ok(label);
        }

        let mut next_secid = self
            .next_secid
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another creator may have won the race while we waited.
        if let Some(label) = self.find(text) {
            return Ok(label);
        }

        let secid = *next_secid;
        let following = secid.checked_add(1).ok_or(LabelError::Exhausted)?;

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let label = u32::try_from(index.entries.len())
            .map(|position| Label::new(self.tag, position))
            .map_err(|_| LabelError::Exhausted)?;
        let shared: Arc<str> = Arc::from(text);
        let entry = Arc::new(LabelEntry {
            label,
            text: Arc::clone(&shared),
            secid,
            netlabel: NetLabelAttrs::for_label(text, secid, self.levels),
            rules: RuleList::new(),
        });
        index.entries.push(entry);
        index.by_text.insert(shared, label);
        *next_secid = following;

        debug!(label = text, secid, "label interned");
        Ok(label)
    }

    /// Like [`intern`](Self::intern), but all of `text` must be the label.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::Partial`] when `text` has anything after its
    /// valid prefix, and the errors of [`intern`](Self::intern) otherwise.
    pub fn intern_whole(&self, text: &str) -> Result<Label, LabelError> {
        self.intern(parse_whole_label(text)?, 0)
    }

    /// Look up an existing label by exact text.
    pub fn find(&self, text: &str) -> Option<Label> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.by_text.get(text).copied()
    }

    /// Whether `label` was issued by this table or is a universal label.
    pub fn owns(&self, label: Label) -> bool {
        match label.tag() {
            SHARED_TAG => label.universal().is_some(),
            tag => tag == self.tag,
        }
    }

    /// Entry for `label`, if it belongs to this table.
    pub fn entry(&self, label: Label) -> Option<Arc<LabelEntry>> {
        if !self.owns(label) {
            return None;
        }
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.entries.get(label.index()).cloned()
    }

    /// Canonical text of `label`.
    pub fn text(&self, label: Label) -> Option<Arc<str>> {
        self.entry(label).map(|e| Arc::clone(&e.text))
    }

    /// Label carrying `secid`, or [`Label::INVALID`] when none does.
    pub fn from_secid(&self, secid: u32) -> Label {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index
            .entries
            .iter()
            .find(|e| e.secid == secid)
            .map_or(Label::INVALID, |e| e.label)
    }

    /// Secid of `label`, or `0` when it is not in this table.
    pub fn secid_of(&self, label: Label) -> u32 {
        self.entry(label).map_or(0, |e| e.secid)
    }

    /// Secid of the label with text `text`, or `0` when it is not interned.
    pub fn secid_of_text(&self, text: &str) -> u32 {
        self.find(text).map_or(0, |label| self.secid_of(label))
    }

    /// Network attributes of `label`.
    pub fn netlabel(&self, label: Label) -> Option<NetLabelAttrs> {
        self.entry(label).map(|e| e.netlabel.clone())
    }

    /// All entries in creation order.
    pub fn entries(&self) -> Vec<Arc<LabelEntry>> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.entries.clone()
    }

    /// Number of interned labels, universal labels included.
    pub fn len(&self) -> usize {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.entries.len()
    }

    /// Whether the table holds no labels.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Random non-shared tag for a new table.
fn fresh_tag() -> u64 {
    loop {
        let tag = rand::random::<u64>();
        if tag != SHARED_TAG {
            return tag;
        }
    }
}
