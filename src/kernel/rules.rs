//! Per-subject access rules.
//!
//! Each subject label owns a [`RuleList`]. Readers take a snapshot of the
//! current list and scan it without holding a lock. Writers serialize on the
//! list's writer mutex, build a complete replacement list and publish it with
//! a single pointer swap, so a reader sees either the old rules or the new
//! ones.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::access::Access;
use super::label::Label;

/// Explicit `(subject, object) -> access` grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Label of the acting subject.
    pub subject: Label,
    /// Label of the object acted upon.
    pub object: Label,
    /// Modes granted.
    pub access: Access,
}

/// Copy-on-write list of rules for one subject.
#[derive(Debug, Default)]
pub struct RuleList {
    current: RwLock<Arc<Vec<Rule>>>,
    writer: Mutex<()>,
}

impl RuleList {
    /// Create an empty rule list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current rules, in insertion order.
    pub fn snapshot(&self) -> Arc<Vec<Rule>> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// True when the list has no rules.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Find the access granted to `subject` on `object`.
    ///
    /// Returns `None` when no rule matches. A granted write always comes
    /// back with lock added.
    pub fn lookup(&self, subject: Label, object: Label) -> Option<Access> {
        // Object first: it is the field more likely to differ.
        self.snapshot()
            .iter()
            .find(|rule| rule.object == object && rule.subject == subject)
            .map(|rule| rule.access.with_write_implied_lock())
    }

    /// Set the access for `rule.subject` on `rule.object`.
    ///
    /// Replaces the mask of an existing entry for the pair, otherwise
    /// appends. Returns the previous mask, if any.
    pub fn insert_or_update(&self, rule: Rule) -> Option<Access> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next: Vec<Rule> = self.snapshot().as_ref().clone();
        let previous = match next
            .iter_mut()
            .find(|r| r.object == rule.object && r.subject == rule.subject)
        {
            Some(existing) => {
                let old = existing.access;
                existing.access = rule.access;
                Some(old)
            }
            None => {
                next.push(rule);
                None
            }
        };

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(next);
        previous
    }
}
