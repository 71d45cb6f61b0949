//! Access decisions.
//!
//! [`Smack`] owns the label table, the audit configuration and the
//! privilege override label. Construct one at startup and share it (usually
//! behind an `Arc`) with every caller that needs to make access checks; it
//! is never torn down.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, warn};

use super::access::Access;
use super::audit::{AuditContext, AuditRecord, AuditSink, LogPolicy, TracingAuditSink};
use super::label::{Label, LabelError, Universal};
use super::netlabel::CipsoLevels;
use super::rules::{Rule, RuleList};
use super::table::LabelTable;

/// The requested access was not granted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access denied: {subject} -> {object} ({request})")]
pub struct AccessDenied {
    /// Subject label text.
    pub subject: String,
    /// Object label text.
    pub object: String,
    /// Modes that were requested.
    pub request: Access,
}

/// Security state of a running task.
#[derive(Debug)]
pub struct TaskContext {
    /// Label the task runs with.
    pub label: Label,
    /// Task-private rules; they can only narrow what the global rules allow.
    pub rules: RuleList,
    /// Whether the task holds the MAC override capability.
    pub mac_override: bool,
}

impl TaskContext {
    /// Unprivileged task with no private rules.
    pub fn new(label: Label) -> Self {
        Self {
            label,
            rules: RuleList::new(),
            mac_override: false,
        }
    }

    /// Same task holding the MAC override capability.
    pub fn privileged(mut self) -> Self {
        self.mac_override = true;
        self
    }

    /// Add or update a task-private rule restricting access to `object`.
    pub fn restrict(&self, object: Label, access: Access) -> Option<Access> {
        self.rules.insert_or_update(Rule {
            subject: self.label,
            object,
            access,
        })
    }
}

/// Registry of labels and rules, and the access decision engine.
pub struct Smack {
    labels: LabelTable,
    log_policy: AtomicU32,
    sink: Arc<dyn AuditSink>,
    onlycap: RwLock<Option<Label>>,
}

impl Default for Smack {
    fn default() -> Self {
        Self::new()
    }
}

impl Smack {
    /// Registry with default CIPSO levels, auditing to `tracing`.
    pub fn new() -> Self {
        Self::with_sink(CipsoLevels::default(), Arc::new(TracingAuditSink))
    }

    /// Registry delivering audit records to `sink`.
    pub fn with_sink(levels: CipsoLevels, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            labels: LabelTable::new(levels),
            log_policy: AtomicU32::new(LogPolicy::default().bits()),
            sink,
            onlycap: RwLock::new(None),
        }
    }

    // ── Labels ──

    /// The label table.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Intern `text`; see [`LabelTable::intern`].
    ///
    /// # Errors
    ///
    /// Returns [`LabelError`] when `text` is not a valid label.
    pub fn intern(&self, text: &str, max_len: usize) -> Result<Label, LabelError> {
        self.labels.intern(text, max_len)
    }

    /// Intern `text` as a whole label; see [`LabelTable::intern_whole`].
    ///
    /// # Errors
    ///
    /// Returns [`LabelError`] when `text` is not exactly one valid label.
    pub fn intern_whole(&self, text: &str) -> Result<Label, LabelError> {
        self.labels.intern_whole(text)
    }

    /// Look up an existing label by text.
    pub fn find(&self, text: &str) -> Option<Label> {
        self.labels.find(text)
    }

    /// Label carrying `secid`, or [`Label::INVALID`].
    pub fn label_from_secid(&self, secid: u32) -> Label {
        self.labels.from_secid(secid)
    }

    /// Secid of `label`, or `0` when unknown.
    pub fn secid_from_label(&self, label: Label) -> u32 {
        self.labels.secid_of(label)
    }

    /// Text of `label`; empty for handles from another registry.
    pub fn label_text(&self, label: Label) -> Arc<str> {
        self.labels.text(label).unwrap_or_else(|| Arc::from(""))
    }

    // ── Rules ──

    /// Set the access `subject` has to `object`.
    ///
    /// Returns the previously granted access, if there was a rule. Handles
    /// that do not belong to this registry are ignored.
    pub fn add_rule(&self, subject: Label, object: Label, access: Access) -> Option<Access> {
        if !self.labels.owns(object) {
            return None;
        }
        let entry = self.labels.entry(subject)?;
        let previous = entry.rules.insert_or_update(Rule {
            subject,
            object,
            access,
        });
        debug!(
            subject = %entry.text,
            object = %self.label_text(object),
            access = %access,
            replaced = previous.is_some(),
            "rule set"
        );
        previous
    }

    /// Access granted by an explicit rule, with write implying lock.
    pub fn rule_access(&self, subject: Label, object: Label) -> Option<Access> {
        self.labels.entry(subject)?.rules.lookup(subject, object)
    }

    // ── Configuration ──

    /// Current log policy.
    pub fn log_policy(&self) -> LogPolicy {
        LogPolicy::from_bits_truncate(self.log_policy.load(Ordering::Relaxed))
    }

    /// Change which decisions are audited.
    pub fn set_log_policy(&self, policy: LogPolicy) {
        self.log_policy.store(policy.bits(), Ordering::Relaxed);
    }

    /// Label whose tasks may use the MAC override, if restricted.
    pub fn onlycap(&self) -> Option<Label> {
        *self.onlycap.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restrict the MAC override to tasks running with `label`.
    pub fn set_onlycap(&self, label: Option<Label>) {
        *self.onlycap.write().unwrap_or_else(PoisonError::into_inner) = label;
    }

    // ── Decisions ──

    /// Decide whether `subject` may access `object` with `request`.
    ///
    /// The fixed labels are checked first, in a fixed order, and only then
    /// the subject's rules. Comparisons are on handles, never on text.
    /// Handles issued by another registry are unknown here and always
    /// denied.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] when nothing grants the request.
    pub fn evaluate(
        &self,
        subject: Label,
        object: Label,
        request: Access,
        audit: Option<&AuditContext>,
    ) -> Result<(), AccessDenied> {
        let granted = self.decide(subject, object, request);
        if let Some(ctx) = audit {
            self.audit(ctx, subject, object, request, granted);
        }
        self.outcome(subject, object, request, granted)
    }

    /// Decide whether `task` may access `object` with `request`.
    ///
    /// The global decision for the task's label comes first. If that
    /// grants, a matching task-private rule may still deny. A denial is
    /// overridden when the task is privileged.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] when the request is refused.
    pub fn evaluate_task(
        &self,
        task: &TaskContext,
        object: Label,
        request: Access,
        audit: Option<&AuditContext>,
    ) -> Result<(), AccessDenied> {
        let mut granted = self.decide(task.label, object, request);

        if granted {
            if let Some(may) = task.rules.lookup(task.label, object) {
                granted = request.is_subset_of(may);
            }
        }

        if !granted && self.is_privileged(task) {
            debug!(
                subject = %self.label_text(task.label),
                object = %self.label_text(object),
                "mac override applied"
            );
            granted = true;
        }

        if let Some(ctx) = audit {
            self.audit(ctx, task.label, object, request, granted);
        }
        self.outcome(task.label, object, request, granted)
    }

    /// Whether `task` may override a denial.
    pub fn is_privileged(&self, task: &TaskContext) -> bool {
        if !task.mac_override || !self.labels.owns(task.label) {
            return false;
        }
        match self.onlycap() {
            None => true,
            Some(label) => label == task.label,
        }
    }

    fn decide(&self, subject: Label, object: Label, request: Access) -> bool {
        if !self.labels.owns(subject) || !self.labels.owns(object) {
            return false;
        }
        let subject_kind = subject.universal();
        let object_kind = object.universal();

        // A star subject can't access any object.
        if subject_kind == Some(Universal::Star) {
            return false;
        }
        // The internet label goes both ways.
        if object_kind == Some(Universal::Web) || subject_kind == Some(Universal::Web) {
            return true;
        }
        if object_kind == Some(Universal::Star) {
            return true;
        }
        if subject == object {
            return true;
        }
        // Hat reads anything, everyone reads floor.
        if request.is_subset_of(Access::ANYREAD) || request.is_subset_of(Access::LOCK) {
            if object_kind == Some(Universal::Floor) {
                return true;
            }
            if subject_kind == Some(Universal::Hat) {
                return true;
            }
        }

        match self.rule_access(subject, object) {
            Some(may) if !may.is_empty() => request.is_subset_of(may),
            _ => false,
        }
    }

    fn audit(
        &self,
        ctx: &AuditContext,
        subject: Label,
        object: Label,
        request: Access,
        granted: bool,
    ) {
        if !self.log_policy().should_log(granted) {
            return;
        }
        let record = AuditRecord::new(
            ctx,
            &self.label_text(subject),
            &self.label_text(object),
            request,
            granted,
        );
        if let Err(e) = self.sink.emit(&record) {
            warn!(error = %e, "failed to emit audit record");
        }
    }

    fn outcome(
        &self,
        subject: Label,
        object: Label,
        request: Access,
        granted: bool,
    ) -> Result<(), AccessDenied> {
        if granted {
            Ok(())
        } else {
            Err(AccessDenied {
                subject: self.label_text(subject).to_string(),
                object: self.label_text(object).to_string(),
                request,
            })
        }
    }
}
