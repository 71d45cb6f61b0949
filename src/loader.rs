//! Policy loading: rule text and registry construction from config.
//!
//! Rule files hold one `subject object access` triple per line, in the
//! same format the kernel's `load` interface accepts. Blank lines and lines
//! starting with `#` are ignored.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::kernel::access::{Access, AccessParseError};
use crate::kernel::audit::{AuditSink, JsonAuditSink, TracingAuditSink};
use crate::kernel::label::{Label, LabelError};
use crate::kernel::netlabel::CipsoLevels;
use crate::kernel::Smack;

/// A rule line could not be applied.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Wrong number of fields.
    #[error("line {line}: expected \"subject object access\", got {fields} field(s)")]
    Fields {
        /// 1-based line number.
        line: usize,
        /// Fields found.
        fields: usize,
    },
    /// Subject or object is not a valid label.
    #[error("line {line}: invalid label \"{text}\": {source}")]
    Label {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
        /// Why it was rejected.
        source: LabelError,
    },
    /// Label text contains characters a label cannot hold.
    #[error("line {line}: \"{text}\" contains characters not allowed in a label")]
    Trailing {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },
    /// Access string is malformed.
    #[error("line {line}: {source}")]
    Access {
        /// 1-based line number.
        line: usize,
        /// Parse failure.
        source: AccessParseError,
    },
}

/// Parsed but not yet interned rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec<'a> {
    /// Subject label text.
    pub subject: &'a str,
    /// Object label text.
    pub object: &'a str,
    /// Granted modes.
    pub access: Access,
}

/// Parse one rule line; `line_no` is only used in errors.
///
/// # Errors
///
/// Returns [`LoadError`] when the line does not have three fields or the
/// access string is malformed.
pub fn parse_rule(line: &str, line_no: usize) -> Result<RuleSpec<'_>, LoadError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [subject, object, access] = fields.as_slice() else {
        return Err(LoadError::Fields {
            line: line_no,
            fields: fields.len(),
        });
    };
    let access = access.parse().map_err(|source| LoadError::Access {
        line: line_no,
        source,
    })?;
    Ok(RuleSpec {
        subject: *subject,
        object: *object,
        access,
    })
}

fn intern_field(smack: &Smack, text: &str, line: usize) -> Result<Label, LoadError> {
    match smack.intern_whole(text) {
        Ok(label) => Ok(label),
        Err(LabelError::Partial { .. }) => Err(LoadError::Trailing {
            line,
            text: text.to_owned(),
        }),
        Err(source) => Err(LoadError::Label {
            line,
            text: text.to_owned(),
            source,
        }),
    }
}

/// Apply every rule in `text` to `smack`, returning how many were set.
///
/// Rules before a malformed line stay applied.
///
/// # Errors
///
/// Returns [`LoadError`] for the first malformed line.
pub fn load_rules(smack: &Smack, text: &str) -> Result<usize, LoadError> {
    let mut applied = 0usize;
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx.saturating_add(1);
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let spec = parse_rule(line, line_no)?;
        let subject = intern_field(smack, spec.subject, line_no)?;
        let object = intern_field(smack, spec.object, line_no)?;
        smack.add_rule(subject, object, spec.access);
        applied = applied.saturating_add(1);
    }
    Ok(applied)
}

/// Load a rule file into `smack`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains a bad rule.
pub fn load_rules_file(smack: &Smack, path: &Path) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules at {}", path.display()))?;
    let count = load_rules(smack, &text)
        .with_context(|| format!("failed to load rules from {}", path.display()))?;
    info!(path = %path.display(), rules = count, "rules loaded");
    Ok(count)
}

/// Build a registry from `config`, loading its rule files and then `extra_rules`.
///
/// # Errors
///
/// Returns an error if the audit file cannot be opened, a rule file fails
/// to load, or the onlycap label is invalid.
pub fn build(config: &Config, extra_rules: &[impl AsRef<Path>]) -> anyhow::Result<Smack> {
    let sink: Arc<dyn AuditSink> = match &config.audit.file {
        Some(path) => Arc::new(
            JsonAuditSink::new(path)
                .with_context(|| format!("failed to open audit file {}", path.display()))?,
        ),
        None => Arc::new(TracingAuditSink),
    };
    let levels = CipsoLevels {
        direct: config.netlabel.cipso_direct,
        mapped: config.netlabel.cipso_mapped,
    };

    let smack = Smack::with_sink(levels, sink);
    smack.set_log_policy(config.audit.log);

    if let Some(text) = &config.policy.onlycap {
        let label = smack
            .intern(text, 0)
            .with_context(|| format!("invalid onlycap label \"{text}\""))?;
        smack.set_onlycap(Some(label));
    }

    for path in &config.policy.rules {
        load_rules_file(&smack, path)?;
    }
    for path in extra_rules {
        load_rules_file(&smack, path.as_ref())?;
    }
    Ok(smack)
}
