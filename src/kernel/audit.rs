//! Audit records for access decisions.
//!
//! Every decision made with an [`AuditContext`] produces an [`AuditRecord`]
//! unless the process-wide [`LogPolicy`] filters it out. Records are handed
//! to an [`AuditSink`]; the sink decides where they end up.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::access::Access;

bitflags::bitflags! {
    /// Which decisions get audited.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub struct LogPolicy: u32 {
        /// Log denials.
        const DENIED = 0x1;
        /// Log grants.
        const ACCEPT = 0x2;
    }
}

impl LogPolicy {
    /// Log nothing.
    pub const NONE: LogPolicy = LogPolicy::empty();
    /// Log everything.
    pub const BOTH: LogPolicy = LogPolicy::all();

    /// Whether a decision with this outcome should be logged.
    pub fn should_log(self, granted: bool) -> bool {
        let needed = if granted {
            LogPolicy::ACCEPT
        } else {
            LogPolicy::DENIED
        };
        self.intersects(needed)
    }
}

impl Default for LogPolicy {
    fn default() -> Self {
        LogPolicy::DENIED
    }
}

impl fmt::Display for LogPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.contains(LogPolicy::DENIED), self.contains(LogPolicy::ACCEPT)) {
            (true, true) => "both",
            (true, false) => "denied",
            (false, true) => "accept",
            (false, false) => "none",
        };
        f.write_str(name)
    }
}

/// Unrecognized log policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log policy '{0}' (expected none, denied, accept or both)")]
pub struct LogPolicyParseError(pub String);

impl FromStr for LogPolicy {
    type Err = LogPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(LogPolicy::NONE),
            "denied" | "deny" | "1" => Ok(LogPolicy::DENIED),
            "accept" | "granted" | "2" => Ok(LogPolicy::ACCEPT),
            "both" | "all" | "3" => Ok(LogPolicy::BOTH),
            _ => Err(LogPolicyParseError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for LogPolicy {
    type Error = LogPolicyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogPolicy> for String {
    fn from(policy: LogPolicy) -> Self {
        policy.to_string()
    }
}

/// Caller-supplied context attached to an audited decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    /// Name of the hook or operation asking.
    pub function: Option<String>,
}

impl AuditContext {
    /// Context tagged with `function`.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: Some(function.into()),
        }
    }
}

/// One audited access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Function tag, `unknown` when the caller gave none.
    pub function: String,
    /// Subject label text.
    pub subject: String,
    /// Object label text.
    pub object: String,
    /// Requested modes.
    pub request: Access,
    /// Whether access was granted.
    pub granted: bool,
}

impl AuditRecord {
    /// Build a record from a decision.
    pub fn new(
        ctx: &AuditContext,
        subject: &str,
        object: &str,
        request: Access,
        granted: bool,
    ) -> Self {
        Self {
            function: ctx.function.clone().unwrap_or_else(|| "unknown".to_owned()),
            subject: subject.to_owned(),
            object: object.to_owned(),
            request,
            granted,
        }
    }

    /// `granted` or `denied`.
    pub fn action(&self) -> &'static str {
        if self.granted {
            "granted"
        } else {
            "denied"
        }
    }

    /// Render the record as a kernel-style audit line.
    pub fn render(&self) -> String {
        let mut line = format!("lsm=SMACK fn={} action={}", self.function, self.action());
        line.push_str(" subject=");
        push_untrusted(&mut line, &self.subject);
        line.push_str(" object=");
        push_untrusted(&mut line, &self.object);
        if self.request.is_empty() {
            line.push_str(" labels_differ");
        } else {
            line.push_str(&format!(" requested={}", self.request));
        }
        line
    }
}

/// Append `value` quoted, or hex-encoded if it holds control, space,
/// quote or non-ASCII bytes.
fn push_untrusted(out: &mut String, value: &str) {
    let needs_hex = value.bytes().any(|b| b <= b' ' || b == b'"' || b >= 0x7f);
    if needs_hex {
        out.push_str(&hex::encode_upper(value));
    } else {
        out.push('"');
        out.push_str(value);
        out.push('"');
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Deliver one record.
    ///
    /// # Errors
    ///
    /// Returns an error when the record could not be delivered.
    fn emit(&self, record: &AuditRecord) -> anyhow::Result<()>;
}

/// Emits records as `tracing` events on the `smack::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, record: &AuditRecord) -> anyhow::Result<()> {
        if record.granted {
            info!(
                target: "smack::audit",
                function = %record.function,
                subject = %record.subject,
                object = %record.object,
                request = %record.request,
                "access granted"
            );
        } else {
            warn!(
                target: "smack::audit",
                function = %record.function,
                subject = %record.subject,
                object = %record.object,
                request = %record.request,
                "access denied"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct JsonEntry<'a> {
    timestamp: String,
    action: &'static str,
    line: String,
    #[serde(flatten)]
    record: &'a AuditRecord,
}

/// Writes one JSON object per record to an append-only writer.
pub struct JsonAuditSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonAuditSink {
    /// Sink appending to the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for appending.
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
        })
    }

    /// Sink writing to an arbitrary writer.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl AuditSink for JsonAuditSink {
    fn emit(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let entry = JsonEntry {
            timestamp: Utc::now().to_rfc3339(),
            action: record.action(),
            line: record.render(),
            record,
        };
        let line = serde_json::to_string(&entry)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("audit lock poisoned: {e}"))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, record: &AuditRecord) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
