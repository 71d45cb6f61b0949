//! Decision core: label interning, per-subject rules and access checks.
//!
//! Everything an enforcement layer calls into lives here. The core is
//! synchronous and never blocks on I/O; the only lock held for longer than a
//! pointer copy is the label creation mutex.

pub mod access;
pub mod audit;
pub mod decision;
pub mod label;
pub mod netlabel;
pub mod rules;
pub mod table;

pub use access::Access;
pub use audit::{AuditContext, AuditRecord, AuditSink, LogPolicy};
pub use decision::{AccessDenied, Smack, TaskContext};
pub use label::{Label, LabelError, Universal};
