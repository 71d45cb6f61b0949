//! Smack — mandatory access control decision core.
//!
//! Interns security labels, keeps per-subject access rules and answers
//! "may this subject access that object in this way". Enforcement layers
//! embed a [`kernel::Smack`] registry and call into it for every check.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod kernel;
pub mod loader;
pub mod logging;

pub use kernel::{Access, AccessDenied, AuditContext, Label, LabelError, Smack, TaskContext};
