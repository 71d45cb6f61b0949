//! Smack CLI entry point.
//!
//! Loads rules from the configured policy files and answers access checks
//! and label/secid translations from the command line.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use smack::config::Config;
use smack::kernel::netlabel::CipsoMapping;
use smack::kernel::{Access, AuditContext, Smack, TaskContext};
use smack::{loader, logging};

/// Smack — mandatory access control decisions from the command line.
#[derive(Parser)]
#[command(name = "smack", version, about)]
struct Cli {
    /// Config file (default: ~/.smack/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra rule files, loaded after the configured ones.
    #[arg(long = "rules", global = true)]
    rules: Vec<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Check whether a subject may access an object.
    Check {
        /// Subject label.
        subject: String,
        /// Object label.
        object: String,
        /// Requested access, e.g. `rw` or `r-x`.
        access: Access,
        /// Function tag recorded in audit output.
        #[arg(long = "fn", default_value = "smack_cli")]
        function: String,
        /// Check as a task holding the MAC override capability.
        #[arg(long)]
        privileged: bool,
    },
    /// List every known label.
    Labels,
    /// Print the secid of a label (0 if unknown).
    Secid {
        /// Label text.
        label: String,
    },
    /// Print the label carrying a secid.
    Label {
        /// Secid to translate.
        secid: u32,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let _logging_guard = match &config.logging.dir {
        Some(dir) => Some(logging::init_with_file(dir, &config.log_level)?),
        None => {
            logging::init_cli(&config.log_level);
            None
        }
    };

    let smack = loader::build(&config, cli.rules.as_slice())?;
    debug!(labels = smack.labels().len(), "policy ready");

    match cli.command {
        Command::Check {
            subject,
            object,
            access,
            function,
            privileged,
        } => handle_check(&smack, &subject, &object, access, function, privileged),
        Command::Labels => {
            handle_labels(&smack);
            Ok(ExitCode::SUCCESS)
        }
        Command::Secid { label } => {
            println!("{}", smack.labels().secid_of_text(&label));
            Ok(ExitCode::SUCCESS)
        }
        Command::Label { secid } => {
            let label = smack.label_from_secid(secid);
            println!("{}", smack.label_text(label));
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Evaluate one access request and report the outcome.
fn handle_check(
    smack: &Smack,
    subject: &str,
    object: &str,
    access: Access,
    function: String,
    privileged: bool,
) -> anyhow::Result<ExitCode> {
    let subject = smack
        .intern_whole(subject)
        .with_context(|| format!("invalid subject label \"{subject}\""))?;
    let object = smack
        .intern_whole(object)
        .with_context(|| format!("invalid object label \"{object}\""))?;
    let ctx = AuditContext::new(function);

    let result = if privileged {
        let task = TaskContext::new(subject).privileged();
        smack.evaluate_task(&task, object, access, Some(&ctx))
    } else {
        smack.evaluate(subject, object, access, Some(&ctx))
    };

    match result {
        Ok(()) => {
            println!("granted");
            Ok(ExitCode::SUCCESS)
        }
        Err(denied) => {
            debug!(error = %denied, "check denied");
            println!("denied");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print secid, text and network mapping of every label.
fn handle_labels(smack: &Smack) {
    for entry in smack.labels().entries() {
        let mapping = match entry.netlabel.mapping {
            CipsoMapping::Direct => "direct",
            CipsoMapping::Mapped => "mapped",
        };
        println!(
            "{}\t{}\t{} {}",
            entry.secid, entry.text, mapping, entry.netlabel.level
        );
    }
}
