//! Access decision tests: fixed-label shortcuts, rules and auditing.

use std::sync::Arc;

use smack::kernel::audit::{AuditRecord, AuditSink, MemoryAuditSink};
use smack::kernel::netlabel::CipsoLevels;
use smack::kernel::{Access, AuditContext, Label, LogPolicy, Smack};

fn every_mask() -> Vec<Access> {
    vec![
        Access::NONE,
        Access::READ,
        Access::WRITE,
        Access::EXEC,
        Access::APPEND,
        Access::TRANSMUTE,
        Access::LOCK,
        Access::READ | Access::WRITE,
        Access::WRITE | Access::EXEC,
        Access::ALL,
    ]
}

fn labels(smack: &Smack) -> Vec<Label> {
    let mut out = vec![
        Label::HUH,
        Label::HAT,
        Label::STAR,
        Label::FLOOR,
        Label::INVALID,
        Label::WEB,
    ];
    out.push(smack.intern("app1", 0).expect("valid label"));
    out.push(smack.intern("app2", 0).expect("valid label"));
    out
}

#[test]
fn self_access_is_total() {
    let smack = Smack::new();
    let app1 = smack.intern("app1", 0).expect("valid label");
    assert!(smack
        .evaluate(app1, app1, Access::WRITE | Access::EXEC, None)
        .is_ok());
    for mask in every_mask() {
        assert!(smack.evaluate(app1, app1, mask, None).is_ok());
        assert!(smack.evaluate(Label::HUH, Label::HUH, mask, None).is_ok());
    }
}

#[test]
fn star_subject_is_always_denied() {
    let smack = Smack::new();
    for object in labels(&smack) {
        for mask in every_mask() {
            assert!(
                smack.evaluate(Label::STAR, object, mask, None).is_err(),
                "star subject got {mask} on {object}"
            );
        }
    }
}

#[test]
fn star_subject_denied_despite_rule() {
    let smack = Smack::new();
    let app1 = smack.intern("app1", 0).expect("valid label");
    smack.add_rule(Label::STAR, app1, Access::ALL);
    assert!(smack.evaluate(Label::STAR, app1, Access::READ, None).is_err());
}

#[test]
fn web_is_permissive_both_ways() {
    let smack = Smack::new();
    for other in labels(&smack) {
        for mask in every_mask() {
            assert!(smack.evaluate(Label::WEB, other, mask, None).is_ok());
            if other != Label::STAR {
                assert!(smack.evaluate(other, Label::WEB, mask, None).is_ok());
            }
        }
    }
}

#[test]
fn star_object_is_open_to_all_but_star() {
    let smack = Smack::new();
    for subject in labels(&smack) {
        let result = smack.evaluate(subject, Label::STAR, Access::ALL, None);
        assert_eq!(result.is_ok(), subject != Label::STAR);
    }
}

#[test]
fn hat_reads_and_floor_is_readable() {
    let smack = Smack::new();
    let app1 = smack.intern("app1", 0).expect("valid label");
    let app2 = smack.intern("app2", 0).expect("valid label");

    assert!(smack.evaluate(Label::HAT, app1, Access::READ, None).is_ok());
    assert!(smack.evaluate(app2, Label::FLOOR, Access::READ, None).is_ok());
    assert!(smack.evaluate(app2, Label::FLOOR, Access::LOCK, None).is_ok());
    assert!(smack.evaluate(app2, Label::FLOOR, Access::EXEC, None).is_ok());

    assert!(smack.evaluate(Label::HAT, app1, Access::WRITE, None).is_err());
    assert!(smack.evaluate(app2, Label::FLOOR, Access::APPEND, None).is_err());
}

#[test]
fn hat_privilege_is_by_identity_not_text() {
    let smack = Smack::new();
    // Interning "^" yields the hat handle itself; there is no second "^".
    assert_eq!(smack.intern("^", 0), Ok(Label::HAT));
    let object = smack.intern("plain", 0).expect("valid label");
    // A subject named like hat with trailing junk is a different label.
    let lookalike = smack.intern("^x", 0).expect("valid label");
    assert!(smack.evaluate(lookalike, object, Access::READ, None).is_err());
}

#[test]
fn write_implies_lock() {
    let smack = Smack::new();
    let a = smack.intern("A", 0).expect("valid label");
    let b = smack.intern("B", 0).expect("valid label");
    smack.add_rule(a, b, Access::WRITE);

    assert!(smack.evaluate(a, b, Access::LOCK, None).is_ok());
    assert!(smack.evaluate(a, b, Access::WRITE | Access::LOCK, None).is_ok());
    assert!(smack.evaluate(a, b, Access::EXEC, None).is_err());
}

#[test]
fn rules_are_directional() {
    let smack = Smack::new();
    let a = smack.intern("A", 0).expect("valid label");
    let b = smack.intern("B", 0).expect("valid label");
    smack.add_rule(a, b, Access::READ);
    assert!(smack.evaluate(a, b, Access::READ, None).is_ok());
    assert!(smack.evaluate(b, a, Access::READ, None).is_err());
}

#[test]
fn end_to_end_scenario() {
    let smack = Smack::new();
    let app1 = smack.intern("app1", 0).expect("valid label");
    let app2 = smack.intern("app2", 0).expect("valid label");
    assert_ne!(app1, app2);

    assert!(smack.evaluate(app1, app2, Access::READ, None).is_err());

    smack.add_rule(app1, app2, Access::READ | Access::WRITE);
    assert!(smack.evaluate(app1, app2, Access::READ, None).is_ok());
    assert!(smack.evaluate(app1, app2, Access::EXEC, None).is_err());
}

#[test]
fn updating_a_rule_replaces_access() {
    let smack = Smack::new();
    let a = smack.intern("A", 0).expect("valid label");
    let b = smack.intern("B", 0).expect("valid label");
    assert_eq!(smack.add_rule(a, b, Access::READ), None);
    assert_eq!(smack.add_rule(a, b, Access::EXEC), Some(Access::READ));
    assert!(smack.evaluate(a, b, Access::READ, None).is_err());
    assert!(smack.evaluate(a, b, Access::EXEC, None).is_ok());
}

#[test]
fn repeated_evaluation_is_stable() {
    let smack = Smack::new();
    let a = smack.intern("A", 0).expect("valid label");
    let b = smack.intern("B", 0).expect("valid label");
    smack.add_rule(a, b, Access::READ);
    for _ in 0..100 {
        assert!(smack.evaluate(a, b, Access::READ, None).is_ok());
        assert!(smack.evaluate(a, b, Access::WRITE, None).is_err());
    }
}

#[test]
fn audit_records_carry_decision_fields() {
    let sink = Arc::new(MemoryAuditSink::new());
    let smack = Smack::with_sink(CipsoLevels::default(), sink.clone());
    smack.set_log_policy(LogPolicy::BOTH);
    let a = smack.intern("A", 0).expect("valid label");
    let b = smack.intern("B", 0).expect("valid label");
    let ctx = AuditContext::new("smack_inode_permission");

    let _ = smack.evaluate(a, b, Access::READ | Access::APPEND, Some(&ctx));
    let _ = smack.evaluate(a, Label::FLOOR, Access::READ, Some(&ctx));

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].subject, "A");
    assert_eq!(records[0].object, "B");
    assert_eq!(records[0].request.to_string(), "ra");
    assert!(!records[0].granted);
    assert_eq!(records[0].function, "smack_inode_permission");
    assert_eq!(records[1].object, "_");
    assert!(records[1].granted);
}

#[test]
fn default_policy_logs_denials_only() {
    let sink = Arc::new(MemoryAuditSink::new());
    let smack = Smack::with_sink(CipsoLevels::default(), sink.clone());
    let a = smack.intern("A", 0).expect("valid label");
    let ctx = AuditContext::default();

    let _ = smack.evaluate(a, a, Access::READ, Some(&ctx));
    assert!(sink.records().is_empty());

    let _ = smack.evaluate(Label::STAR, a, Access::READ, Some(&ctx));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].function, "unknown");
    assert!(records[0]
        .render()
        .starts_with("lsm=SMACK fn=unknown action=denied"));
}

#[test]
fn accept_policy_logs_grants_only() {
    let sink = Arc::new(MemoryAuditSink::new());
    let smack = Smack::with_sink(CipsoLevels::default(), sink.clone());
    smack.set_log_policy(LogPolicy::ACCEPT);
    let a = smack.intern("A", 0).expect("valid label");
    let ctx = AuditContext::new("t");

    let _ = smack.evaluate(Label::STAR, a, Access::READ, Some(&ctx));
    let _ = smack.evaluate(a, a, Access::READ, Some(&ctx));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].granted);
}

#[test]
fn empty_request_passes_floor_and_hat_without_rule() {
    let smack = Smack::new();
    let app1 = smack.intern("app1", 0).expect("valid label");
    let app2 = smack.intern("app2", 0).expect("valid label");

    assert!(smack
        .evaluate(app1, Label::FLOOR, Access::NONE, None)
        .is_ok());
    assert!(smack.evaluate(Label::HAT, app1, Access::NONE, None).is_ok());
    assert!(smack.evaluate(app1, app2, Access::NONE, None).is_err());
}

struct BrokenSink;

impl AuditSink for BrokenSink {
    fn emit(&self, _record: &AuditRecord) -> anyhow::Result<()> {
        anyhow::bail!("audit device unavailable")
    }
}

#[test]
fn failing_audit_sink_does_not_change_decision() {
    let smack = Smack::with_sink(CipsoLevels::default(), Arc::new(BrokenSink));
    smack.set_log_policy(LogPolicy::BOTH);
    let a = smack.intern("A", 0).expect("valid label");
    let b = smack.intern("B", 0).expect("valid label");
    smack.add_rule(a, b, Access::READ);
    let ctx = AuditContext::new("t");

    assert!(smack.evaluate(a, b, Access::READ, Some(&ctx)).is_ok());
    assert!(smack.evaluate(a, b, Access::WRITE, Some(&ctx)).is_err());
    assert!(smack
        .evaluate(Label::STAR, b, Access::READ, Some(&ctx))
        .is_err());
}
