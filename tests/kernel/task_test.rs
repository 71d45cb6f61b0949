//! Task-level decisions: private rules and the MAC override.

use std::sync::Arc;

use smack::kernel::audit::MemoryAuditSink;
use smack::kernel::netlabel::CipsoLevels;
use smack::kernel::{Access, AuditContext, Label, LogPolicy, Smack, TaskContext};

fn setup() -> (Smack, Label, Label) {
    let smack = Smack::new();
    let app = smack.intern("app", 0).expect("valid label");
    let data = smack.intern("data", 0).expect("valid label");
    smack.add_rule(app, data, Access::READ | Access::WRITE);
    (smack, app, data)
}

#[test]
fn task_without_private_rules_follows_global_rules() {
    let (smack, app, data) = setup();
    let task = TaskContext::new(app);
    assert!(smack.evaluate_task(&task, data, Access::WRITE, None).is_ok());
    assert!(smack.evaluate_task(&task, data, Access::EXEC, None).is_err());
}

#[test]
fn private_rule_restricts() {
    let (smack, app, data) = setup();
    let task = TaskContext::new(app);
    task.restrict(data, Access::READ);

    assert!(smack.evaluate_task(&task, data, Access::READ, None).is_ok());
    assert!(smack.evaluate_task(&task, data, Access::WRITE, None).is_err());
    // The global decision is untouched.
    assert!(smack.evaluate(app, data, Access::WRITE, None).is_ok());
}

#[test]
fn private_rule_never_widens() {
    let (smack, app, data) = setup();
    let task = TaskContext::new(app);
    task.restrict(data, Access::ALL);
    assert!(smack.evaluate_task(&task, data, Access::EXEC, None).is_err());
}

#[test]
fn private_write_implies_lock() {
    let (smack, app, data) = setup();
    smack.add_rule(app, data, Access::READ | Access::WRITE | Access::LOCK);
    let task = TaskContext::new(app);
    task.restrict(data, Access::WRITE);
    assert!(smack.evaluate_task(&task, data, Access::LOCK, None).is_ok());
    assert!(smack.evaluate_task(&task, data, Access::READ, None).is_err());
}

#[test]
fn private_rules_apply_to_fixed_label_grants() {
    let (smack, app, _) = setup();
    let task = TaskContext::new(app);
    task.restrict(Label::FLOOR, Access::NONE);
    assert!(smack.evaluate(app, Label::FLOOR, Access::READ, None).is_ok());
    assert!(smack
        .evaluate_task(&task, Label::FLOOR, Access::READ, None)
        .is_err());
}

#[test]
fn privileged_task_overrides_denial() {
    let (smack, app, data) = setup();
    let task = TaskContext::new(app).privileged();
    assert!(smack.evaluate_task(&task, data, Access::EXEC, None).is_ok());

    let restricted = TaskContext::new(app).privileged();
    restricted.restrict(data, Access::NONE);
    assert!(smack
        .evaluate_task(&restricted, data, Access::READ, None)
        .is_ok());
}

#[test]
fn override_respects_onlycap() {
    let (smack, app, data) = setup();
    let admin = smack.intern("admin", 0).expect("valid label");
    smack.set_onlycap(Some(admin));

    let app_task = TaskContext::new(app).privileged();
    assert!(!smack.is_privileged(&app_task));
    assert!(smack.evaluate_task(&app_task, data, Access::EXEC, None).is_err());

    let admin_task = TaskContext::new(admin).privileged();
    assert!(smack
        .evaluate_task(&admin_task, data, Access::EXEC, None)
        .is_ok());

    smack.set_onlycap(None);
    assert!(smack.evaluate_task(&app_task, data, Access::EXEC, None).is_ok());
}

#[test]
fn task_decision_audited_once_with_final_result() {
    let sink = Arc::new(MemoryAuditSink::new());
    let smack = Smack::with_sink(CipsoLevels::default(), sink.clone());
    smack.set_log_policy(LogPolicy::BOTH);
    let app = smack.intern("app", 0).expect("valid label");
    let data = smack.intern("data", 0).expect("valid label");
    let ctx = AuditContext::new("smack_file_open");

    let task = TaskContext::new(app).privileged();
    assert!(smack
        .evaluate_task(&task, data, Access::READ, Some(&ctx))
        .is_ok());

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].granted);
    assert_eq!(records[0].subject, "app");
    assert_eq!(records[0].function, "smack_file_open");
}
