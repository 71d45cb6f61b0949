//! Concurrent interning and rule updates.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use smack::kernel::{Access, Smack};

#[test]
fn concurrent_interning_yields_one_identity_per_text() {
    let smack = Arc::new(Smack::new());
    let before = smack.labels().len();

    let results: Vec<Vec<_>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let smack = Arc::clone(&smack);
                s.spawn(move || {
                    (0..50)
                        .map(|i| smack.intern(&format!("label{i}"), 0).expect("valid label"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    for run in &results[1..] {
        assert_eq!(run, &results[0]);
    }
    assert_eq!(smack.labels().len(), before + 50);

    let secids: HashSet<u32> = results[0]
        .iter()
        .map(|l| smack.secid_from_label(*l))
        .collect();
    assert_eq!(secids.len(), 50);
}

#[test]
fn readers_never_see_partial_rules() {
    let smack = Smack::new();
    let subject = smack.intern("writer", 0).expect("valid label");
    let objects: Vec<_> = (0..64)
        .map(|i| smack.intern(&format!("obj{i}"), 0).expect("valid label"))
        .collect();

    thread::scope(|s| {
        s.spawn(|| {
            for object in &objects {
                smack.add_rule(subject, *object, Access::READ | Access::WRITE);
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..200 {
                    for object in &objects {
                        // Either no rule yet or the complete one.
                        match smack.rule_access(subject, *object) {
                            None => {}
                            Some(may) => {
                                assert_eq!(may, Access::READ | Access::WRITE | Access::LOCK)
                            }
                        }
                    }
                }
            });
        }
    });

    for object in &objects {
        assert!(smack.evaluate(subject, *object, Access::WRITE, None).is_ok());
    }
}
