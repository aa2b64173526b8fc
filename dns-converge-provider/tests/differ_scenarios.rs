//! Differ 端到端场景与性质测试

mod common;

use common::{ORIGIN, counts, rec, rendered, zone};
use dns_converge_provider::record::{autosplit, join_txt};
use dns_converge_provider::{DiffError, Differ, DomainConfig, IgnoreTarget, Record, RecordType};

fn diff(existing: &[Record], dc: &DomainConfig) -> dns_converge_provider::ChangeSet {
    match Differ::new(dc).diff(existing) {
        Ok(cs) => cs,
        Err(e) => panic!("diff failed: {e}"),
    }
}

fn sample_a() -> Vec<Record> {
    vec![
        rec("@", RecordType::A, 300, "192.0.2.1"),
        rec("www", RecordType::Cname, 300, "@"),
        rec("@", RecordType::Mx, 300, "10 mx1"),
        rec("@", RecordType::Txt, 300, "v=spf1 -all"),
        rec("old", RecordType::A, 300, "192.0.2.9"),
    ]
}

fn sample_b() -> Vec<Record> {
    vec![
        rec("@", RecordType::A, 300, "192.0.2.1"),
        rec("www", RecordType::Cname, 300, "@"),
        rec("@", RecordType::Mx, 300, "10 mx1"),
        rec("api", RecordType::Aaaa, 300, "2001:db8::1"),
        rec("_sip._tcp", RecordType::Srv, 300, "10 5 5060 sip"),
    ]
}

// ============ Scenarios ============

#[test]
fn additions_only() {
    let cs = diff(&[], &zone(vec![rec("@", RecordType::A, 3600, "1.2.3.4")]));
    assert_eq!(counts(&cs), (0, 1, 0, 0));
}

#[test]
fn deletions_only() {
    let cs = diff(&[rec("@", RecordType::A, 3600, "1.2.3.4")], &zone(vec![]));
    assert_eq!(counts(&cs), (0, 0, 1, 0));
}

#[test]
fn ttl_modification() {
    let cs = diff(
        &[rec("www", RecordType::A, 300, "1.1.1.1")],
        &zone(vec![rec("www", RecordType::A, 3600, "1.1.1.1")]),
    );
    assert_eq!(counts(&cs), (0, 0, 0, 1));
}

#[test]
fn mx_priority_change() {
    let cs = diff(
        &[rec("@", RecordType::Mx, 3600, "10 mx1.example.com.")],
        &zone(vec![rec("@", RecordType::Mx, 3600, "20 mx1.example.com.")]),
    );
    assert_eq!(counts(&cs), (0, 0, 0, 1));
}

#[test]
fn stable_pairing_under_out_of_order_multi_value() {
    let existing = vec![
        rec("www", RecordType::A, 60, "1.1.1.1"),
        rec("www", RecordType::A, 60, "2.2.2.2"),
        rec("www", RecordType::A, 60, "3.3.3.3"),
    ];
    let desired = zone(vec![
        rec("www", RecordType::A, 600, "3.3.3.3"),
        rec("www", RecordType::A, 60, "2.2.2.3"),
        rec("www", RecordType::A, 60, "2.2.2.2"),
        rec("www", RecordType::A, 60, "1.1.1.1"),
    ]);

    let cs = diff(&existing, &desired);
    assert_eq!(counts(&cs), (2, 1, 0, 1));

    let created = require_some!(cs.create[0].desired.as_ref());
    assert_eq!(created.target(), "2.2.2.3");
    let modified = require_some!(cs.modify[0].desired.as_ref());
    assert_eq!(modified.target(), "3.3.3.3");
    assert_eq!(modified.ttl, 600);
}

#[test]
fn ignored_name() {
    let existing = vec![
        rec("www1", RecordType::Mx, 60, "1 h"),
        rec("www2", RecordType::Mx, 60, "1 h"),
        rec("www3", RecordType::Mx, 60, "1 h"),
    ];

    let dc = zone(vec![rec("www3", RecordType::Mx, 60, "1 h2")]).with_ignored_names(["www1", "www2"]);
    let cs = diff(&existing, &dc);
    assert_eq!(counts(&cs), (0, 0, 0, 1));

    let dc = zone(vec![rec("www2", RecordType::Mx, 60, "1 h2")]).with_ignored_names(["www1", "www2"]);
    let res = Differ::new(&dc).diff(&existing);
    assert!(
        matches!(&res, Err(DiffError::IgnoredModification { rule, .. }) if rule.contains("www2")),
        "unexpected result: {res:?}"
    );
}

#[test]
fn multi_candidate_pairing_prefers_fewest_differences() {
    let ttl_only = rec("@", RecordType::Mx, 300, "10 mxa.example.net.");
    let target_only = rec("@", RecordType::Mx, 300, "20 mxm.example.net.");
    let ttl_only_new = rec("@", RecordType::Mx, 600, "10 mxa.example.net.");
    let target_only_new = rec("@", RecordType::Mx, 300, "20 mx0.example.net.");

    // desired 的规范顺序与 existing 相反，按下标配对会配错
    let cs = diff(
        &[ttl_only.clone(), target_only.clone()],
        &zone(vec![ttl_only_new.clone(), target_only_new.clone()]),
    );
    assert_eq!(counts(&cs), (0, 0, 0, 2));

    let pairs: Vec<(Option<&Record>, Option<&Record>)> = cs
        .modify
        .iter()
        .map(|c| (c.existing.as_ref(), c.desired.as_ref()))
        .collect();
    assert!(pairs.contains(&(Some(&ttl_only), Some(&ttl_only_new))), "{pairs:?}");
    assert!(pairs.contains(&(Some(&target_only), Some(&target_only_new))), "{pairs:?}");
}

#[test]
fn ignored_target_on_existing_side_with_creates() {
    let existing = vec![
        rec("www", RecordType::A, 300, "10.0.0.1"),
        rec("www", RecordType::A, 300, "192.0.2.1"),
    ];
    let ignore = vec![IgnoreTarget::new("10.0.*.*", RecordType::A)];
    let dc = zone(vec![
        rec("www", RecordType::A, 300, "192.0.2.1"),
        rec("www", RecordType::A, 300, "192.0.2.5"),
        rec("api", RecordType::A, 300, "192.0.2.6"),
    ])
    .with_ignored_targets(ignore.clone());

    // 被忽略的记录既不删除，也不参与 modify 配对
    let cs = diff(&existing, &dc);
    assert_eq!(counts(&cs), (1, 2, 0, 0));
    assert_eq!(
        rendered(cs.create.iter().filter_map(|c| c.desired.as_ref())),
        vec![
            "api.example.com 300 IN A 192.0.2.6".to_string(),
            "www.example.com 300 IN A 192.0.2.5".to_string(),
        ]
    );

    let dc = zone(vec![rec("www", RecordType::A, 300, "10.0.9.9")]).with_ignored_targets(ignore);
    assert!(matches!(
        Differ::new(&dc).diff(&existing),
        Err(DiffError::IgnoredModification { .. })
    ));
}

// ============ Properties ============

#[test]
fn diff_is_symmetric_complementary() {
    let a = sample_a();
    let b = sample_b();
    let ab = diff(&a, &zone(b.clone()));
    let ba = diff(&b, &zone(a.clone()));

    let unchanged_ab = rendered(ab.unchanged.iter().filter_map(|c| c.existing.as_ref()));
    let unchanged_ba = rendered(ba.unchanged.iter().filter_map(|c| c.existing.as_ref()));
    assert_eq!(unchanged_ab, unchanged_ba);

    let creates_ab = rendered(ab.create.iter().filter_map(|c| c.desired.as_ref()));
    let deletes_ba = rendered(ba.delete.iter().filter_map(|c| c.existing.as_ref()));
    assert_eq!(creates_ab, deletes_ba);

    let creates_ba = rendered(ba.create.iter().filter_map(|c| c.desired.as_ref()));
    let deletes_ab = rendered(ab.delete.iter().filter_map(|c| c.existing.as_ref()));
    assert_eq!(creates_ba, deletes_ab);
}

#[test]
fn diff_of_identical_sets_is_empty() {
    for records in [sample_a(), sample_b(), Vec::new()] {
        let cs = diff(&records, &zone(records.clone()));
        assert_eq!(cs.change_count(), 0, "{cs:?}");
        assert_eq!(cs.unchanged.len(), records.len());
    }
}

#[test]
fn diff_is_order_independent() {
    let existing = sample_a();
    let desired = sample_b();
    let baseline = counts(&diff(&existing, &zone(desired.clone())));

    let mut rev_existing = existing.clone();
    rev_existing.reverse();
    let mut rev_desired = desired.clone();
    rev_desired.reverse();
    let mut rot_desired = desired.clone();
    rot_desired.rotate_left(2);

    assert_eq!(counts(&diff(&rev_existing, &zone(desired.clone()))), baseline);
    assert_eq!(counts(&diff(&existing, &zone(rev_desired.clone()))), baseline);
    assert_eq!(counts(&diff(&rev_existing, &zone(rot_desired))), baseline);
}

#[test]
fn label_and_fqdn_round_trip() {
    let mut r = Record::new("@", ORIGIN, 300, RecordType::A);
    for label in ["@", "www", "a.b.c", "_dmarc", "*"] {
        r.set_label(label, ORIGIN);
        let expected = if label == "@" {
            ORIGIN.to_string()
        } else {
            format!("{label}.{ORIGIN}")
        };
        assert_eq!(r.fqdn(), expected);

        let fqdn = r.fqdn().to_string();
        let res = r.set_label_from_fqdn(&fqdn, ORIGIN);
        assert!(res.is_ok(), "{res:?}");
        assert_eq!(r.label(), label);
    }
}

#[test]
fn autosplit_joins_back_to_original() {
    let original = "abcdefghijklmnopqrstuvwxyz".repeat(27);
    let segments = require_some!(autosplit(std::slice::from_ref(&original)));
    assert!(segments.len() >= 3);
    assert!(segments.iter().all(|s| s.len() <= 255));
    assert_eq!(join_txt(&segments), original);
}

#[test]
fn keep_unknown_preserves_names_absent_from_desired() {
    let existing = sample_a();
    let dc = zone(vec![rec("www", RecordType::Cname, 300, "@")]).with_keep_unknown(true);
    let cs = diff(&existing, &dc);
    assert_eq!(counts(&cs), (1, 0, 0, 0));

    let dc = zone(vec![]).with_keep_unknown(true);
    assert_eq!(diff(&existing, &dc).delete.len(), 0);
}

#[test]
fn keep_unknown_still_deletes_at_desired_names() {
    let existing = vec![
        rec("www", RecordType::A, 300, "1.1.1.1"),
        rec("www", RecordType::A, 300, "2.2.2.2"),
        rec("other", RecordType::A, 300, "3.3.3.3"),
    ];
    let dc = zone(vec![rec("www", RecordType::A, 300, "1.1.1.1")]).with_keep_unknown(true);
    let cs = diff(&existing, &dc);
    assert_eq!(counts(&cs), (1, 0, 1, 0));

    let deleted = require_some!(cs.delete[0].existing.as_ref());
    assert_eq!(deleted.target(), "2.2.2.2");

    // 同名但不同类型也算 desired 中出现过的名字
    let existing = vec![rec("www", RecordType::Txt, 300, "hello")];
    let cs = diff(&existing, &dc);
    assert_eq!(counts(&cs), (0, 1, 1, 0));
}

#[test]
fn ignored_glob_protects_existing_records() {
    let existing = vec![
        rec("a.dev", RecordType::A, 300, "10.0.0.1"),
        rec("b.dev", RecordType::A, 300, "10.0.0.2"),
        rec("www", RecordType::A, 300, "10.0.0.3"),
    ];
    let dc = zone(vec![]).with_ignored_names(["*.dev"]);
    let cs = diff(&existing, &dc);
    assert_eq!(counts(&cs), (0, 0, 1, 0));

    let dc = zone(vec![rec("c.dev", RecordType::A, 300, "10.0.0.4")]).with_ignored_names(["*.dev"]);
    assert!(matches!(
        Differ::new(&dc).diff(&existing),
        Err(DiffError::IgnoredModification { .. })
    ));
}

#[test]
fn changes_are_ordered_delete_modify_create() {
    let existing = vec![
        rec("gone", RecordType::A, 300, "10.0.0.1"),
        rec("www", RecordType::A, 300, "10.0.0.2"),
    ];
    let dc = zone(vec![
        rec("www", RecordType::A, 600, "10.0.0.2"),
        rec("new", RecordType::A, 300, "10.0.0.3"),
    ]);
    let cs = diff(&existing, &dc);
    let kinds: Vec<String> = cs.changes().map(|c| c.kind.to_string()).collect();
    assert_eq!(kinds, vec!["DELETE", "MODIFY", "CREATE"]);

    let groups = cs.changed_groups();
    assert_eq!(groups.len(), 3);
}
