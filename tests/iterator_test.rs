use mdindex::{
    Attribute, AttributeType, Code, Database, IndexHandle, IterState, Key, KeyBound, Record,
};

fn key(a: i32, b: i64, c: &str) -> Key {
    Key::new(vec![
        Attribute::Int32(a),
        Attribute::Int64(b),
        Attribute::varchar(c),
    ])
}

fn seeded_index(db: &Database) -> IndexHandle {
    db.create_index(
        "t",
        &[
            AttributeType::Int32,
            AttributeType::Int64,
            AttributeType::Varchar,
        ],
    )
    .unwrap();
    let idx = db.open_index("t").unwrap();
    for (a, b, c) in [
        (1, 10, "apple"),
        (1, 20, "banana"),
        (2, 10, "cherry"),
        (2, 30, "date"),
        (3, 10, "elder"),
    ] {
        idx.insert(None, &Record::new(key(a, b, c), c)).unwrap();
    }
    idx
}

fn collect_names(idx: &IndexHandle, min: &KeyBound, max: &KeyBound) -> Vec<String> {
    let mut iter = idx.get_records(None, min, max).unwrap();
    let mut out = Vec::new();
    while iter.next().unwrap() {
        out.push(String::from_utf8(iter.value().unwrap().payload.clone()).unwrap());
    }
    out
}

fn open() -> KeyBound {
    KeyBound::new(vec![None, None, None])
}

#[test]
fn test_full_scan_in_tuple_order() {
    let db = Database::new();
    let idx = seeded_index(&db);
    assert_eq!(
        collect_names(&idx, &open(), &open()),
        vec!["apple", "banana", "cherry", "date", "elder"]
    );
}

#[test]
fn test_exact_match_via_equal_bounds() {
    let db = Database::new();
    let idx = seeded_index(&db);
    let exact = KeyBound::from(key(2, 10, "cherry"));
    assert_eq!(collect_names(&idx, &exact, &exact), vec!["cherry"]);
}

#[test]
fn test_wildcard_at_middle_position_skips_but_continues() {
    let db = Database::new();
    let idx = seeded_index(&db);
    // Second attribute capped at 10; (1,20) and (2,30) violate at a
    // non-primary position and are skipped without ending the scan.
    let max = KeyBound::new(vec![None, Some(Attribute::Int64(10)), None]);
    assert_eq!(
        collect_names(&idx, &open(), &max),
        vec!["apple", "cherry", "elder"]
    );
}

#[test]
fn test_primary_attribute_cap_ends_scan() {
    let db = Database::new();
    let idx = seeded_index(&db);
    let max = KeyBound::new(vec![Some(Attribute::Int32(1)), None, None]);
    assert_eq!(collect_names(&idx, &open(), &max), vec!["apple", "banana"]);
}

#[test]
fn test_min_bound_filters_later_positions() {
    let db = Database::new();
    let idx = seeded_index(&db);
    // Open primary attribute, second attribute at least 20.
    let min = KeyBound::new(vec![None, Some(Attribute::Int64(20)), None]);
    assert_eq!(collect_names(&idx, &min, &open()), vec!["banana", "date"]);
}

#[test]
fn test_varchar_bounds() {
    let db = Database::new();
    let idx = seeded_index(&db);
    let min = KeyBound::new(vec![None, None, Some(Attribute::varchar("banana"))]);
    let max = KeyBound::new(vec![None, None, Some(Attribute::varchar("date"))]);
    assert_eq!(
        collect_names(&idx, &min, &max),
        vec!["banana", "cherry", "date"]
    );
}

#[test]
fn test_state_machine() {
    let db = Database::new();
    let idx = seeded_index(&db);
    let max = KeyBound::new(vec![Some(Attribute::Int32(1)), None, None]);
    let mut iter = idx.get_records(None, &open(), &max).unwrap();

    assert_eq!(iter.state(), IterState::Unopened);
    assert!(iter.value().is_none());

    assert!(iter.next().unwrap());
    assert_eq!(iter.state(), IterState::Positioned);
    // Value is stable until the next advance.
    assert_eq!(iter.value().unwrap().payload, b"apple");
    assert_eq!(iter.value().unwrap().payload, b"apple");

    assert!(iter.next().unwrap());
    assert!(!iter.next().unwrap());
    assert_eq!(iter.state(), IterState::Ended);
    assert!(iter.value().is_none());

    // Ended is sticky, not an error.
    assert!(!iter.next().unwrap());
}

#[test]
fn test_empty_range() {
    let db = Database::new();
    let idx = seeded_index(&db);
    let exact = KeyBound::from(key(99, 0, "nope"));
    let mut iter = idx.get_records(None, &exact, &exact).unwrap();
    let err = iter.get_next().unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(iter.state(), IterState::Ended);
}

#[test]
fn test_close_is_terminal() {
    let db = Database::new();
    let idx = seeded_index(&db);
    let mut iter = idx.get_records(None, &open(), &open()).unwrap();
    assert!(iter.next().unwrap());

    iter.close().unwrap();
    assert_eq!(iter.state(), IterState::Closed);
    assert!(iter.value().is_none());

    let err = iter.next().unwrap_err();
    assert_eq!(err.code(), &Code::IteratorClosed);
    let err = iter.close().unwrap_err();
    assert_eq!(err.code(), &Code::IteratorClosed);
}

#[test]
fn test_iterator_unaffected_by_commits_behind_it() {
    let db = Database::new();
    let idx = seeded_index(&db);
    let mut iter = idx.get_records(None, &open(), &open()).unwrap();
    assert!(iter.next().unwrap());

    // A read-committed scan positioned past a key never revisits it, but
    // does pick up commits ahead of its position.
    idx.insert(None, &Record::new(key(0, 0, "ahead"), "behind"))
        .unwrap();
    idx.insert(None, &Record::new(key(9, 0, "zz"), "ahead"))
        .unwrap();

    let mut rest = Vec::new();
    while iter.next().unwrap() {
        rest.push(iter.value().unwrap().payload.clone());
    }
    assert_eq!(
        rest,
        vec![
            b"banana".to_vec(),
            b"cherry".to_vec(),
            b"date".to_vec(),
            b"elder".to_vec(),
            b"ahead".to_vec()
        ]
    );
}
