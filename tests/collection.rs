use kira_ppa::table::{Column, ColumnKind, ModelRef, SampleCollection};

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn rejects_duplicate_and_empty_ids() {
    assert!(SampleCollection::new(ids(&["a", "a"])).is_err());
    assert!(SampleCollection::new(ids(&["a", " "])).is_err());
    let c = SampleCollection::new(ids(&["a", "b"])).unwrap();
    assert_eq!(c.len(), 2);
    assert_eq!(c.row_of("b"), Some(1));
    assert_eq!(c.row_of("z"), None);
}

#[test]
fn append_keeps_order_and_checks_length() {
    let mut c = SampleCollection::new(ids(&["a", "b", "c"])).unwrap();
    c.append_column("grade", Column::Factor(vec![Some("1".into()), None, Some("2".into())]))
        .unwrap();
    c.append_column("age", Column::Scalar(vec![Some(50.0), Some(61.0), None]))
        .unwrap();

    let err = c
        .append_column("short", Column::Scalar(vec![Some(1.0)]))
        .unwrap_err();
    assert!(err.to_string().contains("1 entries for 3 rows"));
    assert!(c.append_column("age", Column::Scalar(vec![None; 3])).is_err());
    assert!(c.append_column("", Column::Scalar(vec![None; 3])).is_err());

    let names: Vec<&str> = c.column_names().collect();
    assert_eq!(names, vec!["grade", "age"]);
    assert_eq!(c.column_kind("grade"), Some(ColumnKind::Factor));
    assert_eq!(c.names_of_kind(ColumnKind::Scalar), vec!["age".to_string()]);
}

#[test]
fn typed_access_checks_kind() {
    let mut c = SampleCollection::new(ids(&["a"])).unwrap();
    c.append_column("age", Column::Scalar(vec![Some(1.0)])).unwrap();
    c.append_column(
        "model",
        Column::ModelRef(vec![ModelRef {
            model_id: "m1".into(),
        }]),
    )
    .unwrap();
    assert!(c.scalars("age").is_ok());
    let err = c.factors("age").unwrap_err();
    assert!(err.to_string().contains("expected factor"));
    assert_eq!(c.model_refs("model").unwrap()[0].model_id, "m1");
    assert!(c.patterns("missing").is_err());
}

#[test]
fn align_by_id_restores_row_order() {
    let c = SampleCollection::new(ids(&["a", "b", "c"])).unwrap();
    let aligned = c
        .align_by_id(vec![
            ("c".to_string(), 3),
            ("a".to_string(), 1),
            ("b".to_string(), 2),
        ])
        .unwrap();
    assert_eq!(aligned, vec![1, 2, 3]);

    assert!(c.align_by_id(vec![("a".to_string(), 1)]).is_err());
    assert!(
        c.align_by_id(vec![
            ("a".to_string(), 1),
            ("a".to_string(), 1),
            ("b".to_string(), 2),
        ])
        .is_err()
    );
    assert!(
        c.align_by_id(vec![
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("x".to_string(), 3),
        ])
        .is_err()
    );
}
