//! Manifest validation, comparison and subset tests

use annotation_manifest_sdk::analysis::{SubsetFilter, compare, extract_subset};
use annotation_manifest_sdk::models::{
    AnnotationDocument, AnnotationRecord, CollectionRecord, FolderRecord, ItemRecord, Manifest,
};
use annotation_manifest_sdk::validation::{ValidationIssue, ValidationSummary, validate};

/// Two collections with nested folders, a detached user folder, and
/// annotations by three annotators.
fn sample_manifest() -> Manifest {
    let mut m = Manifest::new(Some("https://girder.example.com/api/v1".into()));
    m.collections.insert("c1".into(), CollectionRecord::new("Skin"));
    m.collections.insert("c2".into(), CollectionRecord::new("Eyes"));

    m.folders
        .insert("f1".into(), FolderRecord::in_collection("Cases", "c1"));
    m.folders
        .insert("f1a".into(), FolderRecord::in_folder("2023", "f1", "Cases"));
    m.folders
        .insert("f1b".into(), FolderRecord::in_folder("2024", "f1", "Cases"));
    m.folders
        .insert("f2".into(), FolderRecord::in_collection("Retina", "c2"));
    m.folders.insert(
        "fu".into(),
        FolderRecord {
            name: "Private".into(),
            parent_id: Some("u1".into()),
            parent_collection: Some("user".into()),
            ..Default::default()
        },
    );

    m.items.insert("i1".into(), ItemRecord::new("a.jpg", "f1a"));
    m.items.insert("i2".into(), ItemRecord::new("b.jpg", "f1b"));
    m.items.insert("i3".into(), ItemRecord::new("c.jpg", "f2"));
    m.items.insert("i4".into(), ItemRecord::new("d.jpg", "fu"));

    let annotations = [
        ("a1", "i1", "alice"),
        ("a2", "i1", "bob"),
        ("a3", "i2", "alice"),
        ("a4", "i3", "carol"),
        ("a5", "i4", "bob"),
    ];
    for (id, item, annotator) in annotations {
        m.annotations.insert(
            id.into(),
            AnnotationRecord::new(item, AnnotationDocument::new(annotator)),
        );
    }
    m
}

/// Every annotation's item, every item's folder and every folder's folder
/// parent is present.
fn assert_closed(m: &Manifest) {
    for annotation in m.annotations.values() {
        assert!(m.items.contains_key(&annotation.item_id));
    }
    for item in m.items.values() {
        assert!(m.folders.contains_key(&item.folder_id));
    }
    for folder in m.folders.values() {
        if let annotation_manifest_sdk::models::FolderParent::Folder(parent) = folder.parent() {
            assert!(m.folders.contains_key(parent));
        }
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_sample_is_valid() {
        let m = sample_manifest();
        assert!(validate(&m).is_empty());
        let summary = ValidationSummary::new(validate(&m));
        assert!(summary.to_string().contains("✓ Export is valid"));
    }

    #[test]
    fn test_all_issue_kinds_reported_in_order() {
        let mut m = sample_manifest();
        m.annotations.insert(
            "a9".into(),
            AnnotationRecord::new("gone", AnnotationDocument::new("x")),
        );
        m.items.insert("i9".into(), ItemRecord::new("z.jpg", "gone"));
        m.folders
            .insert("f9".into(), FolderRecord::in_folder("Lost", "gone", "x"));
        m.folders
            .insert("fx".into(), FolderRecord::in_folder("X", "fy", "y"));
        m.folders
            .insert("fy".into(), FolderRecord::in_folder("Y", "fx", "x"));

        let issues = validate(&m);
        assert_eq!(issues.len(), 4);
        assert_eq!(
            issues[0],
            ValidationIssue::OrphanedAnnotation {
                annotation_id: "a9".into(),
                item_id: "gone".into(),
            }
        );
        assert!(matches!(issues[1], ValidationIssue::OrphanedItem { .. }));
        assert!(matches!(
            issues[2],
            ValidationIssue::BrokenFolderHierarchy { .. }
        ));
        assert!(matches!(issues[3], ValidationIssue::FolderCycle { .. }));
    }

    #[test]
    fn test_duplicate_names_are_not_issues() {
        let mut m = sample_manifest();
        m.items.insert("i5".into(), ItemRecord::new("a.jpg", "f1a"));
        assert!(validate(&m).is_empty());
    }

    #[test]
    fn test_summary_caps_display() {
        let mut m = Manifest::default();
        for n in 0..15 {
            m.items
                .insert(format!("i{:02}", n), ItemRecord::new("x", "missing"));
        }
        let summary = ValidationSummary::new(validate(&m));
        let text = summary.to_string();
        assert!(text.contains("Total issues found: 15"));
        assert!(text.contains("... and 5 more issues"));
        assert_eq!(text.matches("Orphaned item").count(), 10);
    }
}

mod compare_tests {
    use super::*;

    #[test]
    fn test_compare_is_symmetric() {
        let a = sample_manifest();
        let mut b = sample_manifest();
        b.collections.remove("c2");
        b.collections
            .insert("c3".into(), CollectionRecord::new("Hands"));
        b.annotations.remove("a1");

        let ab = compare(&a, &b);
        let ba = compare(&b, &a);
        assert_eq!(ab.collections.swapped(), ba.collections);
        assert_eq!(ab.annotations.swapped(), ba.annotations);
        assert_eq!(ab.items, ba.items.swapped());

        assert_eq!(
            ab.collections.only_in_a.iter().collect::<Vec<_>>(),
            ["c2"]
        );
        assert_eq!(
            ab.collections.only_in_b.iter().collect::<Vec<_>>(),
            ["c3"]
        );
        assert_eq!(ab.annotations.only_in_a.len(), 1);
        assert_eq!(ab.annotations.in_both.len(), 4);
        assert!(!ab.is_identical());
    }

    #[test]
    fn test_compare_with_self() {
        let a = sample_manifest();
        let diff = compare(&a, &a);
        assert!(diff.is_identical());
        assert_eq!(diff.items.in_both.len(), a.items.len());
    }
}

mod subset_tests {
    use super::*;

    fn scenario() -> Manifest {
        let mut m = Manifest::new(None);
        m.collections.insert("C1".into(), CollectionRecord::new("One"));
        m.folders
            .insert("F1".into(), FolderRecord::in_collection("Folder", "C1"));
        m.items.insert("I1".into(), ItemRecord::new("image.jpg", "F1"));
        m.annotations.insert(
            "A1".into(),
            AnnotationRecord::new("I1", AnnotationDocument::new("alice")),
        );
        m
    }

    #[test]
    fn test_item_filter_scenario_without_collection_filter() {
        let m = scenario();
        let subset = extract_subset(&m, &SubsetFilter::new().with_items(["I1"]));
        assert!(subset.collections.contains_key("C1"));
        assert!(subset.folders.contains_key("F1"));
        assert!(subset.items.contains_key("I1"));
        assert!(subset.annotations.contains_key("A1"));
        assert!(validate(&subset).is_empty());
    }

    #[test]
    fn test_item_filter_scenario_with_other_collection() {
        let mut m = scenario();
        m.collections.insert("C2".into(), CollectionRecord::new("Two"));
        let subset = extract_subset(
            &m,
            &SubsetFilter::new()
                .with_collections(["C2"])
                .with_items(["I1"]),
        );
        assert!(!subset.collections.contains_key("C1"));
        assert!(subset.folders.contains_key("F1"));
        assert!(subset.items.contains_key("I1"));
        assert!(subset.annotations.contains_key("A1"));
        assert!(validate(&subset).is_empty());
    }

    #[test]
    fn test_closure_and_soundness_across_filters() {
        let source = sample_manifest();
        let collection_options: [&[&str]; 4] = [&[], &["c1"], &["c2"], &["c1", "c2", "nope"]];
        let item_options: [&[&str]; 4] = [&[], &["i1"], &["i2", "i3"], &["i4", "ghost"]];
        let annotator_options: [&[&str]; 3] = [&[], &["alice"], &["bob", "carol"]];

        for collections in collection_options {
            for items in item_options {
                for annotators in annotator_options {
                    let filter = SubsetFilter::new()
                        .with_collections(collections.iter().copied())
                        .with_items(items.iter().copied())
                        .with_annotators(annotators.iter().copied());
                    let subset = extract_subset(&source, &filter);

                    assert_closed(&subset);
                    assert!(
                        validate(&subset).is_empty(),
                        "invalid subset for {:?}",
                        filter
                    );
                    for (id, annotation) in &subset.annotations {
                        assert_eq!(Some(annotation), source.annotations.get(id));
                        if !annotators.is_empty() {
                            assert!(annotators.contains(&annotation.annotator()));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_detached_folder_excluded_by_collection_filter() {
        let source = sample_manifest();
        let subset = extract_subset(&source, &SubsetFilter::new().with_collections(["c1"]));
        assert!(!subset.folders.contains_key("fu"));
        assert!(!subset.items.contains_key("i4"));
        assert_eq!(subset.folders.len(), 3);
    }

    #[test]
    fn test_subset_survives_file_round_trip() {
        let source = sample_manifest();
        let subset = extract_subset(&source, &SubsetFilter::new().with_annotators(["alice"]));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("subset.json");
        subset.save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();

        assert_eq!(loaded, subset);
        let criteria = loaded.subset_criteria.unwrap();
        assert_eq!(criteria.user_names, Some(vec!["alice".to_string()]));
        assert_eq!(criteria.collection_ids, None);
    }
}
