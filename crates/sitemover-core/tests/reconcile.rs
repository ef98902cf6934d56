use anyhow::Result;
use sitemover_core::{
    ContentKind, MigrationStatus, Outcome, Reconciler, StepFlow, container_path,
    normalize_access_url,
};
use sitemover_test_support::fixtures::FeedBuilder;
use sitemover_test_support::mocks::{RecordingSink, SinkEvent, StaticSource};

fn source_for(feed: &FeedBuilder, files: &[&str]) -> StaticSource {
    files.iter().fold(StaticSource::new(), |source, relative| {
        source.with(feed.access_url(relative), format!("contents of {relative}"))
    })
}

#[tokio::test]
async fn nested_feed_reconstructs_tree() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .folder("A/", "A")
        .file("A/x.txt", "x.txt", 12)
        .file("y.txt", "y.txt", 12);
    let descriptors = feed.descriptors()?;
    let source = source_for(&feed, &["A/x.txt", "y.txt"]);
    let mut sink = RecordingSink::new();

    let mut reconciler = Reconciler::new(&mut sink, &source);
    let mut depths = Vec::new();
    for descriptor in &descriptors {
        assert_eq!(reconciler.step(descriptor).await, StepFlow::Continue);
        depths.push(reconciler.depth());
        let path = descriptor.source_path.as_deref().unwrap_or_default();
        let expected = if descriptor.kind == ContentKind::Folder {
            path.to_string()
        } else {
            container_path(path)
        };
        assert_eq!(reconciler.top().map(|frame| frame.source_path.as_str()), Some(expected.as_str()));
    }
    assert_eq!(depths, vec![1, 2, 2, 1]);
    let report = reconciler.finish();
    assert_eq!(report.outcomes.len(), descriptors.len() - 1);
    assert_eq!(report.outcomes[0].status_text, "folder A created.");

    assert_eq!(
        sink.files(),
        vec![
            ("folder-1".to_string(), "x.txt".to_string()),
            ("root".to_string(), "y.txt".to_string()),
        ]
    );
    match &sink.events[1] {
        SinkEvent::File { bytes, metadata, .. } => {
            assert_eq!(bytes.as_slice(), b"contents of A/x.txt");
            assert_eq!(metadata.author.as_deref(), Some("instructor"));
        }
        SinkEvent::Folder { .. } => panic!("expected file event"),
    }
    assert_eq!(report.into_payload().status, MigrationStatus::Success);
    Ok(())
}

#[tokio::test]
async fn folder_conflict_attaches_children_to_existing_folder() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .folder("A/", "A")
        .file("A/x.txt", "x.txt", 1)
        .folder("A/B/", "B")
        .file("A/B/z.txt", "z.txt", 1);
    let source = source_for(&feed, &["A/x.txt", "A/B/z.txt"]);
    let mut sink = RecordingSink::new().with_conflict("A", "existing-A");

    let report = Reconciler::new(&mut sink, &source)
        .run(&feed.descriptors()?)
        .await;

    assert!(report.halt.is_none());
    assert!(report.outcomes[0].status_text.starts_with("There is already a folder with name A"));
    assert_eq!(
        sink.folders(),
        vec![("existing-A".to_string(), "B".to_string())]
    );
    assert_eq!(
        sink.files(),
        vec![
            ("existing-A".to_string(), "x.txt".to_string()),
            ("folder-1".to_string(), "z.txt".to_string()),
        ]
    );
    assert_eq!(report.into_payload().status, MigrationStatus::Success);
    Ok(())
}

#[tokio::test]
async fn oversized_file_is_never_streamed() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .file("huge.bin", "huge.bin", 500)
        .file("small.txt", "small.txt", 10);
    let source = source_for(&feed, &["huge.bin", "small.txt"]);
    let mut sink = RecordingSink::new().with_max_object_size(500);

    let report = Reconciler::new(&mut sink, &source)
        .run(&feed.descriptors()?)
        .await;

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[0].is_failure());
    assert!(report.outcomes[0].status_text.contains("huge.bin is of size 500, too big to be uploaded to recording"));
    assert_eq!(sink.files(), vec![("root".to_string(), "small.txt".to_string())]);
    assert_eq!(report.into_payload().status, MigrationStatus::Failure);
    Ok(())
}

#[tokio::test]
async fn non_conflict_folder_error_halts_with_partial_outcomes() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .file("first.txt", "first.txt", 1)
        .folder("Bad/", "Bad")
        .file("Bad/inner.txt", "inner.txt", 1)
        .file("last.txt", "last.txt", 1);
    let source = source_for(&feed, &["first.txt", "Bad/inner.txt", "last.txt"]);
    let mut sink = RecordingSink::new().with_failure("Bad");

    let report = Reconciler::new(&mut sink, &source)
        .run(&feed.descriptors()?)
        .await;

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[1].status_text.contains("migration process was stopped"));
    assert_eq!(sink.files(), vec![("root".to_string(), "first.txt".to_string())]);
    let payload = report.into_payload();
    assert_eq!(payload.status, MigrationStatus::Failure);
    assert!(payload.detail.is_some());
    Ok(())
}

#[tokio::test]
async fn unparseable_url_halts_the_batch() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .file("a.txt", "a.txt", 1)
        .unparseable("lost");
    let descriptors = feed.descriptors()?;
    assert!(normalize_access_url(&descriptors[2].access_url).is_none());
    let source = source_for(&feed, &["a.txt"]);
    let mut sink = RecordingSink::new();

    let report = Reconciler::new(&mut sink, &source).run(&descriptors).await;
    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[1].source_path.is_none());
    assert!(report.halt.is_some());
    Ok(())
}

#[tokio::test]
async fn links_and_duplicate_siblings_get_distinct_names() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .link("lib", "Library", "https://library.test/")
        .file("notes", "Notes.txt", 3)
        .file("notes-2", "notes.txt", 3);
    let source = source_for(&feed, &["notes", "notes-2"]);
    let mut sink = RecordingSink::new();

    let descriptors = feed.descriptors()?;
    assert_eq!(descriptors[1].kind, ContentKind::Link);
    let report = Reconciler::new(&mut sink, &source).run(&descriptors).await;

    assert!(report.outcomes.iter().all(|outcome| !outcome.is_failure()));
    let names: Vec<String> = sink.files().into_iter().map(|(_, name)| name).collect();
    assert_eq!(names, vec!["Library.html", "Notes.txt", "notes (2).txt"]);
    match &sink.events[0] {
        SinkEvent::File { bytes, .. } => {
            let page = String::from_utf8_lossy(bytes);
            assert!(page.contains("https://library.test/"));
        }
        SinkEvent::Folder { .. } => panic!("expected link page"),
    }
    Ok(())
}
