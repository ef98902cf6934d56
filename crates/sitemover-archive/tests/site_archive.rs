use std::fs::File;
use std::io::Read;

use anyhow::Result;
use sitemover_archive::{ArchiveFormat, ArchiveSink};
use sitemover_core::{MigrationStatus, Reconciler};
use sitemover_test_support::fixtures::FeedBuilder;
use sitemover_test_support::mocks::StaticSource;

#[tokio::test]
async fn site_feed_becomes_nested_zip() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .folder("Week 1/", "Week 1")
        .file("Week%201/slides.pdf", "slides.pdf", 6)
        .folder("Week 1/Extra:Reading/", "Extra:Reading")
        .file("Week%201/Extra:Reading/paper.txt", "paper.txt", 5)
        .file("syllabus.txt", "syllabus.txt", 8)
        .link("library", "Library", "https://library.test/");
    let source = StaticSource::new()
        .with(feed.access_url("Week%201/slides.pdf"), "slides")
        .with(feed.access_url("Week%201/Extra:Reading/paper.txt"), "paper")
        .with(feed.access_url("syllabus.txt"), "syllabus");

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("site1.zip");
    let mut sink = ArchiveSink::new(ArchiveFormat::Zip, File::create(&path)?)?;
    let report = Reconciler::new(&mut sink, &source)
        .run(&feed.descriptors()?)
        .await;
    sink.finish()?;

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.clone().into_payload().status, MigrationStatus::Success);

    let mut archive = zip::ZipArchive::new(File::open(&path)?)?;
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "Library.html",
            "Week 1/",
            "Week 1/Extra_Reading/",
            "Week 1/Extra_Reading/paper.txt",
            "Week 1/slides.pdf",
            "syllabus.txt",
        ]
    );
    let mut paper = String::new();
    archive
        .by_name("Week 1/Extra_Reading/paper.txt")?
        .read_to_string(&mut paper)?;
    assert_eq!(paper, "paper");
    Ok(())
}

#[tokio::test]
async fn fetch_failures_do_not_stop_the_archive() -> Result<()> {
    let feed = FeedBuilder::new("site1")
        .file("missing.txt", "missing.txt", 3)
        .file("present.txt", "present.txt", 3);
    let source = StaticSource::new().with(feed.access_url("present.txt"), "yes");

    let mut sink = ArchiveSink::new(ArchiveFormat::TarGz, Vec::new())?;
    let report = Reconciler::new(&mut sink, &source)
        .run(&feed.descriptors()?)
        .await;
    assert_eq!(sink.entries(), 1);
    let bytes = sink.finish()?;
    assert!(!bytes.is_empty());

    assert!(report.halt.is_none());
    assert!(report.outcomes[0].status_text.starts_with("failure: Cannot fetch content missing.txt"));
    assert_eq!(report.into_payload().status, MigrationStatus::Failure);
    Ok(())
}
