use anyhow::Result;
use futures_util::StreamExt;
use httpmock::Method::GET;
use httpmock::MockServer;
use sitemover_core::{ContentKind, ContentSource, MigrationStatus, Reconciler, SourceError};
use sitemover_source::SourceClient;
use sitemover_test_support::fixtures::{FeedBuilder, mail_channels_json, mail_messages_json};
use sitemover_test_support::mocks::RecordingSink;
use url::Url;

fn client_for(server: &MockServer) -> Result<SourceClient> {
    Ok(SourceClient::new(
        reqwest::Client::new(),
        Url::parse(&server.base_url())?,
        "session-9",
    ))
}

#[tokio::test]
async fn site_feed_is_fetched_with_session() -> Result<()> {
    let server = MockServer::start_async().await;
    let feed = FeedBuilder::new("site1")
        .folder("A/", "A")
        .file("A/x.txt", "x.txt", 3);
    let payload = feed.build();
    let mock = server.mock(move |when, then| {
        when.method(GET)
            .path("/direct/content/site/site1.json")
            .query_param("_sessionId", "session-9");
        then.status(200)
            .header("content-type", "application/json")
            .body(payload);
    });

    let descriptors = client_for(&server)?.site_content("site1").await?;
    mock.assert();
    assert_eq!(descriptors.len(), 3);
    assert_eq!(descriptors[1].kind, ContentKind::Folder);
    Ok(())
}

#[tokio::test]
async fn feed_errors_keep_status_and_hide_session() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/direct/content/site/gone.json");
        then.status(403);
    });

    let err = client_for(&server)?
        .site_content("gone")
        .await
        .expect_err("forbidden");
    match err {
        SourceError::Status { status, url, .. } => {
            assert_eq!(status, 403);
            assert!(!url.contains("session-9"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn malformed_feed_is_a_decode_error() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/direct/content/site/site1.json");
        then.status(200).body("<html>login</html>");
    });

    let err = client_for(&server)?
        .site_content("site1")
        .await
        .expect_err("not json");
    assert!(matches!(err, SourceError::Decode { .. }));
    Ok(())
}

#[tokio::test]
async fn mail_archive_loads_every_channel() -> Result<()> {
    let server = MockServer::start_async().await;
    let channels = mail_channels_json("site1", &[("main", "Main"), ("tas", "TAs")]);
    server.mock(move |when, then| {
        when.method(GET)
            .path("/direct/mailarchive/siteChannels/site1.json")
            .query_param("_sessionId", "session-9");
        then.status(200).body(channels);
    });
    let main = mail_messages_json(&[("m1", "Welcome", "hello"), ("m2", "Exam", "soon")]);
    server.mock(move |when, then| {
        when.method(GET)
            .path("/direct/mailarchive/channelMessages/site1/main.json");
        then.status(200).body(main);
    });
    let tas = mail_messages_json(&[("t1", "Grading", "rubric")]);
    server.mock(move |when, then| {
        when.method(GET)
            .path("/direct/mailarchive/channelMessages/site1/tas.json");
        then.status(200).body(tas);
    });

    let archive = client_for(&server)?
        .mail_archive("site1")
        .await?
        .expect("site has channels");
    assert_eq!(archive.len(), 2);
    assert_eq!(archive[0].channel.name, "Main");
    assert_eq!(archive[0].messages.len(), 2);
    assert_eq!(archive[1].messages[0].id, "t1");
    Ok(())
}

#[tokio::test]
async fn site_without_mail_archive_yields_none() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET)
            .path("/direct/mailarchive/siteChannels/site1.json");
        then.status(200).body("{}");
    });

    assert!(client_for(&server)?.mail_archive("site1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn content_fetch_streams_bytes() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/access/content/group/site1/a.txt")
            .query_param("_sessionId", "session-9");
        then.status(200).body("file body");
    });

    let client = client_for(&server)?;
    let mut stream = client
        .fetch(&server.url("/access/content/group/site1/a.txt"))
        .await?;
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    mock.assert();
    assert_eq!(bytes, b"file body");

    let missing = client
        .fetch(&server.url("/access/content/group/site1/missing.txt"))
        .await;
    assert!(matches!(missing, Err(SourceError::Status { status: 404, .. })));
    Ok(())
}

#[tokio::test]
async fn copyright_alert_content_is_fetched_through_accept_endpoint() -> Result<()> {
    let server = MockServer::start_async().await;
    let feed = FeedBuilder::with_base("site1", &server.base_url())
        .sensitive_file("exam.pdf", "exam.pdf", 4)
        .file("notes.txt", "notes.txt", 5);
    let accept = server.mock(|when, then| {
        when.method(GET)
            .path("/access/accept")
            .query_param("ref", "/content/group/site1/exam.pdf")
            .query_param("url", "/access/content/group/site1/exam.pdf")
            .query_param("_sessionId", "session-9");
        then.status(200).body("exam");
    });
    let alert_page = server.mock(|when, then| {
        when.method(GET).path("/access/content/group/site1/exam.pdf");
        then.status(200).body("<html>copyright alert</html>");
    });
    let plain = server.mock(|when, then| {
        when.method(GET).path("/access/content/group/site1/notes.txt");
        then.status(200).body("notes");
    });

    let client = client_for(&server)?;
    let mut sink = RecordingSink::new();
    let report = Reconciler::new(&mut sink, &client)
        .run(&feed.descriptors()?)
        .await;

    accept.assert();
    alert_page.assert_hits(0);
    plain.assert();
    assert_eq!(report.into_payload().status, MigrationStatus::Success);
    assert_eq!(sink.files().len(), 2);
    Ok(())
}
