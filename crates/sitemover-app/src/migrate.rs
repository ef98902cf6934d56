//! Job bodies: fetch from the source, drive a destination, produce the status payload.
//!
//! # Design
//! - Failures before the first item (feed fetch or decode) become a site-level failure
//!   payload with an empty item list; they never escape as errors.
//! - Archive outputs are finished inside the job; a failure to close the archive marks the
//!   whole payload as failed while keeping the item list.

use std::io::Write;

use sitemover_archive::{ArchiveFormat, ArchiveSink};
use sitemover_core::mail::{
    GroupMessageOutcome, GroupPublisher, MessageOutcome, migrate_mail_archive, migrate_to_group,
};
use sitemover_core::{
    ItemOutcome, MigrationStatus, MigrationStatusPayload, Reconciler, Sink, aggregate,
    describe_error,
};
use sitemover_source::SourceClient;
use tracing::{info, warn};

/// Mark `payload` failed with `detail`, keeping any earlier detail in front.
fn fail_payload<T>(payload: &mut MigrationStatusPayload<T>, detail: String) {
    payload.status = MigrationStatus::Failure;
    payload.detail = Some(match payload.detail.take() {
        Some(earlier) => format!("{earlier}; {detail}"),
        None => detail,
    });
}

/// Migrate the content of `site_id` into `sink`.
pub async fn site_into_sink(
    source: &SourceClient,
    site_id: &str,
    sink: &mut dyn Sink,
) -> MigrationStatusPayload<ItemOutcome> {
    let descriptors = match source.site_content(site_id).await {
        Ok(descriptors) => descriptors,
        Err(err) => {
            warn!(site_id = %site_id, error = %describe_error(&err), "site content unavailable");
            return MigrationStatusPayload::site_failure(format!(
                "Cannot get content for site {site_id}: {}",
                describe_error(&err)
            ));
        }
    };
    let report = Reconciler::new(sink, source).run(&descriptors).await;
    if let Some(halt) = &report.halt {
        warn!(site_id = %site_id, reason = %halt, "traversal halted");
    }
    report.into_payload()
}

/// Migrate the content of `site_id` into an archive written to `out`.
pub async fn site_into_archive<W: Write + Send>(
    source: &SourceClient,
    site_id: &str,
    format: ArchiveFormat,
    out: W,
) -> MigrationStatusPayload<ItemOutcome> {
    let mut sink = match ArchiveSink::new(format, out) {
        Ok(sink) => sink,
        Err(err) => {
            return MigrationStatusPayload::site_failure(format!(
                "Cannot start archive for site {site_id}: {}",
                describe_error(&err)
            ));
        }
    };
    let mut payload = site_into_sink(source, site_id, &mut sink).await;
    finish_archive(sink, site_id, &mut payload);
    payload
}

/// Copy the mail archive of `site_id` into an archive written to `out`.
///
/// A site without mail channels yields an empty, successful payload.
pub async fn mail_into_archive<W: Write + Send>(
    source: &SourceClient,
    site_id: &str,
    format: ArchiveFormat,
    out: W,
) -> MigrationStatusPayload<MessageOutcome> {
    let channels = match source.mail_archive(site_id).await {
        Ok(Some(channels)) => channels,
        Ok(None) => {
            info!(site_id = %site_id, "site has no mail archive channels");
            Vec::new()
        }
        Err(err) => {
            return MigrationStatusPayload::site_failure(format!(
                "Cannot get mail archive for site {site_id}: {}",
                describe_error(&err)
            ));
        }
    };
    let mut sink = match ArchiveSink::new(format, out) {
        Ok(sink) => sink,
        Err(err) => {
            return MigrationStatusPayload::site_failure(format!(
                "Cannot start archive for site {site_id}: {}",
                describe_error(&err)
            ));
        }
    };
    let outcomes = migrate_mail_archive(&channels, &mut sink, source).await;
    let mut payload = aggregate(outcomes, None);
    finish_archive(sink, site_id, &mut payload);
    payload
}

/// Post the mail archive of `site_id` to `group_id`.
///
/// A site without mail channels is a job-level failure.
pub async fn mail_into_group(
    source: &SourceClient,
    site_id: &str,
    group_id: &str,
    publisher: &dyn GroupPublisher,
) -> MigrationStatusPayload<GroupMessageOutcome> {
    match source.mail_archive(site_id).await {
        Ok(Some(channels)) => aggregate(migrate_to_group(&channels, group_id, publisher).await, None),
        Ok(None) => MigrationStatusPayload::site_failure(format!(
            "Site {site_id} has no mail archive channels"
        )),
        Err(err) => MigrationStatusPayload::site_failure(format!(
            "Cannot get mail archive for site {site_id}: {}",
            describe_error(&err)
        )),
    }
}

fn finish_archive<W: Write, T>(
    sink: ArchiveSink<W>,
    site_id: &str,
    payload: &mut MigrationStatusPayload<T>,
) {
    let entries = sink.entries();
    match sink.finish() {
        Ok(_) => info!(site_id = %site_id, entries, "archive written"),
        Err(err) => {
            warn!(site_id = %site_id, error = %describe_error(&err), "archive could not be finished");
            fail_payload(
                payload,
                format!("Problem finishing archive: {}", describe_error(&err)),
            );
        }
    }
}
