//! Mail archive migration into a sink.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{MESSAGE_FILE_NAME, MailChannelContent, MailMessage, message_container_name, render_message};
use crate::content::content_from_bytes;
use crate::descriptor::ContentKind;
use crate::error::{SinkError, SinkResult};
use crate::names::NameRegistry;
use crate::sink::{FileMetadata, Sink, SinkHandle};
use crate::source::ContentSource;
use crate::status::{FAILURE_MARKER, ItemStatus, Outcome, describe_error};

const SUCCESS_TEXT: &str = "success";

/// Status of one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentOutcome {
    /// Attachment file name.
    pub name: String,
    /// `success` or `failure <detail>`.
    pub status: String,
}

/// Status of one message and its attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOutcome {
    /// Destination container name of the message.
    pub message: String,
    /// `success` or `failure <detail>`.
    pub message_status: String,
    /// Per-attachment statuses.
    pub attachments: Vec<AttachmentOutcome>,
}

impl Outcome for MessageOutcome {
    fn is_failure(&self) -> bool {
        self.message_status.starts_with(FAILURE_MARKER)
            || self
                .attachments
                .iter()
                .any(|attachment| attachment.status.starts_with(FAILURE_MARKER))
    }
}

fn status_text(status: &ItemStatus) -> String {
    if status.failed {
        format!("{FAILURE_MARKER} {}", status.detail)
    } else {
        SUCCESS_TEXT.to_string()
    }
}

async fn open_container(
    sink: &mut dyn Sink,
    parent: &SinkHandle,
    name: &str,
) -> SinkResult<SinkHandle> {
    match sink.create_folder(parent, name, None).await {
        Err(SinkError::Conflict { existing, .. }) => Ok(existing),
        other => other,
    }
}

/// Copy every message of every channel into `sink`.
///
/// A channel container is created only when the site has more than one channel. Each
/// message gets its own container holding `message.txt` and its attachments; attachment
/// failures are recorded per attachment and never fail the message.
pub async fn migrate_mail_archive(
    channels: &[MailChannelContent],
    sink: &mut dyn Sink,
    source: &dyn ContentSource,
) -> Vec<MessageOutcome> {
    let mut names = NameRegistry::new(sink.name_policy());
    let root = sink.root();
    let folder_per_channel = channels.len() > 1;
    let mut outcomes = Vec::new();

    for content in channels {
        let channel_handle = if folder_per_channel {
            let proposed = names.sanitize(ContentKind::Folder, &content.channel.name);
            let name = names.claim(&root, ContentKind::Folder, &proposed);
            match open_container(sink, &root, &name).await {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(channel = %content.channel.name, error = %err, "channel container unavailable; using root");
                    root.clone()
                }
            }
        } else {
            root.clone()
        };
        info!(channel = %content.channel.id, messages = content.messages.len(), "migrating mail channel");

        for message in &content.messages {
            outcomes.push(migrate_message(sink, source, &mut names, &channel_handle, message).await);
        }
    }
    outcomes
}

async fn migrate_message(
    sink: &mut dyn Sink,
    source: &dyn ContentSource,
    names: &mut NameRegistry,
    parent: &SinkHandle,
    message: &MailMessage,
) -> MessageOutcome {
    let proposed = message_container_name(names.policy(), message);
    let container_name = names.claim(parent, ContentKind::Folder, &proposed);
    let container = match open_container(sink, parent, &container_name).await {
        Ok(handle) => handle,
        Err(err) => {
            return MessageOutcome {
                message: container_name,
                message_status: format!(
                    "{FAILURE_MARKER} problem creating message folder: {}",
                    describe_error(&err)
                ),
                attachments: Vec::new(),
            };
        }
    };

    let rendered = render_message(message);
    let metadata = FileMetadata {
        size: rendered.len() as u64,
        ..FileMetadata::default()
    };
    // An attachment must not shadow the message file.
    names.reserve(&container, MESSAGE_FILE_NAME);
    let message_status = sink
        .put_file(&container, MESSAGE_FILE_NAME, content_from_bytes(rendered), &metadata)
        .await;

    let mut attachments = Vec::with_capacity(message.attachments.len());
    for attachment in &message.attachments {
        let proposed = names.sanitize(ContentKind::File, &attachment.name);
        let name = names.claim(&container, ContentKind::File, &proposed);
        let status = match source.fetch(&attachment.url).await {
            Ok(content) => {
                sink.put_file(&container, &name, content, &FileMetadata::default())
                    .await
            }
            Err(err) => ItemStatus::failed(format!(
                "problem getting attachment {}: {}",
                attachment.name,
                describe_error(&err)
            )),
        };
        attachments.push(AttachmentOutcome {
            name: attachment.name.clone(),
            status: status_text(&status),
        });
    }

    MessageOutcome {
        message: container_name,
        message_status: status_text(&message_status),
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentStream;
    use crate::error::{SourceError, SourceResult};
    use crate::mail::{MailAttachment, MailChannel};
    use crate::names::NamePolicy;
    use async_trait::async_trait;

    #[derive(Default)]
    struct PathSink {
        folders: Vec<String>,
        files: Vec<String>,
    }

    #[async_trait]
    impl Sink for PathSink {
        fn label(&self) -> &'static str {
            "paths"
        }

        fn root(&self) -> SinkHandle {
            SinkHandle::new("")
        }

        fn name_policy(&self) -> NamePolicy {
            NamePolicy::ARCHIVE
        }

        async fn create_folder(
            &mut self,
            parent: &SinkHandle,
            name: &str,
            _description: Option<&str>,
        ) -> SinkResult<SinkHandle> {
            let path = format!("{parent}{name}/");
            self.folders.push(path.clone());
            Ok(SinkHandle::new(path))
        }

        async fn put_file(
            &mut self,
            parent: &SinkHandle,
            name: &str,
            _content: ContentStream,
            _metadata: &FileMetadata,
        ) -> ItemStatus {
            self.files.push(format!("{parent}{name}"));
            ItemStatus::ok("")
        }
    }

    struct FlakySource;

    #[async_trait]
    impl ContentSource for FlakySource {
        async fn fetch(&self, access_url: &str) -> SourceResult<ContentStream> {
            if access_url.contains("broken") {
                return Err(SourceError::Status {
                    operation: "fetch",
                    url: access_url.to_string(),
                    status: 500,
                });
            }
            Ok(content_from_bytes("attachment"))
        }
    }

    fn channel(name: &str, attachments: Vec<MailAttachment>) -> MailChannelContent {
        MailChannelContent {
            channel: MailChannel {
                id: name.to_lowercase(),
                name: name.to_string(),
            },
            messages: vec![MailMessage {
                id: "1".into(),
                headers: vec!["Date: d".into(), "From: f".into(), "Subject: s".into()],
                body: "b".into(),
                attachments,
            }],
        }
    }

    fn attachment(name: &str, url: &str) -> MailAttachment {
        MailAttachment {
            name: name.into(),
            mime_type: None,
            url: url.into(),
        }
    }

    #[tokio::test]
    async fn single_channel_writes_messages_at_root() {
        let mut sink = PathSink::default();
        let channels = [channel("Main", vec![attachment("a.pdf", "https://lms.test/a.pdf")])];
        let outcomes = migrate_mail_archive(&channels, &mut sink, &FlakySource).await;
        assert_eq!(sink.folders, vec!["d f s/".to_string()]);
        assert_eq!(sink.files, vec!["d f s/message.txt".to_string(), "d f s/a.pdf".to_string()]);
        assert_eq!(outcomes[0].message_status, "success");
        assert!(!outcomes[0].is_failure());
    }

    #[tokio::test]
    async fn multiple_channels_get_containers_and_isolate_attachment_failures() {
        let mut sink = PathSink::default();
        let channels = [
            channel("Main", vec![
                attachment("bad.pdf", "https://lms.test/broken"),
                attachment("good.pdf", "https://lms.test/good"),
            ]),
            channel("Staff", Vec::new()),
        ];
        let outcomes = migrate_mail_archive(&channels, &mut sink, &FlakySource).await;
        assert_eq!(sink.folders[0], "Main/");
        assert!(sink.folders.contains(&"Staff/d f s/".to_string()));
        assert_eq!(outcomes.len(), 2);
        let first = &outcomes[0];
        assert_eq!(first.message_status, "success");
        assert!(first.attachments[0].status.starts_with("failure problem getting attachment bad.pdf"));
        assert_eq!(first.attachments[1].status, "success");
        assert!(first.is_failure());
        assert!(!outcomes[1].is_failure());
    }
}
