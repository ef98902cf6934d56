//! Mail archive migration into a group-messaging service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{MailChannelContent, render_message};
use crate::error::SinkResult;
use crate::status::{FAILURE_MARKER, Outcome, describe_error};

/// Delivers rendered messages to a group.
#[async_trait]
pub trait GroupPublisher: Send + Sync {
    /// Post one RFC 822 message to `group_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the service rejects or cannot receive the message.
    async fn publish(&self, group_id: &str, rfc822: &str) -> SinkResult<()>;
}

/// Status of one message posted to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessageOutcome {
    /// Source message id.
    pub message_id: String,
    /// Channel the message came from.
    pub channel: String,
    /// `success` or `failure <detail>`.
    pub status: String,
}

impl Outcome for GroupMessageOutcome {
    fn is_failure(&self) -> bool {
        self.status.starts_with(FAILURE_MARKER)
    }
}

/// Post every message of every channel to `group_id`, one outcome per message.
pub async fn migrate_to_group(
    channels: &[MailChannelContent],
    group_id: &str,
    publisher: &dyn GroupPublisher,
) -> Vec<GroupMessageOutcome> {
    let mut outcomes = Vec::new();
    for content in channels {
        for message in &content.messages {
            let status = match publisher.publish(group_id, &render_message(message)).await {
                Ok(()) => {
                    debug!(message_id = %message.id, group_id = %group_id, "message posted");
                    "success".to_string()
                }
                Err(err) => {
                    warn!(message_id = %message.id, group_id = %group_id, error = %err, "message post failed");
                    format!("{FAILURE_MARKER} {}", describe_error(&err))
                }
            };
            outcomes.push(GroupMessageOutcome {
                message_id: message.id.clone(),
                channel: content.channel.name.clone(),
                status,
            });
        }
    }
    outcomes
}
