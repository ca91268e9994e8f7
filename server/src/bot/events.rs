//! Chat Event Types
//!
//! Inbound events in the OneBot v11 HTTP POST format. Only the fields the bot
//! reads are modelled; everything else is ignored.

use serde::{Deserialize, Serialize};

use crate::db::AccountId;

/// Sub-type of group messages sent anonymously.
const ANONYMOUS: &str = "anonymous";

/// Inbound event, discriminated by `post_type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "post_type", rename_all = "snake_case")]
pub enum Event {
    Message(MessageEvent),
    Notice(NoticeEvent),
    #[serde(other)]
    Other,
}

/// Chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    /// "group" or "private".
    pub message_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub user_id: AccountId,
    /// Message text with CQ codes.
    pub raw_message: String,
}

impl MessageEvent {
    /// Group the message was posted in, unless it was sent anonymously.
    pub fn attributable_group(&self) -> Option<i64> {
        if self.message_type != "group" || self.sub_type.as_deref() == Some(ANONYMOUS) {
            return None;
        }
        self.group_id
    }
}

/// Group or account notice.
#[derive(Debug, Clone, Deserialize)]
pub struct NoticeEvent {
    pub notice_type: String,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<AccountId>,
}

impl NoticeEvent {
    /// `(group, account)` if this notice reports a member leaving a group.
    pub fn member_left(&self) -> Option<(i64, AccountId)> {
        if self.notice_type != "group_decrease" {
            return None;
        }
        Some((self.group_id?, self.user_id?))
    }
}

/// Quick-operation body returned for a handled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    pub reply: String,
    pub at_sender: bool,
}

impl QuickReply {
    #[must_use]
    pub const fn new(reply: String) -> Self {
        Self {
            reply,
            at_sender: false,
        }
    }
}
