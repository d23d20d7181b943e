use std::fmt;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use super::ConversationCounters;
use crate::config::Theme;

/// The single signal handed to the presentation layer.
///
/// Ordered so that `Urgent > Attention > Quiet`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StatusLevel {
    #[default]
    Quiet,
    Attention,
    Urgent,
}

impl StatusLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLevel::Quiet => "quiet",
            StatusLevel::Attention => "attention",
            StatusLevel::Urgent => "urgent",
        }
    }

    /// Name of the tray icon for this level in the given theme.
    pub fn icon_name(&self, theme: Theme) -> &'static str {
        match (theme, self) {
            (Theme::Light, StatusLevel::Quiet) => "light",
            (Theme::Light, StatusLevel::Attention) => "light_dot_blue",
            (Theme::Light, StatusLevel::Urgent) => "light_dot_red",
            (Theme::Dark, StatusLevel::Quiet) => "dark",
            (Theme::Dark, StatusLevel::Attention) => "dark_dot_blue",
            (Theme::Dark, StatusLevel::Urgent) => "dark_dot_red",
        }
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce a set of counters to one level.
///
/// Any direct message or mention is urgent and ends the scan. Otherwise every
/// conversation is inspected, since a later one can still raise the result
/// from quiet to attention.
pub fn derive_status<'a, I>(counters: I) -> StatusLevel
where
    I: IntoIterator<Item = &'a ConversationCounters>,
{
    let mut level = StatusLevel::Quiet;
    for c in counters {
        if c.direct_unread > 0 || c.mention_unread > 0 {
            return StatusLevel::Urgent;
        }
        if c.group_unread > 0 || c.channel_unread > 0 || c.reply_unread > 0 {
            level = StatusLevel::Attention;
        }
    }
    level
}

/// Receives the derived status whenever it may have changed.
///
/// Called from the listener task and the supervisor, never while the
/// aggregate lock is held. Implementations must not block for long.
pub trait StatusSink: Send + Sync {
    fn publish(&self, level: StatusLevel);
}

impl StatusSink for watch::Sender<StatusLevel> {
    fn publish(&self, level: StatusLevel) {
        self.send_replace(level);
    }
}

impl StatusSink for mpsc::UnboundedSender<StatusLevel> {
    fn publish(&self, level: StatusLevel) {
        // Receiver gone means the presentation layer shut down first
        let _ = self.send(level);
    }
}
