//! Plain-text message transcripts for purge reports and closed tickets

use chrono::{DateTime, Utc};
use poise::serenity_prelude::Message;

/// Longest message snippet kept per line
const SNIPPET_LEN: usize = 150;

/// One message as it appears in a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub author: String,
    pub at: DateTime<Utc>,
    pub content: String,
    pub attachments: usize,
}

impl TranscriptLine {
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        Self {
            author: message.author.name.clone(),
            at: DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0).unwrap_or_default(),
            content: message.content.clone(),
            attachments: message.attachments.len(),
        }
    }

    fn render(&self) -> String {
        let mut snippet: String = self.content.replace('`', "'");
        if snippet.chars().count() > SNIPPET_LEN {
            snippet = snippet.chars().take(SNIPPET_LEN - 3).collect();
            snippet.push_str("...");
        }
        let mut parts = Vec::new();
        if !snippet.is_empty() {
            parts.push(snippet);
        }
        if self.attachments > 0 {
            parts.push(format!("[attachments: {}]", self.attachments));
        }
        let body = if parts.is_empty() {
            "[no content]".to_string()
        } else {
            parts.join(" ")
        };
        format!("{} {} UTC: {body}", self.author, self.at.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Render `lines` oldest first, one message per line
#[must_use]
pub fn render(lines: &[TranscriptLine]) -> String {
    let mut ordered: Vec<&TranscriptLine> = lines.iter().collect();
    ordered.sort_by_key(|line| line.at);
    ordered
        .into_iter()
        .map(TranscriptLine::render)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(author: &str, secs: i64, content: &str, attachments: usize) -> TranscriptLine {
        TranscriptLine {
            author: author.to_string(),
            at: DateTime::from_timestamp(secs, 0).unwrap(),
            content: content.to_string(),
            attachments,
        }
    }

    #[test]
    fn test_render_orders_oldest_first() {
        let text = render(&[line("bob", 60, "second", 0), line("alice", 0, "first", 0)]);
        assert_eq!(
            text,
            "alice 1970-01-01 00:00:00 UTC: first\nbob 1970-01-01 00:01:00 UTC: second"
        );
    }

    #[test]
    fn test_render_snippets() {
        let long = "x".repeat(200);
        let text = render(&[line("a", 0, &long, 0)]);
        assert!(text.ends_with(&format!("{}...", "x".repeat(147))));

        assert_eq!(
            render(&[line("a", 0, "see `code`", 2)]),
            "a 1970-01-01 00:00:00 UTC: see 'code' [attachments: 2]"
        );
        assert_eq!(
            render(&[line("a", 0, "", 0)]),
            "a 1970-01-01 00:00:00 UTC: [no content]"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "");
    }
}
