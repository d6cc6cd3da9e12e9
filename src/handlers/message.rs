//! Message classification for the filters and message-based categories

use crate::moderation::{AutoModSettings, detect};

/// The parts of a message the detectors look at
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFacts<'a> {
    pub content: &'a str,
    pub user_mentions: usize,
    pub role_mentions: usize,
    pub mentions_everyone: bool,
}

/// A filter that removes the message outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterHit {
    BlacklistedWord(String),
    RepeatedToken(usize),
}

impl FilterHit {
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::BlacklistedWord(word) => format!("blacklisted word `{word}`"),
            Self::RepeatedToken(count) => format!("a word repeated {count} times"),
        }
    }
}

/// What a single message triggered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assessment {
    pub filter: Option<FilterHit>,
    pub has_link: bool,
    pub mentions: usize,
}

/// Run the detectors over one message
///
/// Word and repeat filters only apply when their auto-mod switch is on.
#[must_use]
pub fn assess(automod: &AutoModSettings, facts: &MessageFacts<'_>) -> Assessment {
    let filter = if !automod.enabled {
        None
    } else if let Some(word) = automod
        .words
        .enabled
        .then(|| detect::find_blacklisted(facts.content, &automod.words.list))
        .flatten()
    {
        Some(FilterHit::BlacklistedWord(word.to_string()))
    } else if automod.repeat.enabled {
        let repeats = detect::max_token_repeat(facts.content);
        (repeats >= automod.repeat.min_repeats as usize).then_some(FilterHit::RepeatedToken(repeats))
    } else {
        None
    };

    Assessment {
        filter,
        has_link: detect::contains_link(facts.content),
        mentions: detect::mention_count(
            facts.user_mentions,
            facts.role_mentions,
            facts.mentions_everyone,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn automod() -> AutoModSettings {
        let mut settings = AutoModSettings::default();
        settings.words.enabled = true;
        settings.words.list = vec!["scam".to_string()];
        settings.repeat.enabled = true;
        settings.repeat.min_repeats = 3;
        settings
    }

    fn text(content: &str) -> MessageFacts<'_> {
        MessageFacts {
            content,
            ..MessageFacts::default()
        }
    }

    #[test]
    fn test_blacklisted_word_wins_over_repeat() {
        let assessment = assess(&automod(), &text("SCAM scam scam"));
        assert_eq!(
            assessment.filter,
            Some(FilterHit::BlacklistedWord("scam".to_string()))
        );
    }

    #[test]
    fn test_repeat_threshold() {
        assert_eq!(assess(&automod(), &text("hi hi")).filter, None);
        assert_eq!(
            assess(&automod(), &text("hi Hi HI")).filter,
            Some(FilterHit::RepeatedToken(3))
        );
    }

    #[test]
    fn test_disabled_filters() {
        let mut settings = automod();
        settings.enabled = false;
        assert_eq!(assess(&settings, &text("scam scam scam")).filter, None);

        let mut settings = automod();
        settings.words.enabled = false;
        settings.repeat.enabled = false;
        assert_eq!(assess(&settings, &text("scam scam scam")).filter, None);
    }

    #[test]
    fn test_links_and_mentions_always_reported() {
        let mut settings = automod();
        settings.enabled = false;
        let facts = MessageFacts {
            content: "join discord.gg/abc",
            user_mentions: 2,
            role_mentions: 1,
            mentions_everyone: true,
        };

        let assessment = assess(&settings, &facts);
        assert!(assessment.has_link);
        assert_eq!(assessment.mentions, 4);
    }

    #[test]
    fn test_filter_reason() {
        assert_eq!(
            FilterHit::BlacklistedWord("scam".to_string()).reason(),
            "blacklisted word `scam`"
        );
        assert_eq!(FilterHit::RepeatedToken(6).reason(), "a word repeated 6 times");
    }
}
