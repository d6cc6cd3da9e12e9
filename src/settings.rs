//! Process-wide settings loaded from the environment (and `.env` when present)

use crate::moderation::{TrackerError, TrackerSettings, ViolationCategory, WindowSpec};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Invalid window for {name}: {source}")]
    Window {
        name: &'static str,
        #[source]
        source: TrackerError,
    },
}

/// Bot settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub data_dir: PathBuf,
    /// Users trusted in every guild
    pub owner_ids: Vec<u64>,
    pub prefix: String,
    pub antinuke_window_secs: u64,
    pub antinuke_capacity: usize,
    pub spam_window_secs: u64,
    pub spam_capacity: usize,
}

impl Settings {
    /// Load `.env` if present, then read the process environment
    ///
    /// # Errors
    /// Returns an error if `DISCORD_TOKEN` is missing or a numeric value is malformed
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`
    ///
    /// # Errors
    /// Returns an error if `DISCORD_TOKEN` is missing or a numeric value is malformed
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(SettingsError::Missing("DISCORD_TOKEN"))?;

        let owner_ids = match lookup("WARDEN_OWNER_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u64>().map_err(|_| SettingsError::Invalid {
                        name: "WARDEN_OWNER_IDS",
                        value: s.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            token,
            data_dir: lookup("WARDEN_DATA_DIR").map_or_else(|| PathBuf::from("data"), PathBuf::from),
            owner_ids,
            prefix: lookup("WARDEN_PREFIX").unwrap_or_else(|| "!".to_string()),
            antinuke_window_secs: parse_or(&lookup, "WARDEN_ANTINUKE_WINDOW_SECS", 12)?,
            antinuke_capacity: parse_or(&lookup, "WARDEN_ANTINUKE_CAPACITY", 10)?,
            spam_window_secs: parse_or(&lookup, "WARDEN_SPAM_WINDOW_SECS", 7)?,
            spam_capacity: parse_or(&lookup, "WARDEN_SPAM_CAPACITY", 20)?,
        })
    }

    /// Window specs for the violation tracker
    ///
    /// # Errors
    /// Returns an error if a configured window or capacity is zero
    pub fn tracker_settings(&self) -> Result<TrackerSettings, SettingsError> {
        let antinuke = WindowSpec::from_secs(self.antinuke_window_secs, self.antinuke_capacity)
            .map_err(|source| SettingsError::Window {
                name: "WARDEN_ANTINUKE_WINDOW_SECS",
                source,
            })?;
        let spam = WindowSpec::from_secs(self.spam_window_secs, self.spam_capacity).map_err(
            |source| SettingsError::Window {
                name: "WARDEN_SPAM_WINDOW_SECS",
                source,
            },
        )?;

        Ok(TrackerSettings::new(antinuke).with_override(ViolationCategory::SpamMessage, spam))
    }

    #[must_use]
    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_ids.contains(&user_id)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, SettingsError> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| SettingsError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(settings.token, "abc");
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.prefix, "!");
        assert!(settings.owner_ids.is_empty());
        assert_eq!(settings.antinuke_window_secs, 12);
        assert_eq!(settings.antinuke_capacity, 10);
        assert_eq!(settings.spam_window_secs, 7);
        assert_eq!(settings.spam_capacity, 20);
    }

    #[test]
    fn test_missing_token() {
        let err = Settings::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::Missing("DISCORD_TOKEN")));
    }

    #[test]
    fn test_overrides_and_owner_ids() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("WARDEN_OWNER_IDS", "1, 2,3"),
            ("WARDEN_PREFIX", "?"),
            ("WARDEN_SPAM_CAPACITY", "30"),
        ]))
        .unwrap();
        assert_eq!(settings.owner_ids, vec![1, 2, 3]);
        assert!(settings.is_owner(2));
        assert_eq!(settings.prefix, "?");
        assert_eq!(settings.spam_capacity, 30);
    }

    #[test]
    fn test_invalid_number() {
        let err = Settings::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("WARDEN_ANTINUKE_CAPACITY", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("WARDEN_ANTINUKE_CAPACITY"));

        let err = Settings::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("WARDEN_OWNER_IDS", "1,x"),
        ]))
        .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { .. }));
    }

    #[test]
    fn test_tracker_settings() {
        let settings = Settings::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc")])).unwrap();
        let tracker = settings.tracker_settings().unwrap();
        assert_eq!(
            tracker.spec_for(ViolationCategory::SpamMessage),
            WindowSpec::from_secs(7, 20).unwrap()
        );
        assert_eq!(
            tracker.spec_for(ViolationCategory::MassBan),
            WindowSpec::from_secs(12, 10).unwrap()
        );

        let zero = Settings::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("WARDEN_ANTINUKE_WINDOW_SECS", "0"),
        ]))
        .unwrap();
        assert!(zero.tracker_settings().is_err());
    }
}
