use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Which of a label's two locales to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Locale {
    Primary,
    Secondary,
}

/// A display string in the clinic's primary locale with an optional
/// translation into its secondary locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Label {
    pub primary: String,
    #[serde(default)]
    pub secondary: Option<String>,
}

impl Label {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    /// Text for `locale`, falling back to the primary text when no
    /// (non-blank) translation exists.
    pub fn text(&self, locale: Locale) -> &str {
        match locale {
            Locale::Primary => &self.primary,
            Locale::Secondary => self
                .secondary
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(&self.primary),
        }
    }
}
