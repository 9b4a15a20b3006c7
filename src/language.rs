//! Supported interaction languages
//!
//! The set is fixed at build time. Each language carries a ranked list of
//! acceptable synthesis voice locales and one exact recognizer locale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AgriError;

/// Language selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Mr,
    Ta,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::Hi, Language::Mr, Language::Ta];

    /// Voice locales in order of preference, most specific regional variant first
    pub fn voice_preferences(self) -> &'static [&'static str] {
        match self {
            Language::En => &["en-US", "en-GB", "en"],
            Language::Hi => &["hi-IN", "hi"],
            Language::Mr => &["mr-IN", "mr"],
            Language::Ta => &["ta-IN", "ta"],
        }
    }

    /// Locale handed to the recognizer; recognizers match exact locales only
    pub fn recognizer_locale(self) -> &'static str {
        match self {
            Language::En => "en-US",
            Language::Hi => "hi-IN",
            Language::Mr => "mr-IN",
            Language::Ta => "ta-IN",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Mr => "mr",
            Language::Ta => "ta",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = AgriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == code)
            .ok_or_else(|| AgriError::Config(format!("unsupported language '{}'", s)))
    }
}

/// Whether a platform locale identifier starts with the preferred locale.
///
/// Platforms disagree on the separator (`en_US` vs `en-US`) and on case, so
/// both sides are normalized first.
pub fn locale_matches(locale: &str, preferred: &str) -> bool {
    let normalize = |s: &str| s.replace('_', "-").to_ascii_lowercase();
    normalize(locale).starts_with(&normalize(preferred))
}
