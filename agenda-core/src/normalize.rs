//! Text and sender-identity normalization.
//!
//! Everything the conversation engine compares (menu options, service names,
//! greetings, yes/no answers) goes through [`normalize`] first, so that
//! "Coloração", " COLORACAO " and "coloracao" are the same word.

use serde::Deserialize;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Country calling code prepended to sender numbers that lack one.
pub const COUNTRY_CODE: &str = "55";

/// Trim, lowercase and strip diacritics. Never fails; empty in, empty out.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    folded.trim().to_string()
}

/// Canonical identity key for a raw sender address such as
/// `whatsapp:+55 (11) 99999-9999`.
///
/// Non-digits are dropped and the country code is added when missing, so the
/// result is always `+55…`. A missing sender degenerates to `+55`.
pub fn normalize_identity(raw_from: &str) -> String {
    let digits: String = raw_from.chars().filter(char::is_ascii_digit).collect();
    if digits.starts_with(COUNTRY_CODE) {
        format!("+{}", digits)
    } else {
        format!("+{}{}", COUNTRY_CODE, digits)
    }
}

/// How greeting words are located inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreetingMatch {
    /// Any occurrence of the greeting as a substring ("bom dia kelly" matches "bom dia").
    #[default]
    Substring,
    /// The greeting must appear as whole words ("oito" does not match "oi").
    Token,
}

/// Greeting detector over a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct GreetingMatcher {
    greetings: Vec<String>,
    strategy: GreetingMatch,
}

impl GreetingMatcher {
    pub fn new<I, S>(greetings: I, strategy: GreetingMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let greetings = greetings
            .into_iter()
            .map(|g| normalize(g.as_ref()))
            .filter(|g| !g.is_empty())
            .collect();
        Self {
            greetings,
            strategy,
        }
    }

    /// `text` must already be normalized.
    pub fn is_greeting(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match self.strategy {
            GreetingMatch::Substring => self.greetings.iter().any(|g| text.contains(g.as_str())),
            GreetingMatch::Token => {
                let words: Vec<&str> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .collect();
                self.greetings.iter().any(|g| {
                    let needle: Vec<&str> = g.split_whitespace().collect();
                    !needle.is_empty() && words.windows(needle.len()).any(|w| w == needle.as_slice())
                })
            }
        }
    }
}
