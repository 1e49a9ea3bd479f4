//! Script detection used to label the translation direction

use std::fmt;

/// Thai Unicode block
const THAI_BLOCK: std::ops::RangeInclusive<char> = '\u{0E00}'..='\u{0E7F}';

/// Returns true if any character of `text` falls in the Thai block.
pub fn looks_thai(text: &str) -> bool {
    text.chars().any(|c| THAI_BLOCK.contains(&c))
}

/// Assumed translation direction, derived from the input text only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ThaiToEnglish,
    EnglishToThai,
}

impl Direction {
    /// Thai input is assumed to be translated into English, anything else into Thai.
    pub fn for_input(text: &str) -> Self {
        if looks_thai(text) {
            Direction::ThaiToEnglish
        } else {
            Direction::EnglishToThai
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Direction::ThaiToEnglish => "th→en",
            Direction::EnglishToThai => "en→th",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
