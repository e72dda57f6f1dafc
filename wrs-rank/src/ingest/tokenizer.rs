//! Message tokenizer
//!
//! Normalization keeps ASCII letters, ASCII digits and the space character,
//! dropping everything else without a replacement (`"co-op!"` becomes
//! `"coop"`), then lower-cases the result and splits on single spaces.
//!
//! Splitting on single spaces yields empty tokens wherever two spaces meet
//! or the text starts/ends with a space. Those empty tokens are dropped:
//! an empty string is never counted as a word.

/// Keep ASCII alphanumerics and spaces, lower-cased
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Tokenize `text` into normalized words, lazily
pub fn tokenize(text: &str) -> Tokens {
    Tokens {
        normalized: normalize(text),
        pos: 0,
    }
}

/// Iterator over the words of one normalized message
#[derive(Debug, Clone)]
pub struct Tokens {
    normalized: String,
    pos: usize,
}

impl Iterator for Tokens {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pos < self.normalized.len() {
            let rest = &self.normalized[self.pos..];
            let end = rest.find(' ').unwrap_or(rest.len());
            let token = &rest[..end];
            self.pos += end + 1;
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
        None
    }
}
