use regex::Regex;

use crate::{
    config::TextUnit,
    error::{OrchestratorError, Result},
};

const WORD_PATTERN: &str = r"[\w']+|[:.,!?;\n]";

/// Splits text into characters or into words and punctuation.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    unit: TextUnit,
    words: Regex,
}

impl Tokenizer {
    pub fn new(unit: TextUnit) -> Result<Self> {
        let words =
            Regex::new(WORD_PATTERN).map_err(|e| OrchestratorError::Configuration(e.to_string()))?;
        Ok(Self { unit, words })
    }

    pub fn unit(&self) -> TextUnit {
        self.unit
    }

    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self.unit {
            TextUnit::Char => text
                .char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect(),
            TextUnit::Word => self.words.find_iter(text).map(|m| m.as_str()).collect(),
        }
    }

    /// Joins tokens back into text.
    pub fn join<S: AsRef<str>>(&self, tokens: &[S]) -> String {
        let mut out = String::new();
        for (i, token) in tokens.iter().enumerate() {
            let token = token.as_ref();
            let punctuation = token.chars().all(|c| !c.is_alphanumeric() && c != '\'');
            if self.unit == TextUnit::Word && i > 0 && !punctuation && !out.ends_with('\n') {
                out.push(' ');
            }
            out.push_str(token);
        }
        out
    }
}
