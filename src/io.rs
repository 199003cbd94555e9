//! Whitespace-delimited token reading shared by the graph, instance and
//! solution stream parsers.

use anyhow::{anyhow, Context, Result};
use std::iter::Peekable;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

/// Sequential reader over the whitespace-separated tokens of a text stream.
pub(crate) struct TokenReader<'a> {
    tokens: Peekable<SplitWhitespace<'a>>,
    position: usize,
}

impl<'a> TokenReader<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        TokenReader {
            tokens: input.split_whitespace().peekable(),
            position: 0,
        }
    }

    /// Next raw token; `what` names the expected field in the error message.
    pub(crate) fn next_token(&mut self, what: &str) -> Result<&'a str> {
        let token = self.tokens.next()
            .ok_or_else(|| anyhow!("unexpected end of input while reading {} (token #{})", what, self.position + 1))?;
        self.position += 1;
        Ok(token)
    }

    /// Parse the next token as `T`.
    pub(crate) fn parse<T>(&mut self, what: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let position = self.position + 1;
        let token = self.next_token(what)?;
        token.parse::<T>()
            .with_context(|| format!("invalid {} '{}' (token #{})", what, token, position))
    }

    /// Whether every token has been consumed.
    pub(crate) fn is_exhausted(&mut self) -> bool {
        self.tokens.peek().is_none()
    }
}

/// Read a whole file, attaching the path to any error.
pub(crate) fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .with_context(|| format!("cannot open file {}", path.display()))
}

/// Write a whole file, attaching the path to any error.
pub(crate) fn write_file<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, contents)
        .with_context(|| format!("cannot write file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_reader() {
        let mut reader = TokenReader::new("3 4\n 1.5\tfoo");
        assert_eq!(reader.parse::<usize>("count").unwrap(), 3);
        assert_eq!(reader.parse::<i32>("value").unwrap(), 4);
        assert!((reader.parse::<f64>("weight").unwrap() - 1.5).abs() < 1e-12);
        assert!(reader.parse::<f64>("weight").is_err());
        assert!(reader.is_exhausted());
        assert!(reader.next_token("anything").is_err());
    }
}
