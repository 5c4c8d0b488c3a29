//! Whitespace-token scanning for the textual index format.

use std::str::{FromStr, SplitAsciiWhitespace};

use crate::error::IndexError;

/// Version written to and accepted from index files.
pub(crate) const INDEX_FILE_VERSION: u32 = 1;

/// Cursor over the whitespace-separated tokens of an index file.
///
/// The format is token-oriented: line structure is cosmetic on write and
/// ignored on read.
pub(crate) struct Tokens<'a> {
    iter: SplitAsciiWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            iter: text.split_ascii_whitespace(),
        }
    }

    /// Return the next raw token, or a corruption error naming `what` was
    /// expected.
    pub(crate) fn next_str(&mut self, what: &str) -> Result<&'a str, IndexError> {
        self.iter.next().ok_or_else(|| IndexError::Corrupt {
            detail: format!("unexpected end of file while reading {what}"),
        })
    }

    /// Parse the next token as `T`.
    pub(crate) fn parse<T: FromStr>(&mut self, what: &str) -> Result<T, IndexError> {
        let token = self.next_str(what)?;
        token.parse().map_err(|_| IndexError::Corrupt {
            detail: format!("expected {what}, found \"{token}\""),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_across_lines_and_spaces() {
        let mut tokens = Tokens::new("1 2.5\n  three\n");
        assert_eq!(tokens.parse::<u32>("a").unwrap(), 1);
        assert_eq!(tokens.parse::<f64>("b").unwrap(), 2.5);
        assert_eq!(tokens.next_str("c").unwrap(), "three");
    }

    #[test]
    fn eof_names_the_missing_field() {
        let mut tokens = Tokens::new("");
        let err = tokens.next_str("group count").unwrap_err();
        assert!(matches!(err, IndexError::Corrupt { detail } if detail.contains("group count")));
    }

    #[test]
    fn parse_failure_names_the_token() {
        let mut tokens = Tokens::new("pelican");
        let err = tokens.parse::<usize>("member count").unwrap_err();
        assert!(matches!(err, IndexError::Corrupt { detail } if detail.contains("pelican")));
    }
}
