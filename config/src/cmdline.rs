use crate::error::ConfigError;

/// Kernel command line: whitespace-separated `key=value` options
///
/// Options without `=` are flags with an empty value. Values may be wrapped in
/// double quotes to carry whitespace. The line is validated once by
/// [`KernelCommandLine::parse`]; lookups then walk the borrowed text without
/// allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelCommandLine<'a> {
    raw: &'a str,
}

impl<'a> KernelCommandLine<'a> {
    /// Validate a command line
    pub fn parse(raw: &'a str) -> Result<Self, ConfigError> {
        let mut parser = Parser::new(raw);
        while parser.next_option()?.is_some() {}
        Ok(Self { raw })
    }

    /// Value of the last occurrence of `key`
    pub fn lookup(&self, key: &str) -> Option<&'a str> {
        self.options()
            .filter(|(k, _)| *k == key)
            .last()
            .map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options().any(|(k, _)| k == key)
    }

    /// All options in command-line order
    pub fn options(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let mut parser = Parser::new(self.raw);
        // parse() already rejected malformed lines
        core::iter::from_fn(move || parser.next_option().ok().flatten())
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }
}

impl Default for KernelCommandLine<'_> {
    fn default() -> Self {
        Self { raw: "" }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn next_option(&mut self) -> Result<Option<(&'a str, &'a str)>, ConfigError> {
        self.skip_whitespace();
        if self.is_eof() {
            return Ok(None);
        }

        let start = self.pos;
        let key = self.take_while(|ch| ch != '=' && !ch.is_whitespace());

        if self.peek() != Some('=') {
            return Ok(Some((key, "")));
        }
        self.advance();

        if key.is_empty() {
            self.take_while(|ch| !ch.is_whitespace());
            return Err(ConfigError::malformed_option(&self.input[start..self.pos]));
        }

        let value = if self.peek() == Some('"') {
            self.advance();
            let value = self.take_while(|ch| ch != '"');
            if self.peek() != Some('"') {
                return Err(ConfigError::unterminated_quote(&self.input[start..]));
            }
            self.advance();
            value
        } else {
            self.take_while(|ch| !ch.is_whitespace())
        };

        Ok(Some((key, value)))
    }

    fn take_while(&mut self, mut accept: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !accept(ch) {
                break;
            }
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_values_and_flags() {
        let cmdline = KernelCommandLine::parse("  time=legacy quiet hpet=nonperiodic ").unwrap();
        assert_eq!(cmdline.lookup("time"), Some("legacy"));
        assert_eq!(cmdline.lookup("hpet"), Some("nonperiodic"));
        assert_eq!(cmdline.lookup("quiet"), Some(""));
        assert_eq!(cmdline.lookup("missing"), None);
        assert!(cmdline.contains("quiet"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let cmdline = KernelCommandLine::parse("time=legacy time=modern").unwrap();
        assert_eq!(cmdline.lookup("time"), Some("modern"));
    }

    #[test]
    fn test_quoted_value() {
        let cmdline = KernelCommandLine::parse(r#"init="/bin/sh -l" time=legacy"#).unwrap();
        assert_eq!(cmdline.lookup("init"), Some("/bin/sh -l"));
        assert_eq!(cmdline.lookup("time"), Some("legacy"));
    }

    #[test]
    fn test_empty_value() {
        let cmdline = KernelCommandLine::parse("root= time=legacy").unwrap();
        assert_eq!(cmdline.lookup("root"), Some(""));
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = KernelCommandLine::parse("quiet =legacy").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedOption { .. }));
    }

    #[test]
    fn test_unterminated_quote_rejected() {
        let err = KernelCommandLine::parse(r#"init="/bin/sh"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnterminatedQuote { .. }));
    }

    #[test]
    fn test_options_in_order() {
        let cmdline = KernelCommandLine::parse("a=1 b c=3").unwrap();
        let options: Vec<_> = cmdline.options().collect();
        assert_eq!(options, vec![("a", "1"), ("b", ""), ("c", "3")]);
    }
}
