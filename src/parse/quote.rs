//! Quote tracking shared by the splitter and the redirection stripper.

/// Running quote state of a left-to-right scan.
///
/// A backslash that is not itself escaped escapes exactly the next
/// character, inside single quotes too. A `"` toggles only outside single
/// quotes and a `'` only outside double quotes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuoteState {
    single: bool,
    double: bool,
    escaped: bool,
}

impl QuoteState {
    /// Feed one character into the scan.
    pub fn advance(&mut self, c: char) {
        if self.escaped {
            self.escaped = false;
            return;
        }
        match c {
            '\\' => self.escaped = true,
            '"' if !self.single => self.double = !self.double,
            '\'' if !self.double => self.single = !self.single,
            _ => {}
        }
    }

    /// Inside an open single- or double-quoted span.
    pub fn in_quotes(&self) -> bool {
        self.single || self.double
    }

    /// The next character is escaped.
    pub fn escaped(&self) -> bool {
        self.escaped
    }

    /// Neither quoted nor escaped: the next character is shell syntax.
    pub fn is_bare(&self) -> bool {
        !self.in_quotes() && !self.escaped
    }
}

/// Whether the character at byte offset `pos` sits inside an open quote.
///
/// Only `s[..pos]` is scanned, so asking about a quote character itself
/// reports the state before that character toggles.
pub fn is_in_quotes(s: &str, pos: usize) -> bool {
    let mut state = QuoteState::default();
    for (i, c) in s.char_indices() {
        if i >= pos {
            break;
        }
        state.advance(c);
    }
    state.in_quotes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_double_quotes() {
        assert!(is_in_quotes(r#"echo "hello world""#, 7));
        assert!(!is_in_quotes(r#"echo "hello world""#, 18));
    }

    #[test]
    fn inside_single_quotes() {
        assert!(is_in_quotes("echo 'hello world'", 7));
        assert!(!is_in_quotes("echo 'hello world'", 18));
    }

    #[test]
    fn escaped_quote_does_not_close() {
        assert!(is_in_quotes(r#"echo "hello \" world""#, 10));
        assert!(is_in_quotes(r"echo 'hello \' world'", 10));
    }

    #[test]
    fn nested_other_quote_kind() {
        assert!(is_in_quotes(r#"echo "hello 'world'""#, 10));
        assert!(is_in_quotes(r#"echo 'hello "world"'"#, 10));
    }

    #[test]
    fn mixed_spans() {
        assert!(is_in_quotes(r#"echo "hello" world"#, 7));
        assert!(!is_in_quotes(r#"echo "hello" world"#, 12));
        assert!(is_in_quotes(r#"echo "hello" 'world'"#, 16));
    }

    #[test]
    fn quote_position_reports_prior_state() {
        // index 5 is the opening quote itself
        assert!(!is_in_quotes(r#"echo "x""#, 5));
        // index 7 is the closing quote, still open before it
        assert!(is_in_quotes(r#"echo "x""#, 7));
    }

    #[test]
    fn position_past_end() {
        assert!(is_in_quotes("echo 'open", 100));
        assert!(!is_in_quotes("", 3));
    }

    #[test]
    fn double_backslash_is_inert() {
        let mut state = QuoteState::default();
        for c in r#"\\""#.chars() {
            state.advance(c);
        }
        assert!(state.in_quotes());
    }
}
