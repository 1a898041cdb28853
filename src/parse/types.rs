//! Types produced by the shell parser and consumed by the eval layer.

/// Shell operator separating consecutive compound-command segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `|`: pipe stdout
    Pipe,
    /// `&&`: run next only if previous succeeded
    And,
    /// `||`: run next only if previous failed
    Or,
    /// `;`: run next unconditionally
    Semicolon,
    /// `&`: run previous in the background, then next
    Background,
}

impl Operator {
    /// The operator's shell syntax.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Pipe => "|",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Semicolon => ";",
            Operator::Background => "&",
        }
    }
}

/// One raw subcommand of a compound command and the operator that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Trimmed subcommand text, quotes and escapes intact.
    pub raw: String,
    /// Operator after this segment; `None` for the last one.
    pub operator: Option<Operator>,
}

/// Why a subcommand could not be tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error("trailing escape character")]
    TrailingEscape,
    #[error("unparseable shell words")]
    Malformed,
}

/// A normalized subcommand, ready for rule matching.
///
/// `text` has any trailing redirection removed and, for `bash -c '<script>'`
/// invocations, holds the inner script instead of the wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandComponent {
    /// Text matched against rules. Holds the original fragment when invalid.
    pub text: String,
    /// Shell words of `text` after quote removal. Empty when invalid.
    pub words: Vec<String>,
    /// A redirection was stripped from the end of the subcommand.
    pub has_redirection: bool,
    /// `text` is the inner script of a shell `-c` invocation.
    pub via_bash: bool,
    /// Set when the fragment could not be tokenized.
    pub invalid: Option<InvalidReason>,
}

impl CommandComponent {
    pub fn is_invalid(&self) -> bool {
        self.invalid.is_some()
    }

    /// First whitespace-delimited token of `text`.
    pub fn base(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or("")
    }
}

/// A fully decomposed compound command: normalized components plus the
/// operators that joined them.
///
/// For `ls -la`, one component and no operators. For `a && b | c`, three
/// components and two operators (`&&`, `|`).
#[derive(Debug, Clone, Default)]
pub struct ParsedPipeline {
    pub components: Vec<CommandComponent>,
    pub operators: Vec<Operator>,
}
