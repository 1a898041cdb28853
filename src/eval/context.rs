use crate::parse::CommandComponent;

/// Context for evaluating a single normalized component.
#[derive(Debug)]
pub struct CommandContext<'a> {
    /// The component being evaluated.
    pub component: &'a CommandComponent,
    /// First whitespace token of the component text (e.g. "git", "ls").
    pub base_command: &'a str,
}

impl<'a> CommandContext<'a> {
    pub fn new(component: &'a CommandComponent) -> Self {
        Self {
            component,
            base_command: component.base(),
        }
    }

    /// Component text, as matched against rules.
    pub fn text(&self) -> &str {
        &self.component.text
    }

    /// Shell words after the command name.
    pub fn args(&self) -> &[String] {
        self.component.words.get(1..).unwrap_or(&[])
    }

    /// Command name as the shell sees it (quotes removed).
    pub fn command_word(&self) -> &str {
        self.component
            .words
            .first()
            .map(String::as_str)
            .unwrap_or(self.base_command)
    }

    /// Approval-cache key: `base:joined args`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.command_word(), self.args().join(" "))
    }

    /// Rule string that matches this exact invocation and nothing wider.
    ///
    /// Arguments are re-quoted so globs and spaces read back literally.
    pub fn synthesized_rule(&self) -> String {
        let args = self.args().iter().map(String::as_str);
        let quoted = shlex::try_join(args).unwrap_or_else(|_| self.args().join(" "));
        format!("{}:={}", self.command_word(), quoted)
    }

    /// Shell words of the component joined by spaces, quotes removed.
    pub fn unquoted_text(&self) -> String {
        self.component.words.join(" ")
    }

    /// Short label for reason strings.
    pub fn label(&self) -> String {
        self.text().trim().chars().take(60).collect()
    }
}
