use super::quote::QuoteState;
use super::types::{CommandComponent, InvalidReason};

/// Shells whose `-c` / `-lc` script argument is unwrapped for matching.
const SHELL_INVOKERS: &[&str] = &["bash", "sh", "zsh", "dash", "ksh"];

/// Flags after which the next word is the script to run.
const SCRIPT_FLAGS: &[&str] = &["-c", "-lc"];

/// Normalize one raw subcommand into a [`CommandComponent`].
///
/// Strips the redirection tail, tokenizes what remains, and swaps a
/// `bash -c '<script>'` wrapper for its script. Never fails: a fragment
/// that cannot be tokenized comes back with `invalid` set and its text intact.
pub fn normalize(raw: &str) -> CommandComponent {
    let (text, has_redirection) = match strip_redirection(raw) {
        Some(head) => (head, true),
        None => (raw.trim(), false),
    };

    let words = match tokenize(text) {
        Ok(words) => words,
        Err(reason) => return invalid(text, has_redirection, false, reason),
    };

    if let Some(script) = shell_script(&words) {
        return match tokenize(script) {
            Ok(inner) => CommandComponent {
                text: script.to_string(),
                words: inner,
                has_redirection,
                via_bash: true,
                invalid: None,
            },
            Err(reason) => invalid(script, has_redirection, true, reason),
        };
    }

    CommandComponent {
        text: text.to_string(),
        words,
        has_redirection,
        via_bash: false,
        invalid: None,
    }
}

fn invalid(
    text: &str,
    has_redirection: bool,
    via_bash: bool,
    reason: InvalidReason,
) -> CommandComponent {
    CommandComponent {
        text: text.to_string(),
        words: Vec::new(),
        has_redirection,
        via_bash,
        invalid: Some(reason),
    }
}

/// Cut a subcommand at its first unquoted redirection.
///
/// Recognises `>`, `>>`, `<`, `<<`, `2>`, `2>>`, `&>` and `&>>`: the cut
/// lands on the earliest unquoted `<` or `>`, pulled back over a `2` or `&`
/// fd prefix that starts a word. Returns the trimmed head, or `None` when
/// nothing needs stripping.
pub fn strip_redirection(raw: &str) -> Option<&str> {
    let mut state = QuoteState::default();
    for (i, c) in raw.char_indices() {
        if state.is_bare() && (c == '>' || c == '<') {
            let cut = fd_prefix_start(raw, i);
            return Some(raw[..cut].trim());
        }
        state.advance(c);
    }
    None
}

fn fd_prefix_start(raw: &str, op: usize) -> usize {
    let before = &raw[..op];
    match before.strip_suffix(['2', '&']) {
        Some(rest) if rest.is_empty() || rest.ends_with(char::is_whitespace) => rest.len(),
        _ => op,
    }
}

/// Split a command into shell words using shlex (POSIX word splitting).
pub fn tokenize(command: &str) -> Result<Vec<String>, InvalidReason> {
    shlex::split(command).ok_or_else(|| failure_reason(command))
}

fn failure_reason(command: &str) -> InvalidReason {
    let mut state = QuoteState::default();
    command.chars().for_each(|c| state.advance(c));
    if state.in_quotes() {
        InvalidReason::UnterminatedQuote
    } else if state.escaped() {
        InvalidReason::TrailingEscape
    } else {
        InvalidReason::Malformed
    }
}

/// The script argument of `bash -c '<script>'` style invocations.
fn shell_script(words: &[String]) -> Option<&str> {
    let [invoker, flag, script, ..] = words else {
        return None;
    };
    let name = invoker.rsplit('/').next().unwrap_or(invoker);
    (SHELL_INVOKERS.contains(&name) && SCRIPT_FLAGS.contains(&flag.as_str()))
        .then_some(script.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_command() {
        let c = normalize("ls -la");
        assert_eq!(c.text, "ls -la");
        assert_eq!(c.words, vec!["ls", "-la"]);
        assert!(!c.has_redirection);
        assert!(!c.via_bash);
        assert!(!c.is_invalid());
    }

    #[test]
    fn single_word_is_unchanged() {
        let once = normalize("pwd");
        let twice = normalize(&once.text);
        assert_eq!(once, twice);
        assert_eq!(twice.text, "pwd");
    }

    #[test]
    fn output_redirection_stripped() {
        let c = normalize("ls -la > output.txt");
        assert_eq!(c.text, "ls -la");
        assert!(c.has_redirection);
    }

    #[test]
    fn multiple_redirections_cut_at_first() {
        let c = normalize("ls -la > out.txt 2> err.txt");
        assert_eq!(c.text, "ls -la");
        assert!(c.has_redirection);
    }

    #[test]
    fn fd_prefixed_redirections() {
        assert_eq!(normalize("make 2> err.log").text, "make");
        assert_eq!(normalize("make 2>> err.log").text, "make");
        assert_eq!(normalize("make &> all.log").text, "make");
        assert_eq!(normalize("make &>> all.log").text, "make");
        assert_eq!(normalize("ls 2>&1").text, "ls");
    }

    #[test]
    fn digit_inside_word_is_kept() {
        assert_eq!(normalize("echo a2> f").text, "echo a2");
    }

    #[test]
    fn input_redirection_and_heredoc() {
        assert_eq!(normalize("sort < data.txt").text, "sort");
        assert_eq!(normalize("cat << EOF").text, "cat");
        assert_eq!(normalize("cat < in > out").text, "cat");
    }

    #[test]
    fn quoted_redirection_kept() {
        let c = normalize(r#"echo "a > b""#);
        assert_eq!(c.text, r#"echo "a > b""#);
        assert!(!c.has_redirection);
        assert_eq!(c.words, vec!["echo", "a > b"]);
    }

    #[test]
    fn later_unquoted_redirection_found() {
        let c = normalize(r#"echo ">" > out"#);
        assert_eq!(c.text, r#"echo ">""#);
        assert!(c.has_redirection);
    }

    #[test]
    fn quoted_args_keep_raw_text() {
        let c = normalize(r#"find . -name "*.py""#);
        assert_eq!(c.text, r#"find . -name "*.py""#);
        assert_eq!(c.words, vec!["find", ".", "-name", "*.py"]);
    }

    #[test]
    fn bash_c_unwrapped() {
        let c = normalize("bash -c 'ls -la && pwd'");
        assert_eq!(c.text, "ls -la && pwd");
        assert!(c.via_bash);
        assert_eq!(c.words, vec!["ls", "-la", "&&", "pwd"]);
    }

    #[test]
    fn bash_lc_and_other_shells() {
        assert_eq!(normalize(r#"bash -lc "git status""#).text, "git status");
        assert_eq!(normalize("sh -c 'rm -rf /'").text, "rm -rf /");
        assert_eq!(normalize("/bin/bash -c 'id'").text, "id");
    }

    #[test]
    fn bash_without_script_is_plain() {
        let c = normalize("bash -c");
        assert_eq!(c.text, "bash -c");
        assert!(!c.via_bash);
        let c = normalize("bash script.sh");
        assert!(!c.via_bash);
    }

    #[test]
    fn unbalanced_quote_is_invalid() {
        let c = normalize(r#"echo "hello world"#);
        assert_eq!(c.text, r#"echo "hello world"#);
        assert_eq!(c.invalid, Some(InvalidReason::UnterminatedQuote));
        assert!(c.words.is_empty());
    }

    #[test]
    fn trailing_backslash_is_invalid() {
        let c = normalize(r"echo foo\");
        assert_eq!(c.invalid, Some(InvalidReason::TrailingEscape));
    }

    #[test]
    fn invalid_inner_script() {
        let c = normalize(r#"bash -c "echo 'oops""#);
        assert!(c.via_bash);
        assert_eq!(c.text, "echo 'oops");
        assert!(c.is_invalid());
    }

    #[test]
    fn redirection_only() {
        let c = normalize("> file");
        assert_eq!(c.text, "");
        assert!(c.words.is_empty());
        assert!(c.has_redirection);
    }

    #[test]
    fn tokenize_quoted() {
        assert_eq!(
            tokenize("echo 'hello world'").unwrap(),
            vec!["echo", "hello world"]
        );
        assert_eq!(
            tokenize(r#"echo "hello world""#).unwrap(),
            vec!["echo", "hello world"]
        );
    }
}
