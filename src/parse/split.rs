use super::quote::QuoteState;
use super::types::{Operator, Segment};

/// Operators in the order they are tried at each unquoted position.
///
/// `|` precedes `||`, so `a || b` splits as two pipes with an empty
/// segment between them (dropped). Kept for compatibility with existing
/// rule sets; see [`SplitOptions::longest_match`].
const ORDERED_OPERATORS: [Operator; 4] = [
    Operator::Pipe,
    Operator::And,
    Operator::Or,
    Operator::Semicolon,
];

const LONGEST_FIRST_OPERATORS: [Operator; 4] = [
    Operator::Or,
    Operator::And,
    Operator::Pipe,
    Operator::Semicolon,
];

/// Knobs for compound splitting. The default reproduces the classic behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitOptions {
    /// Try `||` before `|` so it yields [`Operator::Or`].
    pub longest_match: bool,
    /// Treat an unquoted newline as `;`.
    pub newline_separates: bool,
    /// Treat a lone unquoted `&` as [`Operator::Background`]. `&&`, `&>`
    /// and the fd forms `>&`/`<&` are left alone.
    pub background_separates: bool,
}

/// Split a command at `|`, `&&`, `||` and `;`, respecting quotes and
/// backslash escapes. Segments are trimmed; empty ones are dropped.
pub fn split(command: &str) -> Vec<Segment> {
    split_with(command, SplitOptions::default())
}

/// [`split`] with explicit options.
pub fn split_with(command: &str, opts: SplitOptions) -> Vec<Segment> {
    let operators = if opts.longest_match {
        &LONGEST_FIRST_OPERATORS
    } else {
        &ORDERED_OPERATORS
    };

    let mut segments = Vec::new();
    let mut buf = String::new();
    let mut state = QuoteState::default();
    let mut i = 0;

    while i < command.len() {
        let rest = &command[i..];

        if state.is_bare() {
            let matched = operators
                .iter()
                .copied()
                .find(|op| rest.starts_with(op.as_str()))
                .map(|op| (op, op.as_str().len()))
                .or_else(|| {
                    (opts.newline_separates && rest.starts_with('\n'))
                        .then_some((Operator::Semicolon, 1))
                })
                .or_else(|| {
                    (opts.background_separates && is_background(rest, &buf))
                        .then_some((Operator::Background, 1))
                });

            if let Some((op, len)) = matched {
                flush(&mut segments, &mut buf, Some(op));
                i += len;
                continue;
            }
        }

        let Some(c) = rest.chars().next() else {
            break;
        };
        state.advance(c);
        buf.push(c);
        i += c.len_utf8();
    }

    flush(&mut segments, &mut buf, None);
    segments
}

/// A lone `&` at the start of `rest`, not part of `&&` or a redirection.
fn is_background(rest: &str, before: &str) -> bool {
    rest.starts_with('&')
        && !rest.starts_with("&&")
        && !rest.starts_with("&>")
        && !before.ends_with(['>', '<'])
}

fn flush(segments: &mut Vec<Segment>, buf: &mut String, operator: Option<Operator>) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        segments.push(Segment {
            raw: trimmed.to_string(),
            operator,
        });
    }
    buf.clear();
}

/// Extract command substitution contents from `$(...)` and backticks.
///
/// Returns the command with each substitution replaced by `__SUBST__`
/// plus the extracted inner commands. `$()` is found inside double quotes
/// too (the shell expands it there); single quotes suppress it.
pub fn extract_substitutions(command: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = command.chars().collect();
    let len = chars.len();
    let mut outer = String::new();
    let mut inners = Vec::new();
    let mut i = 0;
    let (mut sq, mut dq, mut esc) = (false, false, false);

    while i < len {
        let c = chars[i];

        if esc {
            outer.push(c);
            esc = false;
            i += 1;
            continue;
        }
        if c == '\\' && !sq {
            esc = true;
            outer.push(c);
            i += 1;
            continue;
        }
        if c == '\'' && !dq {
            sq = !sq;
            outer.push(c);
            i += 1;
            continue;
        }
        if c == '"' && !sq {
            dq = !dq;
            outer.push(c);
            i += 1;
            continue;
        }
        if sq {
            outer.push(c);
            i += 1;
            continue;
        }

        if c == '$' && i + 1 < len && chars[i + 1] == '(' {
            let (inner, next) = balanced_paren(&chars, i + 2);
            let trimmed = inner.trim();
            if !trimmed.is_empty() {
                inners.push(trimmed.to_string());
            }
            outer.push_str("__SUBST__");
            i = next;
            continue;
        }

        // Backticks do not nest
        if c == '`' {
            let mut inner = String::new();
            i += 1;
            while i < len && chars[i] != '`' {
                if chars[i] == '\\' && i + 1 < len {
                    inner.push(chars[i]);
                    inner.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                inner.push(chars[i]);
                i += 1;
            }
            if i < len {
                i += 1;
            }
            let trimmed = inner.trim();
            if !trimmed.is_empty() {
                inners.push(trimmed.to_string());
            }
            outer.push_str("__SUBST__");
            continue;
        }

        outer.push(c);
        i += 1;
    }

    (outer, inners)
}

/// Collect characters up to the `)` balancing an already-consumed `(`.
/// Returns the inner text and the index just past the closing paren.
fn balanced_paren(chars: &[char], start: usize) -> (String, usize) {
    let mut depth: u32 = 1;
    let mut inner = String::new();
    let mut state = QuoteState::default();
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if state.is_bare() {
            if c == '(' {
                depth += 1;
            } else if c == ')' {
                depth -= 1;
                if depth == 0 {
                    return (inner, i + 1);
                }
            }
        }
        state.advance(c);
        inner.push(c);
        i += 1;
    }

    (inner, i)
}
