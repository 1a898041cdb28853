pub mod normalize;
pub mod quote;
pub mod split;
pub mod types;

pub use normalize::{normalize, strip_redirection, tokenize};
pub use quote::{QuoteState, is_in_quotes};
pub use split::{SplitOptions, extract_substitutions, split, split_with};
pub use types::{CommandComponent, InvalidReason, Operator, ParsedPipeline, Segment};

/// Split a command and normalize every segment.
///
/// Components left empty after normalization (a bare redirection, say)
/// are dropped; invalid ones are always kept.
pub fn parse(command: &str, opts: SplitOptions) -> ParsedPipeline {
    let segments = split_with(command, opts);
    let operators = segments.iter().filter_map(|s| s.operator).collect();
    let components = segments
        .iter()
        .map(|segment| normalize(&segment.raw))
        .filter(|c| c.is_invalid() || !c.text.trim().is_empty())
        .collect();
    ParsedPipeline {
        components,
        operators,
    }
}

/// The normalized components of a command, in order.
pub fn components(command: &str, opts: SplitOptions) -> Vec<CommandComponent> {
    parse(command, opts).components
}
