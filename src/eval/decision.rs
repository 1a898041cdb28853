use serde::{Deserialize, Serialize};

/// The engine's authorization verdict.
///
/// Ordered from least to most restrictive, so combining votes is `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Ask,
    Deny,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Ask => "ask",
            Decision::Deny => "deny",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Ask => "ASK",
            Decision::Deny => "DENY",
        }
    }

    /// `Ask` or `Deny` for a command no rule covers.
    pub fn unspecified(ask_if_unspecified: bool) -> Self {
        if ask_if_unspecified {
            Decision::Ask
        } else {
            Decision::Deny
        }
    }
}

/// A decision together with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    pub decision: Decision,
    pub reason: String,
}

impl RuleMatch {
    pub fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_restrictive_is_max() {
        let votes = [Decision::Approve, Decision::Ask, Decision::Approve];
        assert_eq!(votes.iter().copied().max(), Some(Decision::Ask));
        let votes = [Decision::Ask, Decision::Deny, Decision::Approve];
        assert_eq!(votes.iter().copied().max(), Some(Decision::Deny));
    }

    #[test]
    fn serde_lowercase() {
        assert_eq!(serde_json::to_string(&Decision::Approve).unwrap(), "\"approve\"");
        let parsed: Decision = serde_json::from_str("\"deny\"").unwrap();
        assert_eq!(parsed, Decision::Deny);
    }

    #[test]
    fn unspecified_follows_flag() {
        assert_eq!(Decision::unspecified(true), Decision::Ask);
        assert_eq!(Decision::unspecified(false), Decision::Deny);
    }
}
