pub mod cache;
pub mod context;
pub mod decision;
pub mod rule;

pub use cache::ApprovalCache;
pub use context::CommandContext;
pub use decision::{Decision, RuleMatch};
pub use rule::{Filter, Rule};

use std::sync::Arc;

use log::{debug, info};

use crate::config::Config;
use crate::parse::{self, SplitOptions};

/// Deepest `bash -c` / substitution nesting evaluated before giving up.
const MAX_DEPTH: usize = 8;

/// Knobs that change how a command is decomposed before matching.
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    pub ask_if_unspecified: bool,
    pub split: SplitOptions,
    pub inspect_bash_scripts: bool,
    pub inspect_substitutions: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            ask_if_unspecified: true,
            split: SplitOptions::default(),
            inspect_bash_scripts: false,
            inspect_substitutions: false,
        }
    }
}

impl EvalOptions {
    pub fn from_config(config: &Config) -> Self {
        let s = &config.settings;
        Self {
            ask_if_unspecified: s.ask_if_unspecified,
            split: SplitOptions {
                longest_match: s.longest_match_operators,
                newline_separates: s.split_on_newline,
                background_separates: s.split_on_background,
            },
            inspect_bash_scripts: s.inspect_bash_scripts,
            inspect_substitutions: s.inspect_substitutions,
        }
    }
}

/// Evaluates commands against allow/deny rule sets.
///
/// The approval cache is owned by the caller's session and shared in, so
/// two evaluators built for different sessions never see each other's
/// answers.
pub struct PermissionEvaluator {
    allow_rules: Vec<Rule>,
    deny_rules: Vec<Rule>,
    options: EvalOptions,
    cache: Arc<ApprovalCache>,
}

impl PermissionEvaluator {
    pub fn new<S: AsRef<str>>(
        allow: &[S],
        deny: &[S],
        ask_if_unspecified: bool,
        cache: Arc<ApprovalCache>,
    ) -> Self {
        let options = EvalOptions {
            ask_if_unspecified,
            ..EvalOptions::default()
        };
        Self::with_options(allow, deny, options, cache)
    }

    pub fn with_options<S: AsRef<str>>(
        allow: &[S],
        deny: &[S],
        options: EvalOptions,
        cache: Arc<ApprovalCache>,
    ) -> Self {
        Self {
            allow_rules: allow.iter().map(|r| Rule::parse(r.as_ref())).collect(),
            deny_rules: deny.iter().map(|r| Rule::parse(r.as_ref())).collect(),
            options,
            cache,
        }
    }

    /// Build from a loaded configuration.
    pub fn from_config(config: &Config, cache: Arc<ApprovalCache>) -> Self {
        Self::with_options(
            &config.commands.allow,
            &config.commands.deny,
            EvalOptions::from_config(config),
            cache,
        )
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<ApprovalCache> {
        &self.cache
    }

    /// Current allow rules, including any persisted this session.
    pub fn allow_rules(&self) -> impl Iterator<Item = &str> {
        self.allow_rules.iter().map(Rule::as_str)
    }

    pub fn deny_rules(&self) -> impl Iterator<Item = &str> {
        self.deny_rules.iter().map(Rule::as_str)
    }

    /// The decision alone.
    pub fn evaluate(&self, command: &str) -> Decision {
        self.check(command).decision
    }

    /// Evaluate a full command string, with a reason for the decision.
    pub fn check(&self, command: &str) -> RuleMatch {
        let result = self.check_at_depth(command, 0);
        debug!(
            "{} {:?}: {}",
            result.decision.label(),
            command,
            result.reason.replace('\n', " ")
        );
        result
    }

    fn check_at_depth(&self, command: &str, depth: usize) -> RuleMatch {
        if depth > MAX_DEPTH {
            return RuleMatch::new(Decision::Deny, "nesting too deep to evaluate");
        }

        let (outer, substitutions) = if self.options.inspect_substitutions {
            parse::extract_substitutions(command)
        } else {
            (command.to_string(), Vec::new())
        };
        let pipeline = parse::parse(&outer, self.options.split);

        if pipeline.components.is_empty() && substitutions.is_empty() {
            return RuleMatch::new(
                Decision::unspecified(self.options.ask_if_unspecified),
                "empty command",
            );
        }

        // A fragment we cannot tokenize cannot be reasoned about.
        if let Some(component) = pipeline.components.iter().find(|c| c.is_invalid()) {
            let ctx = CommandContext::new(component);
            let why = component
                .invalid
                .map(|r| r.to_string())
                .unwrap_or_default();
            return RuleMatch::new(
                Decision::Deny,
                format!("malformed command [{}]: {why}", ctx.label()),
            );
        }

        let mut worst = Decision::Approve;
        let mut reasons = Vec::new();

        for inner in &substitutions {
            let result = self.check_at_depth(inner, depth + 1);
            let label: String = inner.trim().chars().take(60).collect();
            reasons.push(format!(
                "  subst[$({label})] -> {}: {}",
                result.decision.label(),
                result.reason
            ));
            worst = worst.max(result.decision);
        }

        let single = pipeline.components.len() == 1 && substitutions.is_empty();
        for component in &pipeline.components {
            let ctx = CommandContext::new(component);
            let result = self.check_component(&ctx, depth);
            if single {
                return result;
            }
            reasons.push(format!(
                "  [{}] -> {}: {}",
                ctx.label(),
                result.decision.label(),
                result.reason
            ));
            worst = worst.max(result.decision);
        }

        let mut desc = Vec::new();
        if !pipeline.operators.is_empty() {
            let mut unique_ops: Vec<&str> =
                pipeline.operators.iter().map(|o| o.as_str()).collect();
            unique_ops.sort();
            unique_ops.dedup();
            desc.push(unique_ops.join(", "));
        }
        if !substitutions.is_empty() {
            desc.push(format!("{} substitution(s)", substitutions.len()));
        }
        let header = if desc.is_empty() {
            "compound command".into()
        } else {
            format!("compound command ({})", desc.join("; "))
        };

        RuleMatch::new(worst, format!("{header}:\n{}", reasons.join("\n")))
    }

    /// Vote for one valid component: cache, then deny rules, then allow rules.
    fn check_component(&self, ctx: &CommandContext<'_>, depth: usize) -> RuleMatch {
        if let Some(approved) = self.cache.lookup(&ctx.cache_key()) {
            return if approved {
                RuleMatch::new(Decision::Approve, "approved earlier this session")
            } else {
                RuleMatch::new(Decision::Deny, "denied earlier this session")
            };
        }

        if ctx.component.via_bash && self.options.inspect_bash_scripts {
            let inner = self.check_at_depth(ctx.text(), depth + 1);
            return RuleMatch::new(inner.decision, format!("shell script: {}", inner.reason));
        }

        let text = ctx.text();
        let base = ctx.base_command;

        // Deny rules also see the unquoted form, so `'reboot'` and `\reboot`
        // cannot slip past a `reboot` rule.
        let unquoted = ctx.unquoted_text();
        let word = ctx.command_word();
        if let Some(rule) = self.deny_rules.iter().find(|rule| {
            (rule.base() == base && rule.matches(text))
                || (word != base && rule.base() == word && rule.matches(&unquoted))
        }) {
            return RuleMatch::new(Decision::Deny, format!("denied by rule '{}'", rule.command()));
        }

        if let Some(rule) = self
            .allow_rules
            .iter()
            .find(|rule| rule.base() == base && rule.matches(text))
        {
            return RuleMatch::new(Decision::Approve, format!("allowed by rule '{rule}'"));
        }

        let decision = Decision::unspecified(self.options.ask_if_unspecified);
        RuleMatch::new(decision, format!("no rule for '{base}'"))
    }

    /// Remember that the user approved `command`.
    ///
    /// Every valid component is cached as approved. With `persist`, a rule
    /// reproducing each component is appended to the allow list; the rules
    /// actually added are returned for the caller to write back.
    pub fn approve(&mut self, command: &str, persist: bool) -> Vec<String> {
        self.remember(command, true, persist)
    }

    /// Remember that the user denied `command`. See [`approve`](Self::approve).
    pub fn deny(&mut self, command: &str, persist: bool) -> Vec<String> {
        self.remember(command, false, persist)
    }

    fn remember(&mut self, command: &str, approved: bool, persist: bool) -> Vec<String> {
        let components = parse::components(command, self.options.split);
        let mut added = Vec::new();

        for component in components.iter().filter(|c| !c.is_invalid()) {
            let ctx = CommandContext::new(component);
            self.cache.record(ctx.cache_key(), approved);
            info!(
                "cached {} for {:?}",
                if approved { "approval" } else { "denial" },
                ctx.cache_key()
            );

            if !persist {
                continue;
            }
            let rule = ctx.synthesized_rule();
            let rules = if approved {
                &mut self.allow_rules
            } else {
                &mut self.deny_rules
            };
            if rules.iter().any(|r| r.as_str() == rule) {
                continue;
            }
            rules.push(Rule::parse(&rule));
            added.push(rule);
        }

        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(allow: &[&str], deny: &[&str]) -> PermissionEvaluator {
        PermissionEvaluator::new(allow, deny, true, Arc::new(ApprovalCache::new()))
    }

    #[test]
    fn empty_command_is_unspecified() {
        let ev = evaluator(&["ls"], &[]);
        assert_eq!(ev.evaluate(""), Decision::Ask);
        assert_eq!(ev.evaluate("   "), Decision::Ask);

        let strict =
            PermissionEvaluator::new(&["ls"], &[], false, Arc::new(ApprovalCache::new()));
        assert_eq!(strict.evaluate(""), Decision::Deny);
    }

    #[test]
    fn deny_reason_names_rule_prefix() {
        let ev = evaluator(&[], &["git push:--force"]);
        let result = ev.check("git push --force origin main");
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.contains("'git push'"), "{}", result.reason);
    }

    #[test]
    fn deny_only_checks_same_base() {
        // "rm" deny rule must not fire on a command merely mentioning rm
        let ev = evaluator(&["echo"], &["rm"]);
        assert_eq!(ev.evaluate("echo rm"), Decision::Approve);
    }

    #[test]
    fn invalid_short_circuits() {
        let ev = evaluator(&["ls", "echo"], &[]);
        let result = ev.check(r#"ls && echo "open"#);
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.contains("unterminated quote"), "{}", result.reason);
    }

    #[test]
    fn compound_reason_lists_components() {
        let ev = evaluator(&["ls"], &["rm"]);
        let result = ev.check("ls -la && rm -rf /tmp/x");
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.starts_with("compound command (&&):"));
        assert!(result.reason.contains("[ls -la] -> APPROVE"));
        assert!(result.reason.contains("[rm -rf /tmp/x] -> DENY"));
    }

    #[test]
    fn single_component_reason_is_direct() {
        let ev = evaluator(&["ls"], &[]);
        let result = ev.check("ls -la");
        assert_eq!(result.decision, Decision::Approve);
        assert_eq!(result.reason, "allowed by rule 'ls'");
    }

    #[test]
    fn cache_consulted_before_rules() {
        let mut ev = evaluator(&[], &["cat"]);
        assert_eq!(ev.evaluate("cat notes.txt"), Decision::Deny);
        ev.approve("cat notes.txt", false);
        assert_eq!(ev.evaluate("cat notes.txt"), Decision::Approve);
        assert_eq!(ev.evaluate("cat other.txt"), Decision::Deny);
    }

    #[test]
    fn deny_caches_denial() {
        let mut ev = evaluator(&["curl"], &[]);
        ev.deny("curl example.com", false);
        assert_eq!(ev.evaluate("curl example.com"), Decision::Deny);
        assert_eq!(ev.evaluate("curl other.com"), Decision::Approve);
    }

    #[test]
    fn persist_appends_rules_once() {
        let mut ev = evaluator(&[], &[]);
        let added = ev.approve("cat notes.txt && pwd", true);
        assert_eq!(added, vec!["cat:=notes.txt", "pwd:="]);
        assert!(ev.allow_rules().any(|r| r == "pwd:="));
        assert!(ev.approve("pwd", true).is_empty());

        let denied = ev.deny("rm -rf /", true);
        assert_eq!(denied, vec!["rm:=-rf /"]);
        assert!(ev.deny_rules().any(|r| r == "rm:=-rf /"));
    }

    #[test]
    fn persisted_rule_survives_new_evaluator() {
        let mut ev = evaluator(&[], &[]);
        ev.approve("cat notes.txt", true);
        ev.approve("rm -rf build", true);
        ev.approve("rm -f *.log", true);
        ev.approve("pwd", true);
        let allow: Vec<String> = ev.allow_rules().map(String::from).collect();

        let fresh = PermissionEvaluator::new(&allow, &[], true, Arc::new(ApprovalCache::new()));
        assert_eq!(fresh.evaluate("cat notes.txt"), Decision::Approve);
        assert_eq!(fresh.evaluate("rm -rf build"), Decision::Approve);
        assert_eq!(fresh.evaluate("rm -f *.log"), Decision::Approve);
        assert_eq!(fresh.evaluate("pwd"), Decision::Approve);

        // nothing wider than what was approved
        assert_eq!(fresh.evaluate("cat notes.txt.bak"), Decision::Ask);
        assert_eq!(fresh.evaluate("cat notes.txt /etc/shadow"), Decision::Ask);
        assert_eq!(fresh.evaluate("rm -rf build /"), Decision::Ask);
        assert_eq!(fresh.evaluate("rm -rf build ~"), Decision::Ask);
        assert_eq!(fresh.evaluate("rm -f / x.log"), Decision::Ask);
        assert_eq!(fresh.evaluate("pwd -P"), Decision::Ask);
    }

    #[test]
    fn quoted_command_name_still_denied() {
        let ev = evaluator(&[], &["reboot", "git push"]);
        assert_eq!(ev.evaluate("reboot"), Decision::Deny);
        assert_eq!(ev.evaluate("'reboot'"), Decision::Deny);
        assert_eq!(ev.evaluate(r"\reboot"), Decision::Deny);
        assert_eq!(ev.evaluate(r#""git" push origin"#), Decision::Deny);
        assert_eq!(ev.evaluate("'rebooted'"), Decision::Ask);
    }

    #[test]
    fn quoted_command_name_not_allowed() {
        // unquoting only widens deny, never allow
        let ev = evaluator(&["ls"], &[]);
        assert_eq!(ev.evaluate("'ls'"), Decision::Ask);
    }

    #[test]
    fn invalid_components_not_cached() {
        let mut ev = evaluator(&[], &[]);
        let added = ev.approve(r#"echo "open"#, true);
        assert!(added.is_empty());
        assert!(ev.cache().is_empty());
    }

    #[test]
    fn bash_script_opaque_by_default() {
        let ev = evaluator(&["ls"], &["rm"]);
        // only the script's first word is matched
        assert_eq!(ev.evaluate(r#"bash -c "ls && rm -rf /""#), Decision::Approve);
    }

    #[test]
    fn bash_script_inspected_when_enabled() {
        let options = EvalOptions {
            inspect_bash_scripts: true,
            ..EvalOptions::default()
        };
        let ev = PermissionEvaluator::with_options(
            &["ls"],
            &["rm"],
            options,
            Arc::new(ApprovalCache::new()),
        );
        let result = ev.check(r#"bash -c "ls && rm -rf /""#);
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.starts_with("shell script:"));
    }

    #[test]
    fn nested_bash_scripts_hit_depth_limit() {
        let options = EvalOptions {
            inspect_bash_scripts: true,
            ..EvalOptions::default()
        };
        let ev = PermissionEvaluator::with_options(
            &["ls"],
            &[],
            options,
            Arc::new(ApprovalCache::new()),
        );
        let mut cmd = String::from("ls");
        for _ in 0..10 {
            cmd = format!("bash -c {}", shlex::try_quote(&cmd).unwrap());
        }
        assert_eq!(ev.evaluate(&cmd), Decision::Deny);
    }

    #[test]
    fn substitutions_ignored_by_default() {
        let ev = evaluator(&["echo"], &["rm"]);
        assert_eq!(ev.evaluate("echo $(rm -rf /)"), Decision::Approve);
    }

    #[test]
    fn substitutions_inspected_when_enabled() {
        let options = EvalOptions {
            inspect_substitutions: true,
            ..EvalOptions::default()
        };
        let ev = PermissionEvaluator::with_options(
            &["echo"],
            &["rm"],
            options,
            Arc::new(ApprovalCache::new()),
        );
        let result = ev.check("echo $(rm -rf /)");
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.contains("1 substitution(s)"), "{}", result.reason);
    }

    #[test]
    fn background_operator_splits_when_enabled() {
        let ev = evaluator(&["ls"], &["reboot"]);
        // one component named `ls` by default
        assert_eq!(ev.evaluate("ls & reboot"), Decision::Approve);

        let options = EvalOptions {
            split: SplitOptions {
                background_separates: true,
                ..SplitOptions::default()
            },
            ..EvalOptions::default()
        };
        let ev = PermissionEvaluator::with_options(
            &["ls"],
            &["reboot"],
            options,
            Arc::new(ApprovalCache::new()),
        );
        let result = ev.check("ls & reboot");
        assert_eq!(result.decision, Decision::Deny);
        assert!(result.reason.starts_with("compound command (&):"), "{}", result.reason);
        assert_eq!(ev.evaluate("ls 2>&1"), Decision::Approve);
    }

    #[test]
    fn or_operator_quirk_is_default() {
        let ev = evaluator(&["ls", "echo"], &[]);
        let result = ev.check("ls || echo fallback");
        assert_eq!(result.decision, Decision::Approve);
        assert!(result.reason.starts_with("compound command (|):"), "{}", result.reason);

        let options = EvalOptions {
            split: SplitOptions {
                longest_match: true,
                ..SplitOptions::default()
            },
            ..EvalOptions::default()
        };
        let ev = PermissionEvaluator::with_options(
            &["ls", "echo"],
            &[],
            options,
            Arc::new(ApprovalCache::new()),
        );
        let result = ev.check("ls || echo fallback");
        assert!(result.reason.starts_with("compound command (||):"), "{}", result.reason);
    }

    #[test]
    fn evaluators_with_separate_caches_are_isolated() {
        let mut a = evaluator(&[], &[]);
        let b = evaluator(&[], &[]);
        a.approve("make build", false);
        assert_eq!(a.evaluate("make build"), Decision::Approve);
        assert_eq!(b.evaluate("make build"), Decision::Ask);
    }

    #[test]
    fn from_config_uses_default_rules() {
        let config = Config::default_config();
        let ev = PermissionEvaluator::from_config(&config, Arc::new(ApprovalCache::new()));
        assert_eq!(ev.evaluate("ls -la"), Decision::Approve);
        assert_eq!(ev.evaluate("shutdown -h now"), Decision::Deny);
        assert_eq!(ev.evaluate("some-unknown-tool"), Decision::Ask);
    }
}
