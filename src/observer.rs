//! Observer callbacks and the test-only rule-disablement facility
//! (spec.md §6 "Observer callbacks", §9 "Rule-disablement for testing").
//!
//! Grounded on `optd-core/src/cascades/optimizer.rs`'s
//! `notify_on_matched_rule` / pattern and `disabled_rules: HashSet<usize>`
//! field on `CascadesOptimizer`.

use std::collections::HashSet;

/// A small capability object with two callbacks, forwarded to both the
/// driver's own explorer/enforcer logic and the factory so normalization
/// honors the same filter (spec.md §6).
#[derive(Default, Clone)]
pub struct RuleObserver {
    matched: Option<std::rc::Rc<dyn Fn(&str) -> bool>>,
    applied: Option<std::rc::Rc<dyn Fn(&str, &str, &str)>>,
}

impl RuleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_matched(&mut self, f: impl Fn(&str) -> bool + 'static) {
        self.matched = Some(std::rc::Rc::new(f));
    }

    pub fn on_applied(&mut self, f: impl Fn(&str, &str, &str) + 'static) {
        self.applied = Some(std::rc::Rc::new(f));
    }

    /// If no matched-rule callback is installed, all rules run (spec.md
    /// §4.1 `SearchDriver::notifyOnMatchedRule`).
    pub fn matched(&self, rule_name: &str) -> bool {
        match &self.matched {
            Some(f) => f(rule_name),
            None => true,
        }
    }

    pub fn applied(&self, rule_name: &str, source: &str, target: &str) {
        if let Some(f) = &self.applied {
            f(rule_name, source, target);
        }
    }
}

/// Rules that must never be disabled, even by `disable_optimizations`
/// (spec.md §9: "A small allow-list of essential rules... must never be
/// disabled"). Named by the rule identifiers the explorer/root-preparer
/// use, so the matched-rule predicate below can consult it.
pub const ESSENTIAL_RULES: &[&str] = &["SimplifyRootOrdering", "PruneRootCols"];

/// Compact disabled-rule bitset (spec.md §9: "Represent the disabled-rule
/// set as a compact bitset"), keyed by rule name for this crate's small,
/// fixed rule universe rather than `optd-core`'s numeric `RuleId`, since
/// there is no rule registry to assign IDs from here.
#[derive(Default, Clone)]
pub struct DisabledRules(HashSet<&'static str>);

impl DisabledRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable(&mut self, rule: &'static str) {
        if ESSENTIAL_RULES.contains(&rule) {
            return;
        }
        self.0.insert(rule);
    }

    pub fn is_disabled(&self, rule: &str) -> bool {
        self.0.contains(rule)
    }

    /// Installs the "forbid every rule" predicate on `observer`
    /// (`SearchDriver::disableOptimizations`), short of the essential
    /// allow-list.
    pub fn install_forbid_all(observer: &mut RuleObserver) {
        observer.on_matched(|rule| ESSENTIAL_RULES.contains(&rule));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_observer_allows_everything() {
        let o = RuleObserver::new();
        assert!(o.matched("AnyRule"));
    }

    #[test]
    fn forbid_all_still_allows_essential_rules() {
        let mut o = RuleObserver::new();
        DisabledRules::install_forbid_all(&mut o);
        assert!(!o.matched("PushDownFilter"));
        assert!(o.matched("PruneRootCols"));
    }

    #[test]
    fn disabled_rules_cannot_disable_essential_rules() {
        let mut d = DisabledRules::new();
        d.disable("PruneRootCols");
        assert!(!d.is_disabled("PruneRootCols"));
    }
}
