//! Rule registry
//!
//! Compiled rules indexed by their conclusion operator so the proof engine
//! only unifies against plausibly relevant rules. Negated conclusions
//! (`THEN (Not (...))`) are indexed separately under the inner operator.
//! The registry is append-only with truncate-based rollback, like every
//! other session-owned collection.

use crate::dsl::{ConditionNode, Pattern, RuleDecl};
use rustc_hash::FxHashMap;

/// Rule id: index into the registration order
pub type RuleId = usize;

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub label: String,
    pub condition: ConditionNode,
    pub conclusion: ConditionNode,
    /// Constructivist level of the conclusion (one above the highest premise)
    pub conc_level: u32,
    /// Highest premise level; used by rule-index pruning
    pub max_prem_level: u32,
}

/// Conclusion leaves of a rule, each tagged with whether it sits under a
/// negation
fn conclusion_leaves(node: &ConditionNode, negated: bool, out: &mut Vec<(bool, Pattern)>) {
    match node {
        ConditionNode::Leaf(p) => out.push((negated, p.clone())),
        ConditionNode::And(parts) | ConditionNode::Or(parts) => {
            for part in parts {
                conclusion_leaves(part, negated, out);
            }
        }
        ConditionNode::Not(inner) => conclusion_leaves(inner, !negated, out),
    }
}

impl Rule {
    /// All conclusion leaves with their polarity
    pub fn conclusions(&self) -> Vec<(bool, Pattern)> {
        let mut out = Vec::new();
        conclusion_leaves(&self.conclusion, false, &mut out);
        out
    }
}

/// Append-only rule store with conclusion-operator indices
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    by_conclusion: FxHashMap<String, Vec<RuleId>>,
    by_negated_conclusion: FxHashMap<String, Vec<RuleId>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// Compile and register a parsed rule declaration
    pub fn register(&mut self, decl: &RuleDecl) -> RuleId {
        let id = self.rules.len();
        let max_prem_level = 0;
        let rule = Rule {
            id,
            label: decl.name.clone(),
            condition: decl.condition.clone(),
            conclusion: decl.conclusion.clone(),
            conc_level: max_prem_level + 1,
            max_prem_level,
        };
        for (negated, leaf) in rule.conclusions() {
            let index = if negated {
                &mut self.by_negated_conclusion
            } else {
                &mut self.by_conclusion
            };
            index.entry(leaf.operator.clone()).or_default().push(id);
        }
        self.rules.push(rule);
        id
    }

    /// Rules with a positive conclusion leaf on `op`
    pub fn by_conclusion_op(&self, op: &str) -> Vec<&Rule> {
        self.resolve(self.by_conclusion.get(op))
    }

    /// Rules concluding `Not (op ...)` directly or inside And/Or
    pub fn by_negated_conclusion_op(&self, op: &str) -> Vec<&Rule> {
        self.resolve(self.by_negated_conclusion.get(op))
    }

    fn resolve(&self, ids: Option<&Vec<RuleId>>) -> Vec<&Rule> {
        ids.map(|ids| ids.iter().filter_map(|id| self.rules.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Rollback support: drop rules registered after `len` and rebuild the
    /// conclusion indices from the survivors
    pub fn truncate(&mut self, len: usize) {
        if self.rules.len() <= len {
            return;
        }
        self.rules.truncate(len);
        self.by_conclusion.clear();
        self.by_negated_conclusion.clear();
        let rules = std::mem::take(&mut self.rules);
        for rule in &rules {
            for (negated, leaf) in rule.conclusions() {
                let index = if negated {
                    &mut self.by_negated_conclusion
                } else {
                    &mut self.by_conclusion
                };
                index.entry(leaf.operator.clone()).or_default().push(rule.id);
            }
        }
        self.rules = rules;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::{parse_program, Item};

    fn rule_decl(source: &str) -> RuleDecl {
        let program = parse_program(source).unwrap();
        let Item::Rule(rule) = program.items.into_iter().next().unwrap() else {
            panic!("expected rule");
        };
        rule
    }

    #[test]
    fn test_register_indexes_conclusion() {
        let mut rules = RuleSet::new();
        rules.register(&rule_decl(
            "rule flight: IF ($x IS_A bird) THEN ($x CAN fly)",
        ));
        assert_eq!(rules.by_conclusion_op("CAN").len(), 1);
        assert!(rules.by_conclusion_op("IS_A").is_empty());
        assert!(rules.by_negated_conclusion_op("CAN").is_empty());
    }

    #[test]
    fn test_negated_conclusion_indexed_separately() {
        let mut rules = RuleSet::new();
        rules.register(&rule_decl(
            "rule grounded: IF ($x IS_A penguin) THEN (Not ($x CAN fly))",
        ));
        assert!(rules.by_conclusion_op("CAN").is_empty());
        assert_eq!(rules.by_negated_conclusion_op("CAN").len(), 1);
    }

    #[test]
    fn test_truncate_rebuilds_index() {
        let mut rules = RuleSet::new();
        rules.register(&rule_decl("rule a: IF ($x IS_A bird) THEN ($x CAN fly)"));
        rules.register(&rule_decl("rule b: IF ($x IS_A fish) THEN ($x CAN swim)"));
        rules.truncate(1);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.by_conclusion_op("CAN").len(), 1);
        assert_eq!(rules.by_conclusion_op("CAN")[0].label, "a");
    }
}
