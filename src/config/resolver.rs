//! Rule Resolution
//!
//! Picks the rule that applies to a predicate's absolute path. Candidates
//! from every rule set are ranked by condition count (more conditions is
//! more specific) and a conditional rule only wins when each of its
//! conditions is claimed by a different preceding predicate.

use std::sync::Arc;

use tracing::trace;

use super::registry::is_system_collection;
use super::rule::{Condition, IndexRule};
use super::rule_set::IndexRuleSet;
use crate::path::PathPattern;

/// Something on the query side that may imply a rule condition
pub trait ConditionProbe {
    fn satisfies(&self, condition: &Condition) -> bool;
}

/// The winning rule and the preceding predicates it consumed
#[derive(Debug)]
pub struct Resolution<'r> {
    pub rule: &'r IndexRule,
    /// Indices (as passed in `preceding`) now owned by this rule
    pub consumed: Vec<usize>,
}

/// Resolves rules across the rule sets of the statically known collections
pub struct RuleResolver<'r> {
    rule_sets: Vec<&'r IndexRuleSet>,
}

impl<'r> RuleResolver<'r> {
    /// Rule sets of system collections are ignored
    pub fn new(rule_sets: &'r [Arc<IndexRuleSet>]) -> Self {
        RuleResolver {
            rule_sets: rule_sets
                .iter()
                .map(Arc::as_ref)
                .filter(|set| !is_system_collection(set.collection()))
                .collect(),
        }
    }

    /// Every matching complex rule, most conditions first; ties keep set order,
    /// then declaration order
    pub fn candidates(&self, path: &PathPattern) -> Vec<&'r IndexRule> {
        let mut found: Vec<&'r IndexRule> = self
            .rule_sets
            .iter()
            .flat_map(|set| set.find_all(path))
            .collect();
        found.sort_by(|a, b| b.condition_count().cmp(&a.condition_count()));
        found
    }

    /// Resolve `path` given the predicates offered as condition matches
    ///
    /// `preceding` pairs an owner-chosen index with each offered predicate;
    /// the indices of the consumed ones come back in `Resolution::consumed`.
    pub fn resolve<P: ConditionProbe>(
        &self,
        path: &PathPattern,
        preceding: &[(usize, &P)],
    ) -> Option<Resolution<'r>> {
        let candidates = self.candidates(path);

        for rule in candidates.iter().copied().filter(|r| r.condition_count() > 0) {
            if let Some(consumed) = assign_conditions(&rule.conditions, preceding) {
                trace!(rule = %rule.path, consumed = consumed.len(), "conditional rule matched");
                return Some(Resolution { rule, consumed });
            }
        }

        candidates
            .into_iter()
            .find(|r| r.condition_count() == 0)
            .map(|rule| Resolution {
                rule,
                consumed: Vec::new(),
            })
    }
}

/// Match each condition to a distinct predicate (augmenting paths)
fn assign_conditions<P: ConditionProbe>(conditions: &[Condition], preceding: &[(usize, &P)]) -> Option<Vec<usize>> {
    if conditions.len() > preceding.len() {
        return None;
    }

    let edges: Vec<Vec<usize>> = conditions
        .iter()
        .map(|cond| {
            preceding
                .iter()
                .enumerate()
                .filter(|(_, (_, pred))| pred.satisfies(cond))
                .map(|(slot, _)| slot)
                .collect()
        })
        .collect();

    // owner[slot] = condition currently holding that predicate
    let mut owner: Vec<Option<usize>> = vec![None; preceding.len()];
    for cond in 0..conditions.len() {
        let mut visited = vec![false; preceding.len()];
        if !augment(cond, &edges, &mut owner, &mut visited) {
            return None;
        }
    }

    let mut consumed: Vec<usize> = owner
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_some())
        .map(|(slot, _)| preceding[slot].0)
        .collect();
    consumed.sort_unstable();
    Some(consumed)
}

fn augment(cond: usize, edges: &[Vec<usize>], owner: &mut [Option<usize>], visited: &mut [bool]) -> bool {
    for &slot in &edges[cond] {
        if visited[slot] {
            continue;
        }
        visited[slot] = true;
        let free = match owner[slot] {
            None => true,
            Some(other) => augment(other, edges, owner, visited),
        };
        if free {
            owner[slot] = Some(cond);
            return true;
        }
    }
    false
}
