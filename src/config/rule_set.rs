//! Index Rule Sets
//!
//! The rules configured for one collection, in declaration order. A rule set
//! is built once by the loader and then shared read-only behind an `Arc`.

use crate::path::PathPattern;

use super::rule::IndexRule;

/// Ordered rules of one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRuleSet {
    collection: String,
    rules: Vec<IndexRule>,
}

impl IndexRuleSet {
    pub fn new(collection: &str, rules: Vec<IndexRule>) -> Self {
        IndexRuleSet {
            collection: collection.to_string(),
            rules,
        }
    }

    /// URI of the collection the rules were configured on
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn rules(&self) -> &[IndexRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Any rule producing named fields?
    pub fn has_fields(&self) -> bool {
        self.rules.iter().any(IndexRule::is_complex)
    }

    /// Complex rules whose node or one of whose fields lies at `path`, in declared order
    pub fn find_all(&self, path: &PathPattern) -> Vec<&IndexRule> {
        self.rules
            .iter()
            .filter(|rule| rule.is_complex() && rule.matches(path))
            .collect()
    }

    /// Rules (simple or complex) that create an entry for the node at `path`
    pub fn rules_for_node<'s: 'p, 'p>(
        &'s self,
        path: &'p PathPattern,
    ) -> impl Iterator<Item = (usize, &'s IndexRule)> + 'p {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.path.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::rule::{Condition, TextOptions};
    use crate::path::QName;

    fn path(spec: &str) -> PathPattern {
        PathPattern::from_str(spec, false).unwrap()
    }

    fn complex(spec: &str, field: &str) -> IndexRule {
        IndexRule::new(path(spec)).with_field(field, Some(&path(field)), TextOptions::default())
    }

    #[test]
    fn test_find_all_declared_order() {
        let set = IndexRuleSet::new(
            "/db/test",
            vec![
                complex("//entry", "name"),
                IndexRule::new(path("//entry/name")),
                complex("/root/entry", "name")
                    .with_condition(Condition::new(QName::attribute("type"), "a")),
                complex("//other", "name"),
            ],
        );

        let found = set.find_all(&path("/root/entry/name"));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].condition_count(), 0);
        assert_eq!(found[1].condition_count(), 1);
        assert!(set.has_fields());
    }

    #[test]
    fn test_rules_for_node() {
        let set = IndexRuleSet::new(
            "/db/test",
            vec![IndexRule::new(path("//title")), complex("//entry", "name")],
        );
        let at = path("/root/entry");
        let hits: Vec<usize> = set.rules_for_node(&at).map(|(i, _)| i).collect();
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn test_simple_set_has_no_fields() {
        let set = IndexRuleSet::new("/db", vec![IndexRule::new(path("//title"))]);
        assert!(!set.has_fields());
        assert!(set.find_all(&path("/a/title")).is_empty());
    }
}
