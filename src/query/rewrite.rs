//! Predicate Rewriting
//!
//! Turns the predicates of a location step into one `range:field` lookup
//! when an index rule provably covers them. Predicates that cannot be
//! served stay behind as a residual filter around the lookup; nothing is
//! ever dropped unless a rule condition consumed it.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::{CollectionRegistry, IndexRuleSet, Operator, RuleResolver};
use crate::path::PathPattern;

use super::analyze::{self, PredicateShape, StaticContext};
use super::ast::{Expr, FieldLookup, Predicate, Step};

/// What became of one predicate
#[derive(Debug)]
enum Disposition<'e> {
    /// Stays in the residual filter
    Residual,
    /// Served by the lookup through the named field
    Candidate {
        field: String,
        operator: Operator,
        key: &'e Expr,
    },
    /// Implied by a condition of the winning rule
    Consumed,
}

/// Rewrites the predicates of single location steps
pub struct PredicateRewriter<'r> {
    resolver: RuleResolver<'r>,
    ctx: &'r StaticContext,
}

impl<'r> PredicateRewriter<'r> {
    pub fn new(rule_sets: &'r [Arc<IndexRuleSet>], ctx: &'r StaticContext) -> Self {
        PredicateRewriter {
            resolver: RuleResolver::new(rule_sets),
            ctx,
        }
    }

    /// Rewrite `step` given the absolute path it selects
    ///
    /// Returns the step unchanged when the path is unknown or no predicate
    /// can be served by an index field.
    pub fn rewrite(&self, step: &Step, context_path: Option<&PathPattern>) -> Expr {
        self.try_rewrite(step, context_path)
            .unwrap_or_else(|| Expr::Step(Box::new(step.clone())))
    }

    /// Like [`rewrite`](Self::rewrite), but `None` when nothing changed
    pub fn try_rewrite(&self, step: &Step, context_path: Option<&PathPattern>) -> Option<Expr> {
        let context_path = context_path?;
        if step.predicates.is_empty() {
            return None;
        }

        let shapes: Vec<Option<PredicateShape<'_>>> = step
            .predicates
            .iter()
            .map(|p| PredicateShape::analyze(p, self.ctx))
            .collect();
        let mut dispositions: Vec<Disposition<'_>> = Vec::with_capacity(shapes.len());

        for (index, shape) in shapes.iter().enumerate() {
            let disposition = match shape {
                Some(shape) => self.examine(index, shape, &shapes, &mut dispositions, context_path),
                None => Disposition::Residual,
            };
            trace!(index, ?disposition, "predicate examined");
            dispositions.push(disposition);
        }

        let mut fields = Vec::new();
        let mut operators = Vec::new();
        let mut keys = Vec::new();
        let mut residual: Vec<Predicate> = Vec::new();
        for (disposition, predicate) in dispositions.into_iter().zip(&step.predicates) {
            match disposition {
                Disposition::Candidate { field, operator, key } => {
                    fields.push(field);
                    operators.push(operator);
                    // the fallback step keeps the original predicates
                    keys.push(key.clone());
                }
                Disposition::Residual => residual.push(predicate.clone()),
                Disposition::Consumed => {}
            }
        }

        if fields.is_empty() {
            return None;
        }
        if residual.iter().any(analyze::may_depend_on_position) {
            trace!(step = %step, "positional residual predicate, step left unchanged");
            return None;
        }

        let lookup = match FieldLookup::new(fields, operators, keys, step.clone()) {
            Ok(lookup) => Expr::FieldLookup(Box::new(lookup)),
            Err(err) => {
                warn!(step = %step, error = %err, "could not build field lookup");
                return None;
            }
        };

        debug!(step = %step, path = %context_path, residual = residual.len(), "predicates rewritten to field lookup");
        if residual.is_empty() {
            Some(lookup)
        } else {
            Some(Expr::Filter(Box::new(lookup), residual))
        }
    }

    /// Decide one predicate; may consume earlier ones
    fn examine<'e>(
        &self,
        index: usize,
        shape: &PredicateShape<'e>,
        shapes: &[Option<PredicateShape<'e>>],
        earlier: &mut [Disposition<'e>],
        context_path: &PathPattern,
    ) -> Disposition<'e> {
        let candidate_path = context_path.joined(&shape.inner);
        if candidate_path.is_empty() {
            return Disposition::Residual;
        }

        let offered: Vec<(usize, &PredicateShape<'e>)> = shapes[..index]
            .iter()
            .enumerate()
            .filter(|(i, _)| !matches!(earlier[*i], Disposition::Consumed))
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
            .collect();

        let Some(resolution) = self.resolver.resolve(&candidate_path, &offered) else {
            return Disposition::Residual;
        };
        if !resolution.rule.path.matches(context_path) {
            trace!(rule = %resolution.rule.path, path = %context_path, "rule does not cover the step");
            return Disposition::Residual;
        }
        let Some(field) = resolution.rule.field_for(&candidate_path) else {
            return Disposition::Residual;
        };

        for consumed in resolution.consumed {
            earlier[consumed] = Disposition::Consumed;
        }
        Disposition::Candidate {
            field: field.name.clone(),
            operator: shape.comparable.operator(),
            key: shape.comparable.key(),
        }
    }
}

/// Applies the predicate rewriter to every location step of a query
pub struct QueryOptimizer<'a> {
    registry: &'a CollectionRegistry,
    ctx: StaticContext,
}

impl<'a> QueryOptimizer<'a> {
    pub fn new(registry: &'a CollectionRegistry, ctx: StaticContext) -> Self {
        QueryOptimizer { registry, ctx }
    }

    pub fn context(&self) -> &StaticContext {
        &self.ctx
    }

    /// Return an optimized copy of `expr`
    ///
    /// Each step uses the rules of the collections its own path is rooted
    /// at; a path rooted at `/` uses the default collections.
    pub fn optimize(&self, expr: &Expr) -> Expr {
        if self.registry.is_empty() {
            return expr.clone();
        }
        self.walk(expr)
    }

    fn walk(&self, expr: &Expr) -> Expr {
        let boxed = |e: &Box<Expr>| Box::new(self.walk(e));
        match expr {
            Expr::Path(left, right) => {
                let right = match right.as_ref() {
                    Expr::Step(step) if !step.predicates.is_empty() => self.rewrite_step(expr, &self.walk_step(step)),
                    other => self.walk(other),
                };
                Expr::Path(boxed(left), Box::new(right))
            }
            Expr::Step(step) => Expr::Step(Box::new(self.walk_step(step))),
            Expr::Filter(inner, preds) => Expr::Filter(boxed(inner), self.walk_predicates(preds)),
            Expr::Binary(left, op, right) => Expr::Binary(boxed(left), *op, boxed(right)),
            Expr::Union(left, right) => Expr::Union(boxed(left), boxed(right)),
            Expr::Negate(inner) => Expr::Negate(boxed(inner)),
            Expr::Function(name, args) => Expr::Function(name.clone(), args.iter().map(|a| self.walk(a)).collect()),
            Expr::Sequence(items) => Expr::Sequence(items.iter().map(|i| self.walk(i)).collect()),
            other => other.clone(),
        }
    }

    /// Rewrite the last step of `path` (already walked as `step`)
    fn rewrite_step(&self, path: &Expr, step: &Step) -> Expr {
        let unchanged = || Expr::Step(Box::new(step.clone()));
        let Some(context) = analyze::context_path(path, &self.ctx.namespaces) else {
            return unchanged();
        };
        let collections = analyze::path_root(path)
            .map(|root| analyze::root_collections(root, &self.ctx))
            .unwrap_or_default();
        let rule_sets = self.registry.rule_sets_for(collections.iter().map(String::as_str));
        if rule_sets.is_empty() {
            trace!(path = %context, "no index configuration for step collections");
            return unchanged();
        }
        PredicateRewriter::new(&rule_sets, &self.ctx).rewrite(step, Some(&context))
    }

    fn walk_step(&self, step: &Step) -> Step {
        Step {
            axis: step.axis,
            node_test: step.node_test.clone(),
            predicates: self.walk_predicates(&step.predicates),
        }
    }

    fn walk_predicates(&self, preds: &[Predicate]) -> Vec<Predicate> {
        preds
            .iter()
            .map(|p| Predicate {
                exprs: p.exprs.iter().map(|e| self.walk(e)).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_rule_set, Condition, IndexRule, TextOptions};
    use crate::path::{NamespaceContext, QName};
    use crate::query::parser::parse;

    fn path(spec: &str) -> PathPattern {
        PathPattern::from_str(spec, false).unwrap()
    }

    fn entry_rule(conditions: &[(&str, &str)]) -> IndexRule {
        let mut rule = IndexRule::new(path("//entry"))
            .with_field("name", Some(&path("name")), TextOptions::default())
            .with_field("kind", Some(&path("@kind")), TextOptions::default());
        for (attr, value) in conditions {
            rule = rule.with_condition(Condition::new(QName::attribute(attr), value));
        }
        rule
    }

    fn rewrite(rules: Vec<IndexRule>, query: &str) -> String {
        let sets = vec![Arc::new(IndexRuleSet::new("/db/test", rules))];
        let ctx = StaticContext::default();
        let rewriter = PredicateRewriter::new(&sets, &ctx);
        let expr = parse(query).unwrap();
        let Expr::Path(_, right) = &expr else {
            panic!("expected path");
        };
        let Expr::Step(step) = right.as_ref() else {
            panic!("expected step");
        };
        let context = analyze::context_path(&expr, &ctx.namespaces);
        rewriter.rewrite(step, context.as_ref()).to_string()
    }

    #[test]
    fn test_single_candidate_bare_lookup() {
        assert_eq!(
            rewrite(vec![entry_rule(&[])], "//entry[name = 'x']"),
            "range:field((\"name\"), (\"eq\"), \"x\")"
        );
    }

    #[test]
    fn test_two_candidates_merge() {
        assert_eq!(
            rewrite(vec![entry_rule(&[])], "//entry[name = 'x'][starts-with(@kind, $k)]"),
            "range:field((\"name\", \"kind\"), (\"eq\", \"starts-with\"), \"x\", $k)"
        );
    }

    #[test]
    fn test_unoptimizable_stay_residual() {
        assert_eq!(
            rewrite(vec![entry_rule(&[])], "//entry[name = 'x'][other = 'y'][count(*) > 2]"),
            "range:field((\"name\"), (\"eq\"), \"x\")[other = \"y\"][count(*) > 2]"
        );
    }

    #[test]
    fn test_positional_predicate_keeps_step() {
        let rules = || vec![entry_rule(&[])];
        assert_eq!(rewrite(rules(), "//entry[1][name = 'x']"), "entry[1][name = \"x\"]");
        assert_eq!(rewrite(rules(), "//entry[name = 'x'][last()]"), "entry[name = \"x\"][last()]");
        assert_eq!(
            rewrite(rules(), "//entry[name = 'x'][position() < 3]"),
            "entry[name = \"x\"][position() < 3]"
        );
        assert_eq!(rewrite(rules(), "//entry[name = 'x'][$n]"), "entry[name = \"x\"][$n]");
    }

    #[test]
    fn test_lookup_construction_error_keeps_step() {
        let rule = IndexRule::new(path("//entry")).with_field("", Some(&path("name")), TextOptions::default());
        assert_eq!(rewrite(vec![rule], "//entry[name = 'x']"), "entry[name = \"x\"]");
    }

    #[test]
    fn test_specific_rule_consumes_conditions() {
        let rules = vec![entry_rule(&[]), entry_rule(&[("type", "main"), ("lang", "en")])];
        assert_eq!(
            rewrite(rules, "//entry[@type = 'main'][@x = 'y'][@lang = 'en'][name = 'n']"),
            "range:field((\"name\"), (\"eq\"), \"n\")[@x = \"y\"]"
        );
    }

    #[test]
    fn test_conditions_unmet_fall_back() {
        let rules = vec![entry_rule(&[("type", "main")]), entry_rule(&[])];
        assert_eq!(
            rewrite(rules, "//entry[@type = 'other'][name = 'n']"),
            "range:field((\"name\"), (\"eq\"), \"n\")[@type = \"other\"]"
        );
    }

    #[test]
    fn test_consumed_candidate_withdrawn() {
        let rules = vec![
            IndexRule::new(path("//entry")).with_field("type", Some(&path("@type")), TextOptions::default()),
            entry_rule(&[("type", "main")]),
        ];
        assert_eq!(
            rewrite(rules, "//entry[@type = 'main'][name = 'n']"),
            "range:field((\"name\"), (\"eq\"), \"n\")"
        );
    }

    #[test]
    fn test_unchanged_cases() {
        let rules = || vec![entry_rule(&[])];
        // no rule for the path
        assert_eq!(rewrite(rules(), "//item[name = 'x']"), "item[name = \"x\"]");
        // rule path does not cover the step
        assert_eq!(rewrite(rules(), "//entry/name[. = 'x']"), "name[. = \"x\"]");
        // key depends on the context item
        assert_eq!(rewrite(rules(), "//entry[name = @kind]"), "entry[name = @kind]");
        // multi-expression predicate
        assert_eq!(rewrite(rules(), "//entry[name = 'x', 1]"), "entry[name = \"x\", 1]");
    }

    #[test]
    fn test_unknown_context_path() {
        let sets = vec![Arc::new(IndexRuleSet::new("/db/test", vec![entry_rule(&[])]))];
        let ctx = StaticContext::default();
        let rewriter = PredicateRewriter::new(&sets, &ctx);
        let Expr::Step(step) = parse("entry[name = 'x']").unwrap() else {
            panic!("expected step");
        };
        assert!(rewriter.try_rewrite(&step, None).is_none());
        assert_eq!(rewriter.rewrite(&step, None), Expr::Step(step.clone()));
    }

    #[test]
    fn test_fallback_kept() {
        let sets = vec![Arc::new(IndexRuleSet::new("/db/test", vec![entry_rule(&[])]))];
        let ctx = StaticContext::default();
        let rewriter = PredicateRewriter::new(&sets, &ctx);
        let Expr::Step(step) = parse("entry[name = 'x']").unwrap() else {
            panic!("expected step");
        };
        let context = path("//entry");
        let Some(Expr::FieldLookup(lookup)) = rewriter.try_rewrite(&step, Some(&context)) else {
            panic!("expected lookup");
        };
        assert_eq!(lookup.fallback(), step.as_ref());
    }

    const CONFIG: &str = r#"<collection><index xmlns:m="urn:m"><range>
        <create match="//m:entry"><field name="title" match="m:title"/></create>
    </range></index></collection>"#;

    fn optimizer_registry() -> CollectionRegistry {
        let registry = CollectionRegistry::new();
        registry.publish(load_rule_set("/db/apps", CONFIG.as_bytes()).rule_set);
        registry
    }

    #[test]
    fn test_optimizer_walks_query() {
        let registry = optimizer_registry();
        let ctx = StaticContext::new(NamespaceContext::new().with("m", "urn:m"), vec![]);
        let optimizer = QueryOptimizer::new(&registry, ctx);

        let expr = parse("count(collection('/db/apps/data')//m:entry[m:title = 'T']/@id)").unwrap();
        assert_eq!(
            optimizer.optimize(&expr).to_string(),
            "count(collection(\"/db/apps/data\")//range:field((\"title\"), (\"eq\"), \"T\")/@id)"
        );

        // no collection named and no defaults
        let expr = parse("//m:entry[m:title = 'T']").unwrap();
        assert_eq!(optimizer.optimize(&expr), expr);
    }

    #[test]
    fn test_optimizer_uses_rules_of_step_root() {
        let registry = CollectionRegistry::new();
        registry.publish(load_rule_set("/db/a", CONFIG.as_bytes()).rule_set);
        let ctx = StaticContext::new(NamespaceContext::new().with("m", "urn:m"), vec![]);
        let optimizer = QueryOptimizer::new(&registry, ctx);

        let expr = parse("collection('/db/b')//m:entry[m:title = 'x'] | collection('/db/a')//m:entry[m:title = 'y']")
            .unwrap();
        assert_eq!(
            optimizer.optimize(&expr).to_string(),
            "collection(\"/db/b\")//m:entry[m:title = \"x\"] | collection(\"/db/a\")//range:field((\"title\"), (\"eq\"), \"y\")"
        );
    }

    #[test]
    fn test_optimizer_default_collections() {
        let registry = optimizer_registry();
        let ctx = StaticContext::new(NamespaceContext::new().with("m", "urn:m"), vec!["/db/apps".to_string()]);
        let optimizer = QueryOptimizer::new(&registry, ctx);

        let expr = parse("//m:entry[m:title = 'T']").unwrap();
        assert_eq!(optimizer.optimize(&expr).to_string(), "//range:field((\"title\"), (\"eq\"), \"T\")");

        let system = QueryOptimizer::new(
            &registry,
            StaticContext::new(NamespaceContext::new().with("m", "urn:m"), vec!["/db/system/config".to_string()]),
        );
        assert_eq!(system.optimize(&expr), expr);
    }
}
