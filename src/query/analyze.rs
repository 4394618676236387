//! Static Path Analysis
//!
//! Derives structural paths from query expressions without evaluating
//! them: the absolute path a location step selects, the relative path a
//! predicate compares, and the comparison shapes an index lookup can serve.

use std::borrow::Cow;

use crate::config::{Condition, ConditionProbe, Operator};
use crate::path::{Component, NameKind, NamespaceContext, PathPattern};

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Predicate, Step};

/// Namespace of the range index functions
pub const RANGE_NS: &str = "http://exist-db.org/xquery/range";

/// Query-wide facts known before evaluation
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    pub namespaces: NamespaceContext,
    /// Collections assumed when the query names none
    pub default_collections: Vec<String>,
}

impl StaticContext {
    pub fn new(namespaces: NamespaceContext, default_collections: Vec<String>) -> Self {
        StaticContext {
            namespaces,
            default_collections,
        }
    }

    /// Does `name` (as written) call `local` in the range function namespace?
    fn is_range_function(&self, name: &str, local: &str) -> bool {
        match name.split_once(':') {
            Some((prefix, rest)) => {
                rest == local && (prefix == "range" || self.namespaces.resolve(prefix) == Some(RANGE_NS))
            }
            None => false,
        }
    }
}

/// Strip an `fn:` prefix from a built-in function name
fn builtin(name: &str) -> Option<&str> {
    match name.split_once(':') {
        Some(("fn", local)) => Some(local),
        Some(_) => None,
        None => Some(name),
    }
}

fn push_collapsed(path: &mut PathPattern, component: Component) {
    if component.is_skip() && path.last().is_some_and(Component::is_skip) {
        return;
    }
    path.push(component);
}

/// Append the components a step selects; `None` when a step cannot be
/// expressed as a structural path
fn append_step(path: &mut PathPattern, step: &Step, namespaces: &NamespaceContext) -> Option<()> {
    let name = |lexical: &str, kind| namespaces.qname(lexical, kind).map(Component::Name);
    match (step.axis, &step.node_test) {
        (Axis::Child, NodeTest::Name(n)) => push_collapsed(path, name(n, NameKind::Element)?),
        (Axis::Child, NodeTest::Any) => push_collapsed(path, Component::Wildcard),
        (Axis::Attribute, NodeTest::Name(n)) => push_collapsed(path, name(n, NameKind::Attribute)?),
        (Axis::Self_, NodeTest::Node) => {}
        (Axis::DescendantOrSelf, NodeTest::Node) => push_collapsed(path, Component::Skip),
        (Axis::Descendant | Axis::DescendantOrSelf, NodeTest::Name(n)) => {
            let component = name(n, NameKind::Element)?;
            push_collapsed(path, Component::Skip);
            push_collapsed(path, component);
        }
        (Axis::Descendant | Axis::DescendantOrSelf, NodeTest::Any) => {
            push_collapsed(path, Component::Skip);
            push_collapsed(path, Component::Wildcard);
        }
        _ => return None,
    }
    Some(())
}

/// Is `name` a call that roots a path at stored documents?
fn is_collection_root(name: &str) -> bool {
    matches!(builtin(name), Some("collection" | "doc"))
}

/// Absolute path selected by `expr`, when it is statically known
///
/// Predicates do not change the path of the step they filter.
pub fn context_path(expr: &Expr, namespaces: &NamespaceContext) -> Option<PathPattern> {
    match expr {
        Expr::Root => Some(PathPattern::new()),
        Expr::Function(name, _) if is_collection_root(name) => Some(PathPattern::new()),
        Expr::Filter(inner, _) => context_path(inner, namespaces),
        Expr::Path(left, right) => {
            let mut path = context_path(left, namespaces)?;
            match right.as_ref() {
                Expr::Step(step) => append_step(&mut path, step, namespaces)?,
                _ => return None,
            }
            Some(path)
        }
        _ => None,
    }
}

/// Relative path compared by a predicate operand (`name`, `@type`, `a/b`,
/// `.//x`); steps carrying predicates of their own are not plain paths
pub fn inner_path(expr: &Expr, namespaces: &NamespaceContext) -> Option<PathPattern> {
    match expr {
        Expr::Context => Some(PathPattern::new()),
        Expr::Step(step) if step.predicates.is_empty() => {
            let mut path = PathPattern::new();
            append_step(&mut path, step, namespaces)?;
            Some(path)
        }
        Expr::Path(left, right) => {
            let mut path = inner_path(left, namespaces)?;
            match right.as_ref() {
                Expr::Step(step) if step.predicates.is_empty() => append_step(&mut path, step, namespaces)?,
                _ => return None,
            }
            Some(path)
        }
        _ => None,
    }
}

/// Functions whose zero-argument form reads the context item
fn reads_context_implicitly(name: &str) -> bool {
    matches!(
        builtin(name),
        Some(
            "position"
                | "last"
                | "name"
                | "local-name"
                | "namespace-uri"
                | "node-name"
                | "string"
                | "number"
                | "string-length"
                | "normalize-space"
                | "data"
                | "root"
                | "base-uri"
                | "document-uri"
                | "generate-id"
        )
    )
}

/// Does evaluating `expr` need the context item?
pub fn depends_on_context(expr: &Expr) -> bool {
    match expr {
        Expr::Root | Expr::Context | Expr::Parent | Expr::Step(_) => true,
        Expr::String(_) | Expr::Number(_) | Expr::Variable(_) => false,
        Expr::Function(name, args) if args.is_empty() => reads_context_implicitly(name),
        Expr::Function(_, args) | Expr::Sequence(args) => args.iter().any(depends_on_context),
        // The step after `/` is evaluated against the left side
        Expr::Path(left, _) => depends_on_context(left),
        Expr::Filter(inner, _) => depends_on_context(inner),
        Expr::Binary(left, _, right) | Expr::Union(left, right) => {
            depends_on_context(left) || depends_on_context(right)
        }
        Expr::Negate(inner) => depends_on_context(inner),
        Expr::FieldLookup(lookup) => lookup.keys().iter().any(depends_on_context),
    }
}

/// A comparison an index lookup could answer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparable<'e> {
    /// `path op key` with a general comparison operator
    General {
        path: &'e Expr,
        operator: Operator,
        key: &'e Expr,
    },
    /// `f(path, key)` for a string function or a `range:*` operator function
    Lookup {
        function: &'e str,
        path: &'e Expr,
        operator: Operator,
        key: &'e Expr,
    },
}

impl<'e> Comparable<'e> {
    /// Recognize a comparable shape
    pub fn of(expr: &'e Expr, ctx: &StaticContext) -> Option<Self> {
        match expr {
            Expr::Binary(left, op, right) => Some(Comparable::General {
                path: left,
                operator: op.comparison()?,
                key: right,
            }),
            Expr::Function(name, args) => {
                let [path, key] = args.as_slice() else {
                    return None;
                };
                let operator = lookup_operator(name, ctx)?;
                Some(Comparable::Lookup {
                    function: name,
                    path,
                    operator,
                    key,
                })
            }
            _ => None,
        }
    }

    pub fn path(&self) -> &'e Expr {
        match self {
            Comparable::General { path, .. } | Comparable::Lookup { path, .. } => path,
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            Comparable::General { operator, .. } | Comparable::Lookup { operator, .. } => *operator,
        }
    }

    pub fn key(&self) -> &'e Expr {
        match self {
            Comparable::General { key, .. } | Comparable::Lookup { key, .. } => key,
        }
    }
}

fn lookup_operator(name: &str, ctx: &StaticContext) -> Option<Operator> {
    if let Some(local) = builtin(name) {
        return match local {
            "starts-with" => Some(Operator::StartsWith),
            "ends-with" => Some(Operator::EndsWith),
            "contains" => Some(Operator::Contains),
            "matches" => Some(Operator::Matches),
            _ => None,
        };
    }
    let (_, local) = name.split_once(':')?;
    Operator::from_name(local).filter(|_| ctx.is_range_function(name, local))
}

/// Text of a literal key
pub fn literal_text(expr: &Expr) -> Option<Cow<'_, str>> {
    match expr {
        Expr::String(s) => Some(Cow::Borrowed(s)),
        Expr::Number(_) => Some(Cow::Owned(expr.to_string())),
        _ => None,
    }
}

/// A predicate reduced to what the rewriter needs
#[derive(Debug, Clone)]
pub struct PredicateShape<'e> {
    pub comparable: Comparable<'e>,
    /// Path compared, relative to the step
    pub inner: PathPattern,
}

impl<'e> PredicateShape<'e> {
    /// `None` unless the predicate holds exactly one comparable expression
    /// whose key is independent of the context item
    pub fn analyze(predicate: &'e Predicate, ctx: &StaticContext) -> Option<Self> {
        let comparable = Comparable::of(predicate.single()?, ctx)?;
        if depends_on_context(comparable.key()) {
            return None;
        }
        let inner = inner_path(comparable.path(), &ctx.namespaces)?;
        Some(PredicateShape { comparable, inner })
    }
}

impl ConditionProbe for PredicateShape<'_> {
    fn satisfies(&self, condition: &Condition) -> bool {
        if self.inner != *condition.path() {
            return false;
        }
        literal_text(self.comparable.key())
            .is_some_and(|key| condition.accepts(self.comparable.operator(), &key))
    }
}

fn for_each_child<'e>(expr: &'e Expr, visit: &mut impl FnMut(&'e Expr)) {
    match expr {
        Expr::Path(left, right) | Expr::Binary(left, _, right) | Expr::Union(left, right) => {
            visit(left.as_ref());
            visit(right.as_ref());
        }
        Expr::Step(step) => {
            for pred in &step.predicates {
                pred.exprs.iter().for_each(&mut *visit);
            }
        }
        Expr::Filter(inner, preds) => {
            visit(inner.as_ref());
            for pred in preds {
                pred.exprs.iter().for_each(&mut *visit);
            }
        }
        Expr::Negate(inner) => visit(inner.as_ref()),
        Expr::Function(_, args) | Expr::Sequence(args) => args.iter().for_each(&mut *visit),
        Expr::FieldLookup(lookup) => lookup.keys().iter().for_each(&mut *visit),
        _ => {}
    }
}

/// Expression a statically rooted path starts from: `/` or a
/// `collection()` / `doc()` call
pub fn path_root(expr: &Expr) -> Option<&Expr> {
    match expr {
        Expr::Root => Some(expr),
        Expr::Function(name, _) if is_collection_root(name) => Some(expr),
        Expr::Filter(inner, _) | Expr::Path(inner, _) => path_root(inner),
        _ => None,
    }
}

/// Collections reachable from a path root
///
/// `/` stands for the caller's default collections; a document contributes
/// its parent collection.
pub fn root_collections(root: &Expr, ctx: &StaticContext) -> Vec<String> {
    let Expr::Function(name, args) = root else {
        return match root {
            Expr::Root => ctx.default_collections.clone(),
            _ => Vec::new(),
        };
    };
    let uri = match (builtin(name), args.first()) {
        (Some("collection"), Some(Expr::String(uri))) => Some(uri.clone()),
        (Some("doc"), Some(Expr::String(uri))) => uri.rsplit_once('/').map(|(parent, _)| match parent {
            "" => "/".to_string(),
            parent => parent.to_string(),
        }),
        _ => None,
    };
    uri.into_iter().collect()
}

fn calls_position(expr: &Expr) -> bool {
    if let Expr::Function(name, _) = expr {
        if matches!(builtin(name), Some("position" | "last")) {
            return true;
        }
    }
    let mut found = false;
    for_each_child(expr, &mut |child| found |= calls_position(child));
    found
}

/// Is `expr` known to yield a boolean or a node sequence (never a number)?
fn is_boolean_shaped(expr: &Expr) -> bool {
    match expr {
        Expr::Binary(_, op, _) => op.comparison().is_some() || matches!(op, BinaryOp::And | BinaryOp::Or),
        Expr::Function(name, _) => matches!(
            builtin(name),
            Some(
                "not" | "true" | "false" | "boolean" | "exists" | "empty" | "starts-with" | "ends-with" | "contains"
                    | "matches"
            )
        ),
        Expr::Path(_, right) => matches!(right.as_ref(), Expr::Step(_)),
        Expr::Root | Expr::Context | Expr::Parent | Expr::Step(_) | Expr::String(_) => true,
        _ => false,
    }
}

/// Could the predicate select by position (`[1]`, `[$n]`, `[last()]`)?
///
/// Such a predicate filters within each parent's children and cannot be
/// reapplied to the result of a field lookup.
pub fn may_depend_on_position(predicate: &Predicate) -> bool {
    match predicate.exprs.as_slice() {
        [expr] => !is_boolean_shaped(expr) || calls_position(expr),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::QName;
    use crate::query::parser::parse;

    fn ctx() -> StaticContext {
        StaticContext::new(NamespaceContext::new().with("m", "urn:mods"), vec![])
    }

    fn path(spec: &str) -> PathPattern {
        PathPattern::parse(spec, false, &ctx().namespaces).unwrap()
    }

    fn first_predicate(query: &str) -> Predicate {
        match parse(query).unwrap() {
            Expr::Path(_, right) => match *right {
                Expr::Step(step) => step.predicates[0].clone(),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_context_path() {
        let ns = &ctx().namespaces;
        let expr = parse("//m:entry/name").unwrap();
        assert_eq!(context_path(&expr, ns), Some(path("//m:entry/name")));

        let expr = parse("collection('/db/x')/root/descendant::item/*").unwrap();
        assert_eq!(context_path(&expr, ns), Some(path("/root//item/*")));

        assert_eq!(context_path(&parse("$doc//a").unwrap(), ns), None);
        assert_eq!(context_path(&parse("//a/following::b").unwrap(), ns), None);
        assert_eq!(context_path(&parse("//x:a").unwrap(), ns), None);
    }

    #[test]
    fn test_inner_path() {
        let ns = &ctx().namespaces;
        assert_eq!(inner_path(&parse("@type").unwrap(), ns), Some(path("@type")));
        assert_eq!(inner_path(&parse("a/b").unwrap(), ns), Some(path("a/b")));
        assert_eq!(inner_path(&parse(".//b").unwrap(), ns), Some(path("//b")));
        assert_eq!(inner_path(&parse(".").unwrap(), ns), Some(PathPattern::new()));
        assert_eq!(inner_path(&parse("a[1]/b").unwrap(), ns), None);
        assert_eq!(inner_path(&parse("@*").unwrap(), ns), None);
        assert_eq!(inner_path(&parse("/a").unwrap(), ns), None);
    }

    #[test]
    fn test_comparable_shapes() {
        let ctx = ctx();
        for (query, op) in [
            ("//a[b = 'x']", Operator::Eq),
            ("//a[b >= 3]", Operator::Ge),
            ("//a[starts-with(b, 'x')]", Operator::StartsWith),
            ("//a[fn:contains(b, 'x')]", Operator::Contains),
            ("//a[range:le(b, $v)]", Operator::Le),
        ] {
            let pred = first_predicate(query);
            let shape = PredicateShape::analyze(&pred, &ctx).unwrap();
            assert_eq!(shape.comparable.operator(), op, "{}", query);
            assert_eq!(shape.inner, path("b"));
        }

        for query in [
            "//a[b]",
            "//a[b = 'x', c = 'y']",
            "//a[b = .]",
            "//a[b = position()]",
            "//a[other:eq(b, 'x')]",
            "//a[b + 1]",
            "//a[b[1] = 'x']",
        ] {
            let pred = first_predicate(query);
            assert!(PredicateShape::analyze(&pred, &ctx).is_none(), "{}", query);
        }
    }

    #[test]
    fn test_depends_on_context() {
        assert!(!depends_on_context(&parse("'x'").unwrap()));
        assert!(!depends_on_context(&parse("concat($a, 'x')").unwrap()));
        assert!(!depends_on_context(&parse("doc('/db/a.xml')//b").unwrap()));
        assert!(depends_on_context(&parse("//b").unwrap()));
        assert!(depends_on_context(&parse("../b").unwrap()));
        assert!(depends_on_context(&parse("last()").unwrap()));
        assert!(depends_on_context(&parse("upper-case(name)").unwrap()));
    }

    #[test]
    fn test_condition_probe() {
        let ctx = ctx();
        let cond = Condition::new(QName::attribute("type"), "main");
        let pred = first_predicate("//a[@type = 'main']");
        assert!(PredicateShape::analyze(&pred, &ctx).unwrap().satisfies(&cond));

        let pred = first_predicate("//a[@type = $t]");
        assert!(!PredicateShape::analyze(&pred, &ctx).unwrap().satisfies(&cond));

        let pred = first_predicate("//a[@kind = 'main']");
        assert!(!PredicateShape::analyze(&pred, &ctx).unwrap().satisfies(&cond));
    }

    fn roots(query: &str, ctx: &StaticContext) -> Vec<String> {
        let expr = parse(query).unwrap();
        path_root(&expr).map(|root| root_collections(root, ctx)).unwrap_or_default()
    }

    #[test]
    fn test_root_collections() {
        let ctx = StaticContext::new(NamespaceContext::new(), vec!["/db/default".to_string()]);
        assert_eq!(roots("collection('/db/a/')//x[1]/y", &ctx), vec!["/db/a/".to_string()]);
        assert_eq!(roots("doc('/db/b/d.xml')//y", &ctx), vec!["/db/b".to_string()]);
        assert_eq!(roots("doc('/d.xml')/y", &ctx), vec!["/".to_string()]);
        assert_eq!(roots("//x", &ctx), vec!["/db/default".to_string()]);
        assert!(roots("collection($c)//x", &ctx).is_empty());
        assert!(roots("$doc//x", &ctx).is_empty());
    }

    #[test]
    fn test_may_depend_on_position() {
        let positional = |query: &str| may_depend_on_position(&first_predicate(query));
        assert!(positional("//a[1]"));
        assert!(positional("//a[$n]"));
        assert!(positional("//a[last()]"));
        assert!(positional("//a[position() < 3]"));
        assert!(positional("//a[count(b) - 1]"));
        assert!(positional("//a[b/count(c)]"));
        assert!(positional("//a[b, c]"));

        assert!(!positional("//a[b = 1]"));
        assert!(!positional("//a[@type]"));
        assert!(!positional("//a[b/c]"));
        assert!(!positional("//a[starts-with(b, 'x')]"));
        assert!(!positional("//a[count(b) > 2 and c]"));
    }
}
