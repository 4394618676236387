//! Query Expression Tree
//!
//! The subset of the query language the optimizer inspects. `Display`
//! renders an expression back to query text, which is also how rewritten
//! queries are explained to callers.

use std::fmt;

use crate::config::Operator;
use crate::error::{Error, Result};

/// Query expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Root of the context document (`/`)
    Root,
    /// Context item (`.`)
    Context,
    /// Parent (`..`)
    Parent,
    /// `left/right`; `right` is normally a `Step`
    Path(Box<Expr>, Box<Expr>),
    /// Location step
    Step(Box<Step>),
    /// Predicates applied to a primary expression
    Filter(Box<Expr>, Vec<Predicate>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    /// Function call; the name keeps its lexical prefix
    Function(String, Vec<Expr>),
    /// Parenthesized comma sequence (empty or more than one item)
    Sequence(Vec<Expr>),
    String(String),
    Number(f64),
    Variable(String),
    /// Index lookup produced by the optimizer
    FieldLookup(Box<FieldLookup>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq => 3,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        }
    }

    /// Index operator equivalent of a general comparison
    pub fn comparison(&self) -> Option<Operator> {
        match self {
            BinaryOp::Eq => Some(Operator::Eq),
            BinaryOp::NotEq => Some(Operator::Ne),
            BinaryOp::Lt => Some(Operator::Lt),
            BinaryOp::LtEq => Some(Operator::Le),
            BinaryOp::Gt => Some(Operator::Gt),
            BinaryOp::GtEq => Some(Operator::Ge),
            _ => None,
        }
    }
}

/// Location step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub node_test: NodeTest,
    pub predicates: Vec<Predicate>,
}

impl Step {
    pub fn new(axis: Axis, node_test: NodeTest) -> Self {
        Step {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }

    /// The step `//` stands for
    pub fn descendant_or_self() -> Self {
        Step::new(Axis::DescendantOrSelf, NodeTest::Node)
    }

    fn is_abbreviated_descendant(&self) -> bool {
        self.axis == Axis::DescendantOrSelf && self.node_test == NodeTest::Node && self.predicates.is_empty()
    }
}

/// A bracketed predicate; more than one expression when comma separated
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub exprs: Vec<Expr>,
}

impl Predicate {
    pub fn new(expr: Expr) -> Self {
        Predicate { exprs: vec![expr] }
    }

    /// The contained expression, if there is exactly one
    pub fn single(&self) -> Option<&Expr> {
        match self.exprs.as_slice() {
            [expr] => Some(expr),
            _ => None,
        }
    }
}

/// Axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Self_,
    Attribute,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "ancestor-or-self" => Some(Axis::AncestorOrSelf),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            "following" => Some(Axis::Following),
            "preceding" => Some(Axis::Preceding),
            "self" => Some(Axis::Self_),
            "attribute" => Some(Axis::Attribute),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Following => "following",
            Axis::Preceding => "preceding",
            Axis::Self_ => "self",
            Axis::Attribute => "attribute",
        }
    }
}

/// Node test of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `*`
    Any,
    /// Lexical name, possibly `prefix:local`
    Name(String),
    /// `prefix:*`
    NamespaceWildcard(String),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}

/// `range:field(...)` call replacing a location step
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLookup {
    fields: Vec<String>,
    operators: Vec<Operator>,
    keys: Vec<Expr>,
    /// The step this lookup stands in for
    fallback: Step,
}

impl FieldLookup {
    /// Name of the synthesized call
    pub const FUNCTION: &'static str = "range:field";

    pub fn new(fields: Vec<String>, operators: Vec<Operator>, keys: Vec<Expr>, fallback: Step) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::ExpressionConstruction("field lookup without fields".to_string()));
        }
        if fields.len() != operators.len() || fields.len() != keys.len() {
            return Err(Error::ExpressionConstruction(format!(
                "{} fields, {} operators and {} keys",
                fields.len(),
                operators.len(),
                keys.len()
            )));
        }
        if let Some(empty) = fields.iter().position(|f| f.is_empty()) {
            return Err(Error::ExpressionConstruction(format!("field {} has no name", empty)));
        }
        Ok(FieldLookup {
            fields,
            operators,
            keys,
            fallback,
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    pub fn keys(&self) -> &[Expr] {
        &self.keys
    }

    pub fn fallback(&self) -> &Step {
        &self.fallback
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"{}\"", s.replace('"', "\"\""))
}

impl fmt::Display for FieldLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}((", Self::FUNCTION)?;
        for (i, name) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_string_literal(f, name)?;
        }
        f.write_str("), (")?;
        for (i, op) in self.operators.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_string_literal(f, op.as_str())?;
        }
        f.write_str(")")?;
        for key in &self.keys {
            write!(f, ", {}", key)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        write_list(f, &self.exprs)?;
        f.write_str("]")
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTest::Any => f.write_str("*"),
            NodeTest::Name(name) => f.write_str(name),
            NodeTest::NamespaceWildcard(prefix) => write!(f, "{}:*", prefix),
            NodeTest::Node => f.write_str("node()"),
            NodeTest::Text => f.write_str("text()"),
            NodeTest::Comment => f.write_str("comment()"),
            NodeTest::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
            NodeTest::ProcessingInstruction(Some(target)) => write!(f, "processing-instruction(\"{}\")", target),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.axis, &self.node_test) {
            (Axis::Child, test) => write!(f, "{}", test)?,
            (Axis::Attribute, test) => write!(f, "@{}", test)?,
            (Axis::Self_, NodeTest::Node) => f.write_str(".")?,
            (Axis::Parent, NodeTest::Node) => f.write_str("..")?,
            (axis, test) => write!(f, "{}::{}", axis.as_str(), test)?,
        }
        for predicate in &self.predicates {
            write!(f, "{}", predicate)?;
        }
        Ok(())
    }
}

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(_, op, _) => op.precedence(),
            Expr::Union(..) => 7,
            Expr::Negate(_) => 8,
            _ => u8::MAX,
        }
    }

    fn write_operand(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Root => f.write_str("/"),
            Expr::Context => f.write_str("."),
            Expr::Parent => f.write_str(".."),
            Expr::Path(left, right) => {
                match left.as_ref() {
                    Expr::Root => f.write_str("/")?,
                    other => {
                        other.write_operand(f, u8::MAX)?;
                        f.write_str("/")?;
                    }
                }
                match right.as_ref() {
                    Expr::Step(step) if step.is_abbreviated_descendant() => Ok(()),
                    other => other.write_operand(f, u8::MAX),
                }
            }
            Expr::Step(step) => write!(f, "{}", step),
            Expr::Filter(inner, predicates) => {
                inner.write_operand(f, u8::MAX)?;
                for predicate in predicates {
                    write!(f, "{}", predicate)?;
                }
                Ok(())
            }
            Expr::Binary(left, op, right) => {
                let prec = op.precedence();
                left.write_operand(f, prec)?;
                write!(f, " {} ", op.symbol())?;
                right.write_operand(f, prec + 1)
            }
            Expr::Union(left, right) => {
                left.write_operand(f, 7)?;
                f.write_str(" | ")?;
                right.write_operand(f, 8)
            }
            Expr::Negate(inner) => {
                f.write_str("-")?;
                inner.write_operand(f, 8)
            }
            Expr::Function(name, args) => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::Sequence(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                f.write_str(")")
            }
            Expr::String(s) => write_string_literal(f, s),
            Expr::Number(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Variable(name) => write!(f, "${}", name),
            Expr::FieldLookup(lookup) => write!(f, "{}", lookup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str) -> Expr {
        Expr::Step(Box::new(Step::new(Axis::Child, NodeTest::Name(name.to_string()))))
    }

    #[test]
    fn test_display_paths() {
        let dos = Expr::Step(Box::new(Step::descendant_or_self()));
        let expr = Expr::Path(
            Box::new(Expr::Path(Box::new(Expr::Path(Box::new(Expr::Root), Box::new(dos))), Box::new(step("a")))),
            Box::new(step("b")),
        );
        assert_eq!(expr.to_string(), "//a/b");
    }

    #[test]
    fn test_display_precedence() {
        let sum = Expr::Binary(Box::new(Expr::Number(1.0)), BinaryOp::Add, Box::new(Expr::Number(2.0)));
        let product = Expr::Binary(Box::new(sum), BinaryOp::Mul, Box::new(Expr::Number(3.5)));
        assert_eq!(product.to_string(), "(1 + 2) * 3.5");
    }

    #[test]
    fn test_field_lookup_construction() {
        let fallback = Step::new(Axis::Child, NodeTest::Name("entry".to_string()));
        let lookup = FieldLookup::new(
            vec!["name".to_string(), "kind".to_string()],
            vec![Operator::Eq, Operator::StartsWith],
            vec![Expr::String("x".to_string()), Expr::Variable("k".to_string())],
            fallback.clone(),
        )
        .unwrap();
        assert_eq!(
            lookup.to_string(),
            "range:field((\"name\", \"kind\"), (\"eq\", \"starts-with\"), \"x\", $k)"
        );

        let err = FieldLookup::new(vec!["name".to_string()], vec![], vec![], fallback.clone()).unwrap_err();
        assert!(matches!(err, Error::ExpressionConstruction(_)));
        assert!(FieldLookup::new(vec![], vec![], vec![], fallback).is_err());
    }

    #[test]
    fn test_predicate_single() {
        let single = Predicate::new(Expr::Number(1.0));
        assert!(single.single().is_some());
        let pair = Predicate {
            exprs: vec![Expr::Number(1.0), Expr::Number(2.0)],
        };
        assert!(pair.single().is_none());
        assert_eq!(pair.to_string(), "[1, 2]");
    }
}
