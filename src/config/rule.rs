//! Index Rules
//!
//! An `IndexRule` binds a structural path to the text it indexes. Simple
//! rules index the matched node's own text; complex rules declare named
//! fields at sub-paths and may be guarded by attribute conditions.

use std::borrow::Cow;
use std::fmt;

use crate::path::{PathPattern, QName};

/// Comparison operators shared by conditions, predicates and field lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    StartsWith,
    EndsWith,
    Contains,
    Matches,
}

impl Operator {
    /// Name used in configuration attributes and lookup arguments
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Gt => "gt",
            Operator::Le => "le",
            Operator::Ge => "ge",
            Operator::StartsWith => "starts-with",
            Operator::EndsWith => "ends-with",
            Operator::Contains => "contains",
            Operator::Matches => "matches",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Operator::Eq),
            "ne" => Some(Operator::Ne),
            "lt" => Some(Operator::Lt),
            "gt" => Some(Operator::Gt),
            "le" => Some(Operator::Le),
            "ge" => Some(Operator::Ge),
            "starts-with" => Some(Operator::StartsWith),
            "ends-with" => Some(Operator::EndsWith),
            "contains" => Some(Operator::Contains),
            "matches" => Some(Operator::Matches),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whitespace handling applied to extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitespaceTreatment {
    #[default]
    None,
    /// Strip leading and trailing whitespace
    Normalize,
    /// Strip, then fold internal whitespace runs into single spaces
    Collapse,
}

impl WhitespaceTreatment {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" | "preserve" => Some(WhitespaceTreatment::None),
            "normalize" | "trim" => Some(WhitespaceTreatment::Normalize),
            "collapse" => Some(WhitespaceTreatment::Collapse),
            _ => None,
        }
    }

    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            WhitespaceTreatment::None => Cow::Borrowed(text),
            WhitespaceTreatment::Normalize => Cow::Borrowed(text.trim_matches(is_xml_whitespace)),
            WhitespaceTreatment::Collapse => {
                let mut out = String::with_capacity(text.len());
                for word in text.split(is_xml_whitespace).filter(|w| !w.is_empty()) {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(word);
                }
                Cow::Owned(out)
            }
        }
    }
}

#[inline]
fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Declared value type of an index entry (`xs:*` names)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Decimal,
    Double,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
}

impl FieldType {
    pub fn from_name(name: &str) -> Option<Self> {
        let local = name.strip_prefix("xs:").unwrap_or(name);
        match local {
            "string" => Some(FieldType::String),
            "integer" | "int" | "long" | "short" => Some(FieldType::Integer),
            "decimal" => Some(FieldType::Decimal),
            "double" => Some(FieldType::Double),
            "float" => Some(FieldType::Float),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "dateTime" => Some(FieldType::DateTime),
            "time" => Some(FieldType::Time),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "xs:string",
            FieldType::Integer => "xs:integer",
            FieldType::Decimal => "xs:decimal",
            FieldType::Double => "xs:double",
            FieldType::Float => "xs:float",
            FieldType::Boolean => "xs:boolean",
            FieldType::Date => "xs:date",
            FieldType::DateTime => "xs:dateTime",
            FieldType::Time => "xs:time",
        }
    }
}

/// Text handling shared by rules and field definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    pub whitespace: WhitespaceTreatment,
    pub case_sensitive: bool,
    pub include_nested: bool,
    pub field_type: FieldType,
}

impl Default for TextOptions {
    fn default() -> Self {
        TextOptions {
            whitespace: WhitespaceTreatment::None,
            case_sensitive: true,
            include_nested: true,
            field_type: FieldType::String,
        }
    }
}

/// Attribute constraint guarding a complex rule
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    attribute: QName,
    path: PathPattern,
    value: String,
    operator: Operator,
    case_sensitive: bool,
    numeric: bool,
}

impl Condition {
    /// Equality condition on an attribute
    pub fn new(attribute: QName, value: &str) -> Self {
        let mut path = PathPattern::new();
        path.push_name(attribute.clone());
        Condition {
            attribute,
            path,
            value: value.to_string(),
            operator: Operator::Eq,
            case_sensitive: true,
            numeric: false,
        }
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_numeric(mut self, numeric: bool) -> Self {
        self.numeric = numeric;
        self
    }

    pub fn attribute(&self) -> &QName {
        &self.attribute
    }

    /// Relative path (`@attr`) a sibling predicate must compare
    pub fn path(&self) -> &PathPattern {
        &self.path
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Index time: does the element's attribute satisfy the condition?
    pub fn holds(&self, attributes: &[(QName, String)]) -> bool {
        attributes
            .iter()
            .find(|(name, _)| *name == self.attribute)
            .is_some_and(|(_, actual)| self.test(actual))
    }

    /// Compare an attribute value against the declared value
    fn test(&self, actual: &str) -> bool {
        if self.numeric {
            let (Ok(actual), Ok(expected)) = (actual.trim().parse::<f64>(), self.value.trim().parse::<f64>()) else {
                return false;
            };
            return match self.operator {
                Operator::Eq => actual == expected,
                Operator::Ne => actual != expected,
                Operator::Lt => actual < expected,
                Operator::Gt => actual > expected,
                Operator::Le => actual <= expected,
                Operator::Ge => actual >= expected,
                _ => false,
            };
        }

        let (actual, expected) = self.fold(actual);
        match self.operator {
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
            Operator::Lt => actual < expected,
            Operator::Gt => actual > expected,
            Operator::Le => actual <= expected,
            Operator::Ge => actual >= expected,
            Operator::StartsWith => actual.starts_with(expected.as_ref()),
            Operator::EndsWith => actual.ends_with(expected.as_ref()),
            Operator::Contains => actual.contains(expected.as_ref()),
            Operator::Matches => false,
        }
    }

    /// Query time: would a predicate `<path> <operator> <key>` imply this condition?
    pub fn accepts(&self, operator: Operator, key: &str) -> bool {
        if operator != self.operator {
            return false;
        }
        if self.numeric {
            return match (key.trim().parse::<f64>(), self.value.trim().parse::<f64>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
        }
        let (key, expected) = self.fold(key);
        key == expected
    }

    fn fold<'a>(&'a self, other: &'a str) -> (Cow<'a, str>, Cow<'a, str>) {
        if self.case_sensitive {
            (Cow::Borrowed(other), Cow::Borrowed(self.value.as_str()))
        } else {
            (Cow::Owned(other.to_lowercase()), Cow::Owned(self.value.to_lowercase()))
        }
    }
}

/// Named field declared inside a complex rule
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    /// Absolute pattern: the rule path followed by the field's `match`
    pub path: PathPattern,
    pub options: TextOptions,
}

impl FieldDef {
    pub fn new(name: &str, path: PathPattern, options: TextOptions) -> Self {
        FieldDef {
            name: name.to_string(),
            path,
            options,
        }
    }

    #[inline]
    pub fn matches(&self, path: &PathPattern) -> bool {
        self.path.matches(path)
    }

    #[inline]
    pub fn targets_attribute(&self) -> bool {
        matches!(self.path.last(), Some(crate::path::Component::Name(q)) if q.is_attribute())
    }
}

/// One `create` entry of a collection's index configuration
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRule {
    pub path: PathPattern,
    pub conditions: Vec<Condition>,
    pub fields: Vec<FieldDef>,
    pub options: TextOptions,
}

impl IndexRule {
    /// Rule with no fields or conditions
    pub fn new(path: PathPattern) -> Self {
        IndexRule {
            path,
            conditions: Vec::new(),
            fields: Vec::new(),
            options: TextOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TextOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a field whose `relative` path is resolved against the rule path;
    /// `None` makes the field cover the rule's own node
    pub fn with_field(mut self, name: &str, relative: Option<&PathPattern>, options: TextOptions) -> Self {
        let path = match relative {
            Some(rel) => self.path.joined(rel),
            None => self.path.clone(),
        };
        self.fields.push(FieldDef::new(name, path, options));
        self
    }

    /// Complex rules declare named fields
    #[inline]
    pub fn is_complex(&self) -> bool {
        !self.fields.is_empty()
    }

    #[inline]
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// The rule's node or one of its fields lies at `path`
    pub fn matches(&self, path: &PathPattern) -> bool {
        self.path.matches(path) || self.fields.iter().any(|f| f.matches(path))
    }

    /// First field declared at `path`
    pub fn field_for(&self, path: &PathPattern) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.matches(path))
    }

    /// Index time: every condition holds for the element's attributes
    pub fn conditions_hold(&self, attributes: &[(QName, String)]) -> bool {
        self.conditions.iter().all(|c| c.holds(attributes))
    }

    #[inline]
    pub fn targets_attribute(&self) -> bool {
        matches!(self.path.last(), Some(crate::path::Component::Name(q)) if q.is_attribute())
    }
}
