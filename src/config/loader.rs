//! Index Configuration Loader
//!
//! Reads a collection configuration document:
//!
//! ```xml
//! <collection xmlns="http://exist-db.org/collection-config/1.0">
//!   <index xmlns:mods="http://www.loc.gov/mods/v3">
//!     <range>
//!       <create qname="mods:title" type="xs:string" case="no"/>
//!       <create match="/root/entry">
//!         <condition attribute="type" value="main"/>
//!         <field name="name" match="name" whitespace="collapse"/>
//!       </create>
//!     </range>
//!   </index>
//! </collection>
//! ```
//!
//! A malformed `create` is reported and skipped; the rest of the set loads.

use tracing::{debug, warn};

use super::rule::{Condition, FieldType, IndexRule, Operator, TextOptions, WhitespaceTreatment};
use super::rule_set::IndexRuleSet;
use crate::core::{EventScanner, RawAttribute, ScanHandler};
use crate::error::{Error, Result};
use crate::path::namespaces::split_qualified;
use crate::path::{NameKind, NamespaceContext, PathPattern};

/// Outcome of loading one configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub rule_set: IndexRuleSet,
    /// One entry per skipped rule or structural problem
    pub errors: Vec<Error>,
}

/// Element of the configuration document with its in-scope prefixes
#[derive(Debug)]
struct ConfigElement {
    local: String,
    attrs: Vec<(String, String)>,
    namespaces: NamespaceContext,
    children: Vec<ConfigElement>,
}

impl ConfigElement {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a ConfigElement> + 'a {
        self.children.iter().filter(move |c| c.local == local)
    }
}

/// Builds the element tree from scan events
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<ConfigElement>,
    root: Option<ConfigElement>,
    errors: Vec<Error>,
}

impl TreeBuilder {
    fn close(&mut self, element: ConfigElement) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if self.root.is_none() => self.root = Some(element),
            None => self
                .errors
                .push(Error::Config(format!("content after document element: <{}>", element.local))),
        }
    }
}

impl ScanHandler for TreeBuilder {
    fn start_element(&mut self, name: &str, attrs: &[RawAttribute<'_>], is_empty: bool) {
        let mut namespaces = self
            .stack
            .last()
            .map(|parent| parent.namespaces.clone())
            .unwrap_or_default();

        let mut plain = Vec::with_capacity(attrs.len());
        for attr in attrs {
            match split_qualified(&attr.name) {
                (Some("xmlns"), prefix) => namespaces.declare(prefix, &attr.value),
                (None, "xmlns") => {}
                _ => plain.push((attr.name.to_string(), attr.value.to_string())),
            }
        }

        let element = ConfigElement {
            local: split_qualified(name).1.to_string(),
            attrs: plain,
            namespaces,
            children: Vec::new(),
        };
        if is_empty {
            self.close(element);
        } else {
            self.stack.push(element);
        }
    }

    fn end_element(&mut self, name: &str) {
        let local = split_qualified(name).1;
        match self.stack.pop() {
            Some(element) if element.local == local => self.close(element),
            Some(element) => {
                self.errors.push(Error::Config(format!(
                    "mismatched end tag </{}>, expected </{}>",
                    local, element.local
                )));
                self.close(element);
            }
            None => self.errors.push(Error::Config(format!("unexpected end tag </{}>", local))),
        }
    }

    fn text(&mut self, _text: &str) {}
}

/// Load the index rules configured for `collection` from an XML document
pub fn load_rule_set(collection: &str, xml: &[u8]) -> LoadReport {
    let mut builder = TreeBuilder::default();
    EventScanner::new(xml).scan(&mut builder);
    while let Some(open) = builder.stack.pop() {
        builder
            .errors
            .push(Error::Config(format!("unclosed element <{}>", open.local)));
        builder.close(open);
    }

    let mut errors = builder.errors;
    let mut rules = Vec::new();

    match builder.root {
        Some(root) if root.local == "collection" => {
            let creates = root
                .children_named("index")
                .flat_map(|index| index.children_named("range"))
                .flat_map(|range| range.children_named("create"));
            for create in creates {
                match build_rule(create) {
                    Ok(rule) => rules.push(rule),
                    Err(err) => {
                        warn!(collection, error = %err, "skipping index rule");
                        errors.push(err);
                    }
                }
            }
        }
        Some(root) => errors.push(Error::Config(format!(
            "expected <collection> document element, found <{}>",
            root.local
        ))),
        None => errors.push(Error::Config("empty configuration document".to_string())),
    }

    debug!(collection, rules = rules.len(), errors = errors.len(), "loaded index configuration");
    LoadReport {
        rule_set: IndexRuleSet::new(collection, rules),
        errors,
    }
}

fn build_rule(create: &ConfigElement) -> Result<IndexRule> {
    let ns = &create.namespaces;
    let path = match (create.attr("qname"), create.attr("match")) {
        (Some(qname), None) => PathPattern::parse(&format!("//{}", qname.trim()), false, ns)?,
        (None, Some(spec)) => rule_path(spec, ns)?,
        (Some(_), Some(_)) => {
            return Err(Error::Config("`create` takes either `qname` or `match`, not both".to_string()))
        }
        (None, None) => return Err(Error::Config("`create` needs a `qname` or `match`".to_string())),
    };

    let options = text_options(create, TextOptions::default())?;
    let mut rule = IndexRule::new(path).with_options(options);

    for condition in create.children_named("condition") {
        rule = rule.with_condition(build_condition(condition)?);
    }

    for field in create.children_named("field") {
        let name = field
            .attr("name")
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("field of `{}` has no name", rule.path)))?;
        let relative = field
            .attr("match")
            .map(|spec| PathPattern::parse(spec, false, &field.namespaces))
            .transpose()?;
        let field_options = text_options(field, options)?;
        rule = rule.with_field(name.trim(), relative.as_ref(), field_options);
    }

    if !rule.conditions.is_empty() && !rule.is_complex() {
        return Err(Error::Config(format!("conditions on `{}` require at least one field", rule.path)));
    }
    Ok(rule)
}

/// Absolute paths are kept; relative ones may start anywhere in the document
fn rule_path(spec: &str, ns: &NamespaceContext) -> Result<PathPattern> {
    let spec = spec.trim();
    if spec.starts_with('/') {
        PathPattern::parse(spec, false, ns)
    } else {
        PathPattern::parse(&format!("//{}", spec), false, ns)
    }
}

fn build_condition(element: &ConfigElement) -> Result<Condition> {
    let lexical = element
        .attr("attribute")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| Error::Config("condition has no `attribute`".to_string()))?;
    let lexical = lexical.strip_prefix('@').unwrap_or(lexical);
    let attribute = element
        .namespaces
        .qname(lexical, NameKind::Attribute)
        .ok_or_else(|| Error::Config(format!("unbound prefix in condition attribute `{}`", lexical)))?;
    let value = element
        .attr("value")
        .ok_or_else(|| Error::Config(format!("condition on `@{}` has no `value`", lexical)))?;

    let operator = match element.attr("operator") {
        None => Operator::Eq,
        Some(name) => match Operator::from_name(name.trim()) {
            Some(Operator::Matches) | None => {
                return Err(Error::Config(format!("unsupported condition operator `{}`", name)))
            }
            Some(op) => op,
        },
    };

    Ok(Condition::new(attribute, value)
        .with_operator(operator)
        .with_case_sensitive(flag(element, "case", true)?)
        .with_numeric(flag(element, "numeric", false)?))
}

/// Read text options, falling back to `inherited` for absent attributes
fn text_options(element: &ConfigElement, inherited: TextOptions) -> Result<TextOptions> {
    let whitespace = match element.attr("whitespace") {
        Some(name) => WhitespaceTreatment::from_name(name.trim())
            .ok_or_else(|| Error::Config(format!("unknown whitespace treatment `{}`", name)))?,
        None => inherited.whitespace,
    };
    let field_type = match element.attr("type") {
        Some(name) => {
            FieldType::from_name(name.trim()).ok_or_else(|| Error::Config(format!("unknown index type `{}`", name)))?
        }
        None => inherited.field_type,
    };
    Ok(TextOptions {
        whitespace,
        case_sensitive: flag(element, "case", inherited.case_sensitive)?,
        include_nested: flag(element, "nested", inherited.include_nested)?,
        field_type,
    })
}

fn flag(element: &ConfigElement, name: &str, default: bool) -> Result<bool> {
    match element.attr(name).map(str::trim) {
        None => Ok(default),
        Some("yes" | "true") => Ok(true),
        Some("no" | "false") => Ok(false),
        Some(other) => Err(Error::Config(format!("`{}` must be yes or no, found `{}`", name, other))),
    }
}
