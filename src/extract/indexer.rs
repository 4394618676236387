//! Document Indexer
//!
//! Walks a document once, keeping a single `PathPattern` cursor in step
//! with the element nesting, and feeds every node matched by a rule of the
//! collection into that rule's collector.

use std::sync::Arc;

use tracing::trace;

use crate::config::IndexRuleSet;
use crate::core::{EventScanner, RawAttribute, ScanHandler};
use crate::path::namespaces::split_qualified;
use crate::path::{Component, PathPattern, QName, ScopedNamespaces};

use super::collector::{ComplexTextCollector, SimpleTextCollector, TextCollector};
use super::field::Field;

/// Fields produced for one matched node
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedNode {
    /// Position of the rule in its rule set
    pub rule: usize,
    /// Location of the node in the document
    pub path: String,
    pub fields: Vec<Field>,
}

/// Reusable indexer for the documents of one collection
pub struct DocumentIndexer {
    rule_set: Arc<IndexRuleSet>,
    cursor: PathPattern,
    namespaces: ScopedNamespaces,
}

impl DocumentIndexer {
    pub fn new(rule_set: Arc<IndexRuleSet>) -> Self {
        DocumentIndexer {
            rule_set,
            cursor: PathPattern::new(),
            namespaces: ScopedNamespaces::new(),
        }
    }

    pub fn rule_set(&self) -> &Arc<IndexRuleSet> {
        &self.rule_set
    }

    /// Index one document; the cursor is reset first
    pub fn index(&mut self, xml: &[u8]) -> Vec<IndexedNode> {
        self.cursor.reset();
        self.namespaces.clear();
        if self.rule_set.is_empty() {
            return Vec::new();
        }

        let mut handler = IndexingHandler {
            rules: &self.rule_set,
            cursor: &mut self.cursor,
            namespaces: &mut self.namespaces,
            attrs: Vec::new(),
            active: Vec::new(),
            nodes: Vec::new(),
        };
        EventScanner::new(xml).scan(&mut handler);
        handler.close_all();

        trace!(collection = self.rule_set.collection(), nodes = handler.nodes.len(), "document indexed");
        handler.nodes
    }
}

/// Collector opened on a matched element
struct Active<'r> {
    rule: usize,
    depth: usize,
    path: String,
    collector: Box<dyn TextCollector + 'r>,
}

struct IndexingHandler<'r, 'c> {
    rules: &'r IndexRuleSet,
    cursor: &'c mut PathPattern,
    namespaces: &'c mut ScopedNamespaces,
    /// Resolved attributes of the current start tag
    attrs: Vec<(QName, String)>,
    active: Vec<Active<'r>>,
    nodes: Vec<IndexedNode>,
}

impl<'r> IndexingHandler<'r, '_> {
    fn open_collectors(&mut self, qname: &QName) {
        let rules: &'r IndexRuleSet = self.rules;
        for (index, rule) in rules.rules_for_node(self.cursor) {
            if !rule.conditions_hold(&self.attrs) {
                trace!(rule = index, path = %self.cursor, "rule conditions not met");
                continue;
            }
            let mut collector: Box<dyn TextCollector + 'r> = if rule.is_complex() {
                Box::new(ComplexTextCollector::new(rule))
            } else {
                Box::new(SimpleTextCollector::new(rule))
            };
            collector.start_element(qname, self.cursor);
            self.active.push(Active {
                rule: index,
                depth: self.cursor.len(),
                path: self.cursor.to_string(),
                collector,
            });
        }
    }

    fn dispatch_attributes(&mut self) {
        let rules: &'r IndexRuleSet = self.rules;
        for (qname, value) in &self.attrs {
            self.cursor.push_name(qname.clone());
            for active in &mut self.active {
                active.collector.attribute(qname, value, self.cursor);
            }
            for (index, rule) in rules.rules_for_node(self.cursor) {
                if rule.is_complex() {
                    continue;
                }
                self.nodes.push(IndexedNode {
                    rule: index,
                    path: self.cursor.to_string(),
                    fields: SimpleTextCollector::from_content(rule, value).finish(),
                });
            }
            self.cursor.pop();
        }
    }

    fn close_element(&mut self) {
        let Some(Component::Name(qname)) = self.cursor.last().cloned() else {
            return;
        };
        for active in &mut self.active {
            active.collector.end_element(&qname, self.cursor);
        }

        let depth = self.cursor.len();
        let split = self
            .active
            .iter()
            .position(|a| a.depth >= depth)
            .unwrap_or(self.active.len());
        for mut closing in self.active.split_off(split) {
            let fields = closing.collector.finish();
            if !fields.is_empty() {
                self.nodes.push(IndexedNode {
                    rule: closing.rule,
                    path: closing.path,
                    fields,
                });
            }
        }

        self.cursor.pop();
        self.namespaces.pop_scope();
    }

    /// Close elements left open at the end of input
    fn close_all(&mut self) {
        while !self.cursor.is_empty() {
            self.close_element();
        }
    }
}

impl ScanHandler for IndexingHandler<'_, '_> {
    fn start_element(&mut self, name: &str, attrs: &[RawAttribute<'_>], is_empty: bool) {
        self.namespaces.push_scope();
        for attr in attrs {
            match split_qualified(&attr.name) {
                (None, "xmlns") => self.namespaces.declare("", &attr.value),
                (Some("xmlns"), prefix) => self.namespaces.declare(prefix, &attr.value),
                _ => {}
            }
        }

        let qname = self.namespaces.element(name);
        self.cursor.push_name(qname.clone());

        self.attrs.clear();
        for attr in attrs {
            if matches!(split_qualified(&attr.name), (None, "xmlns") | (Some("xmlns"), _)) {
                continue;
            }
            let attr_name = self.namespaces.attribute(&attr.name);
            self.attrs.push((attr_name, attr.value.to_string()));
        }

        for active in &mut self.active {
            active.collector.start_element(&qname, self.cursor);
        }
        self.open_collectors(&qname);
        self.dispatch_attributes();

        if is_empty {
            self.close_element();
        }
    }

    fn end_element(&mut self, _name: &str) {
        self.close_element();
    }

    fn text(&mut self, text: &str) {
        for active in &mut self.active {
            active.collector.characters(text, self.cursor);
        }
    }
}
