//! Text Collectors
//!
//! A collector receives the structural events of one indexed subtree and
//! turns them into fields. The document indexer opens one per matched
//! node and finishes it when the node closes.

use crate::config::{FieldDef, IndexRule, TextOptions};
use crate::path::{PathPattern, QName};

use super::field::Field;

/// Consumer of the events inside an indexed node
///
/// `path` is always the current location: the element for element and
/// text events, the element followed by `@name` for attributes.
pub trait TextCollector {
    fn start_element(&mut self, qname: &QName, path: &PathPattern);

    fn end_element(&mut self, qname: &QName, path: &PathPattern);

    fn characters(&mut self, text: &str, path: &PathPattern);

    fn attribute(&mut self, qname: &QName, value: &str, path: &PathPattern);

    /// Named fields (complex rules) rather than the node's own text
    fn has_fields(&self) -> bool;

    /// Take the fields gathered so far
    fn finish(&mut self) -> Vec<Field>;
}

/// Collects the text of a simple rule's node
pub struct SimpleTextCollector<'r> {
    path: &'r PathPattern,
    options: TextOptions,
    buf: String,
}

impl<'r> SimpleTextCollector<'r> {
    pub fn new(rule: &'r IndexRule) -> Self {
        SimpleTextCollector {
            path: &rule.path,
            options: rule.options,
            buf: String::new(),
        }
    }

    /// Collector already holding `content`, used for attribute values
    pub fn from_content(rule: &'r IndexRule, content: &str) -> Self {
        let mut collector = Self::new(rule);
        collector.buf.push_str(content);
        collector
    }
}

impl TextCollector for SimpleTextCollector<'_> {
    fn start_element(&mut self, _qname: &QName, _path: &PathPattern) {}

    fn end_element(&mut self, _qname: &QName, _path: &PathPattern) {}

    fn characters(&mut self, text: &str, path: &PathPattern) {
        if self.options.include_nested || self.path.matches(path) {
            self.buf.push_str(text);
        }
    }

    fn attribute(&mut self, _qname: &QName, _value: &str, _path: &PathPattern) {}

    fn has_fields(&self) -> bool {
        false
    }

    fn finish(&mut self) -> Vec<Field> {
        vec![Field::new(None, std::mem::take(&mut self.buf), self.options)]
    }
}

/// Field currently being accumulated
struct OpenField<'r> {
    def: &'r FieldDef,
    /// Path length of the element that opened it
    depth: usize,
    buf: String,
}

/// Collects the named fields of a complex rule
pub struct ComplexTextCollector<'r> {
    rule: &'r IndexRule,
    open: Vec<OpenField<'r>>,
    fields: Vec<Field>,
}

impl<'r> ComplexTextCollector<'r> {
    pub fn new(rule: &'r IndexRule) -> Self {
        ComplexTextCollector {
            rule,
            open: Vec::new(),
            fields: Vec::new(),
        }
    }

    fn emit(&mut self, def: &FieldDef, content: String) {
        if !content.is_empty() {
            self.fields.push(Field::new(Some(&def.name), content, def.options));
        }
    }
}

impl TextCollector for ComplexTextCollector<'_> {
    fn start_element(&mut self, _qname: &QName, path: &PathPattern) {
        let rule = self.rule;
        for def in rule.fields.iter().filter(|f| !f.targets_attribute()) {
            if def.matches(path) {
                self.open.push(OpenField {
                    def,
                    depth: path.len(),
                    buf: String::new(),
                });
            }
        }
    }

    fn end_element(&mut self, _qname: &QName, path: &PathPattern) {
        while self.open.last().is_some_and(|f| f.depth >= path.len()) {
            if let Some(field) = self.open.pop() {
                self.emit(field.def, field.buf);
            }
        }
    }

    fn characters(&mut self, text: &str, path: &PathPattern) {
        for field in &mut self.open {
            if field.def.options.include_nested || field.depth == path.len() {
                field.buf.push_str(text);
            }
        }
    }

    fn attribute(&mut self, _qname: &QName, value: &str, path: &PathPattern) {
        let rule = self.rule;
        for def in rule.fields.iter().filter(|f| f.targets_attribute()) {
            if def.matches(path) {
                self.emit(def, value.to_string());
            }
        }
    }

    fn has_fields(&self) -> bool {
        true
    }

    fn finish(&mut self) -> Vec<Field> {
        while let Some(field) = self.open.pop() {
            self.emit(field.def, field.buf);
        }
        std::mem::take(&mut self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WhitespaceTreatment;

    fn path(spec: &str) -> PathPattern {
        PathPattern::from_str(spec, false).unwrap()
    }

    #[test]
    fn test_simple_nested_text() {
        let rule = IndexRule::new(path("//title"));
        let mut collector = SimpleTextCollector::new(&rule);
        collector.characters("The ", &path("/a/title"));
        collector.characters("Hobbit", &path("/a/title/em"));
        assert!(!collector.has_fields());
        assert_eq!(collector.finish()[0].content, "The Hobbit");
    }

    #[test]
    fn test_simple_direct_text_only() {
        let options = TextOptions {
            include_nested: false,
            ..TextOptions::default()
        };
        let rule = IndexRule::new(path("//title")).with_options(options);
        let mut collector = SimpleTextCollector::new(&rule);
        collector.characters("The ", &path("/a/title"));
        collector.characters("Hobbit", &path("/a/title/em"));
        assert_eq!(collector.finish()[0].content, "The ");
    }

    #[test]
    fn test_from_content_single_field() {
        let rule = IndexRule::new(path("//a/@id"));
        let fields = SimpleTextCollector::from_content(&rule, "").finish();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, None);
    }

    #[test]
    fn test_complex_fields() {
        let collapse = TextOptions {
            whitespace: WhitespaceTreatment::Collapse,
            ..TextOptions::default()
        };
        let rule = IndexRule::new(path("//entry"))
            .with_field("name", Some(&path("name")), collapse)
            .with_field("kind", Some(&path("@kind")), TextOptions::default())
            .with_field("empty", Some(&path("note")), TextOptions::default());
        let mut collector = ComplexTextCollector::new(&rule);
        let entry = QName::element("entry");
        let name = QName::element("name");

        collector.start_element(&entry, &path("/r/entry"));
        collector.attribute(&QName::attribute("kind"), "main", &path("/r/entry/@kind"));
        collector.start_element(&name, &path("/r/entry/name"));
        collector.characters(" Bilbo ", &path("/r/entry/name"));
        collector.characters("Baggins", &path("/r/entry/name/b"));
        collector.end_element(&name, &path("/r/entry/name"));
        collector.start_element(&QName::element("note"), &path("/r/entry/note"));
        collector.end_element(&QName::element("note"), &path("/r/entry/note"));
        collector.end_element(&entry, &path("/r/entry"));

        assert!(collector.has_fields());
        let fields = collector.finish();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name.as_deref(), Some("kind"));
        assert_eq!(fields[1].name.as_deref(), Some("name"));
        assert_eq!(fields[1].value(), "Bilbo Baggins");
    }
}
