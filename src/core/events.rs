//! Event Scanner with ScanHandler Trait
//!
//! Drives a `ScanHandler` over a document: start tags with decoded
//! attributes, end tags and character data. Comments, processing
//! instructions and DOCTYPE are consumed silently. The scanner is lenient;
//! markup it cannot read is treated as text.

use std::borrow::Cow;

use super::entities::decode_str;
use super::scanner::{is_name_start_char, Scanner};

/// Attribute as written in a start tag, value entity-decoded
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute<'a> {
    pub name: Cow<'a, str>,
    pub value: Cow<'a, str>,
}

/// Receiver of document events
pub trait ScanHandler {
    /// `is_empty` is set for self-closing tags; no `end_element` follows them
    fn start_element(&mut self, name: &str, attrs: &[RawAttribute<'_>], is_empty: bool);

    fn end_element(&mut self, name: &str);

    /// Character data, entity-decoded (CDATA sections arrive verbatim)
    fn text(&mut self, text: &str);
}

/// Scanner dispatching events to a `ScanHandler`
pub struct EventScanner<'a> {
    scanner: Scanner<'a>,
    /// Reused between start tags
    attrs_buf: Vec<RawAttribute<'a>>,
}

impl<'a> EventScanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        EventScanner {
            scanner: Scanner::new(input),
            attrs_buf: Vec::with_capacity(8),
        }
    }

    /// Scan the whole input
    pub fn scan<H: ScanHandler>(&mut self, handler: &mut H) {
        while let Some(b) = self.scanner.peek() {
            if b == b'<' {
                self.scan_markup(handler);
            } else {
                self.scan_text(handler);
            }
        }
    }

    fn scan_markup<H: ScanHandler>(&mut self, handler: &mut H) {
        self.scanner.advance(1);

        match self.scanner.peek() {
            Some(b'/') => {
                self.scanner.advance(1);
                self.scan_end_tag(handler);
            }
            Some(b'!') => {
                self.scanner.advance(1);
                if self.scanner.starts_with(b"--") {
                    self.scanner.advance(2);
                    self.scanner.take_until(b"-->");
                } else if self.scanner.starts_with(b"[CDATA[") {
                    self.scanner.advance(7);
                    let content = self.scanner.take_until(b"]]>");
                    handler.text(&String::from_utf8_lossy(content));
                } else {
                    self.skip_doctype();
                }
            }
            Some(b'?') => {
                self.scanner.take_until(b"?>");
            }
            Some(c) if is_name_start_char(c) => self.scan_start_tag(handler),
            _ => handler.text("<"),
        }
    }

    fn scan_start_tag<H: ScanHandler>(&mut self, handler: &mut H) {
        let Some(name) = self.scanner.read_name() else {
            return;
        };
        let name = String::from_utf8_lossy(name);

        self.attrs_buf.clear();
        self.scanner.skip_whitespace();

        while let Some(b) = self.scanner.peek() {
            match b {
                b'>' => {
                    self.scanner.advance(1);
                    handler.start_element(&name, &self.attrs_buf, false);
                    return;
                }
                b'/' if self.scanner.peek_at(1) == Some(b'>') => {
                    self.scanner.advance(2);
                    handler.start_element(&name, &self.attrs_buf, true);
                    return;
                }
                c if is_name_start_char(c) => {
                    if let Some(attr) = self.scan_attribute() {
                        self.attrs_buf.push(attr);
                    }
                }
                _ => self.scanner.advance(1),
            }
            self.scanner.skip_whitespace();
        }

        // Unterminated start tag at end of input
        handler.start_element(&name, &self.attrs_buf, true);
    }

    fn scan_attribute(&mut self) -> Option<RawAttribute<'a>> {
        let name = self.scanner.read_name()?;
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'=') {
            return None;
        }
        self.scanner.advance(1);
        self.scanner.skip_whitespace();

        let quote = self.scanner.peek().filter(|q| matches!(q, b'"' | b'\''))?;
        self.scanner.advance(1);
        let start = self.scanner.position();
        let end = self.scanner.find_byte(quote).unwrap_or(usize::MAX);
        let value = self.scanner.slice(start, end);
        self.scanner.set_position(end.saturating_add(1));

        Some(RawAttribute {
            name: String::from_utf8_lossy(name),
            value: decode_str(value),
        })
    }

    fn scan_end_tag<H: ScanHandler>(&mut self, handler: &mut H) {
        self.scanner.skip_whitespace();
        let Some(name) = self.scanner.read_name() else {
            self.skip_to_tag_end();
            return;
        };
        self.skip_to_tag_end();
        handler.end_element(&String::from_utf8_lossy(name));
    }

    fn scan_text<H: ScanHandler>(&mut self, handler: &mut H) {
        let start = self.scanner.position();
        let end = self.scanner.find_byte(b'<').unwrap_or(usize::MAX);
        let raw = self.scanner.slice(start, end);
        self.scanner.set_position(end);
        if !raw.is_empty() {
            handler.text(&decode_str(raw));
        }
    }

    /// DOCTYPE, including an internal subset
    fn skip_doctype(&mut self) {
        let mut depth = 0usize;
        while let Some(b) = self.scanner.peek() {
            self.scanner.advance(1);
            match b {
                b'[' => depth += 1,
                b']' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return,
                _ => {}
            }
        }
    }

    fn skip_to_tag_end(&mut self) {
        let end = self.scanner.find_tag_end_quoted().map_or(usize::MAX, |pos| pos + 1);
        self.scanner.set_position(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ScanHandler for Recorder {
        fn start_element(&mut self, name: &str, attrs: &[RawAttribute<'_>], is_empty: bool) {
            let attrs: Vec<String> = attrs.iter().map(|a| format!("{}={}", a.name, a.value)).collect();
            let slash = if is_empty { "/" } else { "" };
            self.events.push(format!("<{}{}{}>", name, attrs.join(","), slash));
        }

        fn end_element(&mut self, name: &str) {
            self.events.push(format!("</{}>", name));
        }

        fn text(&mut self, text: &str) {
            self.events.push(text.to_string());
        }
    }

    fn scan(input: &str) -> Vec<String> {
        let mut recorder = Recorder::default();
        EventScanner::new(input.as_bytes()).scan(&mut recorder);
        recorder.events
    }

    #[test]
    fn test_elements_and_text() {
        assert_eq!(
            scan("<a><b x='1' y=\"&lt;2\">hi &amp; bye</b><c/></a>"),
            vec!["<a>", "<bx=1,y=<2>", "hi & bye", "</b>", "<c/>", "</a>"]
        );
    }

    #[test]
    fn test_skips_prolog_and_comments() {
        let events = scan("<?xml version='1.0'?><!DOCTYPE a [<!ENTITY e 'x'>]><!-- c --><a>t</a>");
        assert_eq!(events, vec!["<a>", "t", "</a>"]);
    }

    #[test]
    fn test_cdata_verbatim() {
        assert_eq!(scan("<a><![CDATA[x &amp; <y>]]></a>"), vec!["<a>", "x &amp; <y>", "</a>"]);
    }

    #[test]
    fn test_invalid_markup_as_text() {
        assert_eq!(scan("<a>1 <2</a>"), vec!["<a>", "1 ", "<", "2", "</a>"]);
    }
}
