//! Extracted field values

use std::borrow::Cow;

use crate::config::{FieldType, TextOptions};

/// Text gathered for one index entry
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// `None` for the unnamed field of a simple rule
    pub name: Option<String>,
    pub content: String,
    pub options: TextOptions,
}

impl Field {
    pub fn new(name: Option<&str>, content: String, options: TextOptions) -> Self {
        Field {
            name: name.map(str::to_string),
            content,
            options,
        }
    }

    /// Content as it is indexed: whitespace treatment first, then case folding
    pub fn value(&self) -> Cow<'_, str> {
        let text = self.options.whitespace.apply(&self.content);
        if self.options.case_sensitive {
            text
        } else {
            Cow::Owned(text.to_lowercase())
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.options.field_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WhitespaceTreatment;

    #[test]
    fn test_value_treatment() {
        let options = TextOptions {
            whitespace: WhitespaceTreatment::Collapse,
            case_sensitive: false,
            ..TextOptions::default()
        };
        let field = Field::new(Some("title"), "  The  Hobbit\n".to_string(), options);
        assert_eq!(field.value(), "the hobbit");

        let raw = Field::new(None, " A ".to_string(), TextOptions::default());
        assert!(matches!(raw.value(), Cow::Borrowed(" A ")));
    }
}
