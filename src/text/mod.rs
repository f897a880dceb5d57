//! Styled text for captions shown over the camera

pub mod attribute;

pub use attribute::{parse_attributes, to_dictionary, Attribute, AttributeError, AttributeName, Color};

use serde_json::{Map, Value};

/// A string with attributes applied to its whole range
#[derive(Debug, Clone, PartialEq)]
pub struct StyledText {
    pub text: String,
    pub attributes: Vec<Attribute>,
}

impl StyledText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute, replacing any existing one with the same name
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.retain(|a| a.name() != attribute.name());
        self.attributes.push(attribute);
        self
    }

    pub fn with_text_color(self, color: Color) -> Self {
        self.with_attribute(Attribute::TextColor(color))
    }

    pub fn text_color(&self) -> Option<Color> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::TextColor(color) => Some(*color),
            _ => None,
        })
    }

    pub fn attribute_dictionary(&self) -> Map<String, Value> {
        to_dictionary(&self.attributes)
    }

    /// Caption for the question being answered on camera
    pub fn prompt(asker: &str, question: &str) -> Self {
        Self::new(format!("{asker} asked: \n {question}")).with_text_color(Color::WHITE)
    }
}
