//! Rich text attributes
//!
//! Maps the string-keyed attribute dictionaries used by platform text
//! renderers (`NSFont`, `NSColor`, ...) onto a typed `Attribute` enum and
//! back. Values are carried as JSON so a dictionary can cross the
//! presentation boundary unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attribute parsing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributeError {
    #[error("Unknown attribute name: {0}")]
    UnknownName(String),

    #[error("Invalid value for {name}: expected {expected}")]
    InvalidValue { name: &'static str, expected: &'static str },
}

/// RGBA colour with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    #[serde(default = "opaque")]
    pub alpha: f64,
}

fn opaque() -> f64 {
    1.0
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);

    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 1.0,
        }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok().map(|v| v as f64 / 255.0);
        Some(Self {
            red: channel(0)?,
            green: channel(2)?,
            blue: channel(4)?,
            alpha: if digits.len() == 8 { channel(6)? } else { 1.0 },
        })
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(hex) => Self::from_hex(hex),
            other => serde_json::from_value(other.clone()).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub name: String,
    pub size: f64,
}

/// Inline attachment, referenced by file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAttachment {
    pub file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlignment {
    Left,
    Center,
    Right,
    Justified,
    Natural,
}

impl Default for TextAlignment {
    fn default() -> Self {
        Self::Natural
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParagraphStyle {
    pub alignment: TextAlignment,
    pub line_spacing: f64,
    pub paragraph_spacing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur_radius: f64,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ligatures {
    None = 0,
    Default = 1,
    All = 2,
}

impl Ligatures {
    fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Ligatures::None),
            1 => Some(Ligatures::Default),
            2 => Some(Ligatures::All),
            _ => None,
        }
    }
}

/// Underline/strikethrough style bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStyle(pub u32);

impl LineStyle {
    pub const NONE: LineStyle = LineStyle(0x00);
    pub const SINGLE: LineStyle = LineStyle(0x01);
    pub const THICK: LineStyle = LineStyle(0x02);
    pub const DOUBLE: LineStyle = LineStyle(0x09);
    pub const PATTERN_DOT: LineStyle = LineStyle(0x0100);
    pub const PATTERN_DASH: LineStyle = LineStyle(0x0200);
    pub const BY_WORD: LineStyle = LineStyle(0x8000);

    pub fn contains(self, other: LineStyle) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LineStyle {
    type Output = LineStyle;

    fn bitor(self, rhs: LineStyle) -> LineStyle {
        LineStyle(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEffect {
    Letterpress,
}

impl TextEffect {
    const LETTERPRESS: &'static str = "_UIKitNewLetterpressStyle";

    fn raw(self) -> &'static str {
        match self {
            TextEffect::Letterpress => Self::LETTERPRESS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritingDirection {
    LeftToRightEmbedding = 0,
    RightToLeftEmbedding = 1,
    LeftToRightOverride = 2,
    RightToLeftOverride = 3,
}

impl WritingDirection {
    fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(WritingDirection::LeftToRightEmbedding),
            1 => Some(WritingDirection::RightToLeftEmbedding),
            2 => Some(WritingDirection::LeftToRightOverride),
            3 => Some(WritingDirection::RightToLeftOverride),
            _ => None,
        }
    }
}

/// Attribute keys, one per `Attribute` variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeName {
    Attachment,
    BaselineOffset,
    BackgroundColor,
    Expansion,
    Font,
    Kern,
    Ligature,
    Link,
    Obliqueness,
    ParagraphStyle,
    Shadow,
    StrokeColor,
    StrokeWidth,
    StrikethroughColor,
    StrikethroughStyle,
    TextColor,
    TextEffect,
    UnderlineColor,
    UnderlineStyle,
    WritingDirection,
}

impl AttributeName {
    pub const ALL: [AttributeName; 20] = [
        AttributeName::Attachment,
        AttributeName::BaselineOffset,
        AttributeName::BackgroundColor,
        AttributeName::Expansion,
        AttributeName::Font,
        AttributeName::Kern,
        AttributeName::Ligature,
        AttributeName::Link,
        AttributeName::Obliqueness,
        AttributeName::ParagraphStyle,
        AttributeName::Shadow,
        AttributeName::StrokeColor,
        AttributeName::StrokeWidth,
        AttributeName::StrikethroughColor,
        AttributeName::StrikethroughStyle,
        AttributeName::TextColor,
        AttributeName::TextEffect,
        AttributeName::UnderlineColor,
        AttributeName::UnderlineStyle,
        AttributeName::WritingDirection,
    ];

    /// Dictionary key used by the platform text system
    pub fn key_name(self) -> &'static str {
        match self {
            AttributeName::Attachment => "NSAttachment",
            AttributeName::BaselineOffset => "NSBaselineOffset",
            AttributeName::BackgroundColor => "NSBackgroundColor",
            AttributeName::Expansion => "NSExpansion",
            AttributeName::Font => "NSFont",
            AttributeName::Kern => "NSKern",
            AttributeName::Ligature => "NSLigature",
            AttributeName::Link => "NSLink",
            AttributeName::Obliqueness => "NSObliqueness",
            AttributeName::ParagraphStyle => "NSParagraphStyle",
            AttributeName::Shadow => "NSShadow",
            AttributeName::StrokeColor => "NSStrokeColor",
            AttributeName::StrokeWidth => "NSStrokeWidth",
            AttributeName::StrikethroughColor => "NSStrikethroughColor",
            AttributeName::StrikethroughStyle => "NSStrikethrough",
            AttributeName::TextColor => "NSColor",
            AttributeName::TextEffect => "NSTextEffect",
            AttributeName::UnderlineColor => "NSUnderlineColor",
            AttributeName::UnderlineStyle => "NSUnderline",
            AttributeName::WritingDirection => "NSWritingDirection",
        }
    }
}

impl FromStr for AttributeName {
    type Err = AttributeError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        AttributeName::ALL
            .iter()
            .copied()
            .find(|name| name.key_name() == key)
            .ok_or_else(|| AttributeError::UnknownName(key.to_string()))
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_name())
    }
}

/// A typed text attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Attachment(TextAttachment),
    BaselineOffset(f64),
    BackgroundColor(Color),
    Expansion(f64),
    Font(Font),
    Kern(f64),
    Ligatures(Ligatures),
    Link(String),
    Obliqueness(f64),
    ParagraphStyle(ParagraphStyle),
    Shadow(Shadow),
    StrokeColor(Color),
    StrokeWidth(f64),
    StrikethroughColor(Color),
    StrikethroughStyle(LineStyle),
    TextColor(Color),
    TextEffect(TextEffect),
    UnderlineColor(Color),
    UnderlineStyle(LineStyle),
    WritingDirections(Vec<WritingDirection>),
}

fn number(name: AttributeName, value: &Value) -> Result<f64, AttributeError> {
    value.as_f64().ok_or(AttributeError::InvalidValue {
        name: name.key_name(),
        expected: "a number",
    })
}

fn color(name: AttributeName, value: &Value) -> Result<Color, AttributeError> {
    Color::from_value(value).ok_or(AttributeError::InvalidValue {
        name: name.key_name(),
        expected: "a colour object or #RRGGBB[AA] string",
    })
}

fn line_style(name: AttributeName, value: &Value) -> Result<LineStyle, AttributeError> {
    value
        .as_u64()
        .and_then(|raw| u32::try_from(raw).ok())
        .map(LineStyle)
        .ok_or(AttributeError::InvalidValue {
            name: name.key_name(),
            expected: "a style bitmask",
        })
}

fn object<T: serde::de::DeserializeOwned>(
    name: AttributeName,
    value: &Value,
    expected: &'static str,
) -> Result<T, AttributeError> {
    serde_json::from_value(value.clone()).map_err(|_| AttributeError::InvalidValue {
        name: name.key_name(),
        expected,
    })
}

impl Attribute {
    /// Build an attribute from one dictionary entry
    pub fn from_entry(key: &str, value: &Value) -> Result<Self, AttributeError> {
        let name: AttributeName = key.parse()?;
        Self::from_name(name, value)
    }

    pub fn from_name(name: AttributeName, value: &Value) -> Result<Self, AttributeError> {
        let attribute = match name {
            AttributeName::Attachment => Attribute::Attachment(object(name, value, "an attachment object")?),
            AttributeName::BaselineOffset => Attribute::BaselineOffset(number(name, value)?),
            AttributeName::BackgroundColor => Attribute::BackgroundColor(color(name, value)?),
            AttributeName::Expansion => Attribute::Expansion(number(name, value)?),
            AttributeName::Font => Attribute::Font(object(name, value, "a font object")?),
            AttributeName::Kern => Attribute::Kern(number(name, value)?),
            AttributeName::Ligature => Attribute::Ligatures(
                value
                    .as_i64()
                    .and_then(Ligatures::from_raw)
                    .ok_or(AttributeError::InvalidValue {
                        name: name.key_name(),
                        expected: "0, 1 or 2",
                    })?,
            ),
            AttributeName::Link => Attribute::Link(
                value
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .ok_or(AttributeError::InvalidValue {
                        name: name.key_name(),
                        expected: "a URL string",
                    })?,
            ),
            AttributeName::Obliqueness => Attribute::Obliqueness(number(name, value)?),
            AttributeName::ParagraphStyle => {
                Attribute::ParagraphStyle(object(name, value, "a paragraph style object")?)
            }
            AttributeName::Shadow => Attribute::Shadow(object(name, value, "a shadow object")?),
            AttributeName::StrokeColor => Attribute::StrokeColor(color(name, value)?),
            AttributeName::StrokeWidth => Attribute::StrokeWidth(number(name, value)?),
            AttributeName::StrikethroughColor => Attribute::StrikethroughColor(color(name, value)?),
            AttributeName::StrikethroughStyle => Attribute::StrikethroughStyle(line_style(name, value)?),
            AttributeName::TextColor => Attribute::TextColor(color(name, value)?),
            AttributeName::TextEffect => match value.as_str() {
                Some(TextEffect::LETTERPRESS) => Attribute::TextEffect(TextEffect::Letterpress),
                _ => {
                    return Err(AttributeError::InvalidValue {
                        name: name.key_name(),
                        expected: "a known text effect",
                    })
                }
            },
            AttributeName::UnderlineColor => Attribute::UnderlineColor(color(name, value)?),
            AttributeName::UnderlineStyle => Attribute::UnderlineStyle(line_style(name, value)?),
            AttributeName::WritingDirection => {
                let invalid = AttributeError::InvalidValue {
                    name: name.key_name(),
                    expected: "an array of writing directions",
                };
                let directions = value
                    .as_array()
                    .ok_or_else(|| invalid.clone())?
                    .iter()
                    .map(|raw| raw.as_i64().and_then(WritingDirection::from_raw))
                    .collect::<Option<Vec<_>>>()
                    .ok_or(invalid)?;
                Attribute::WritingDirections(directions)
            }
        };
        Ok(attribute)
    }

    pub fn name(&self) -> AttributeName {
        match self {
            Attribute::Attachment(_) => AttributeName::Attachment,
            Attribute::BaselineOffset(_) => AttributeName::BaselineOffset,
            Attribute::BackgroundColor(_) => AttributeName::BackgroundColor,
            Attribute::Expansion(_) => AttributeName::Expansion,
            Attribute::Font(_) => AttributeName::Font,
            Attribute::Kern(_) => AttributeName::Kern,
            Attribute::Ligatures(_) => AttributeName::Ligature,
            Attribute::Link(_) => AttributeName::Link,
            Attribute::Obliqueness(_) => AttributeName::Obliqueness,
            Attribute::ParagraphStyle(_) => AttributeName::ParagraphStyle,
            Attribute::Shadow(_) => AttributeName::Shadow,
            Attribute::StrokeColor(_) => AttributeName::StrokeColor,
            Attribute::StrokeWidth(_) => AttributeName::StrokeWidth,
            Attribute::StrikethroughColor(_) => AttributeName::StrikethroughColor,
            Attribute::StrikethroughStyle(_) => AttributeName::StrikethroughStyle,
            Attribute::TextColor(_) => AttributeName::TextColor,
            Attribute::TextEffect(_) => AttributeName::TextEffect,
            Attribute::UnderlineColor(_) => AttributeName::UnderlineColor,
            Attribute::UnderlineStyle(_) => AttributeName::UnderlineStyle,
            Attribute::WritingDirections(_) => AttributeName::WritingDirection,
        }
    }

    pub fn key_name(&self) -> &'static str {
        self.name().key_name()
    }

    /// Dictionary value in the form `from_entry` accepts.
    ///
    /// Enumerations are written as their raw platform values.
    pub fn value(&self) -> Value {
        match self {
            Attribute::Attachment(attachment) => json!(attachment),
            Attribute::BaselineOffset(v)
            | Attribute::Expansion(v)
            | Attribute::Kern(v)
            | Attribute::Obliqueness(v)
            | Attribute::StrokeWidth(v) => json!(v),
            Attribute::BackgroundColor(c)
            | Attribute::StrokeColor(c)
            | Attribute::StrikethroughColor(c)
            | Attribute::TextColor(c)
            | Attribute::UnderlineColor(c) => json!(c),
            Attribute::Font(font) => json!(font),
            Attribute::Ligatures(ligatures) => json!(*ligatures as i64),
            Attribute::Link(url) => json!(url),
            Attribute::ParagraphStyle(style) => json!(style),
            Attribute::Shadow(shadow) => json!(shadow),
            Attribute::StrikethroughStyle(style) | Attribute::UnderlineStyle(style) => json!(style.0),
            Attribute::TextEffect(effect) => json!(effect.raw()),
            Attribute::WritingDirections(directions) => {
                json!(directions.iter().map(|d| *d as i64).collect::<Vec<_>>())
            }
        }
    }
}

/// Convert a whole attribute dictionary
pub fn parse_attributes(dictionary: &Map<String, Value>) -> Result<Vec<Attribute>, AttributeError> {
    dictionary
        .iter()
        .map(|(key, value)| Attribute::from_entry(key, value))
        .collect()
}

/// Build a dictionary from typed attributes; later entries win on duplicate keys
pub fn to_dictionary(attributes: &[Attribute]) -> Map<String, Value> {
    attributes
        .iter()
        .map(|attribute| (attribute.key_name().to_string(), attribute.value()))
        .collect()
}
