//! Topic and condition templates
//!
//! Topic templates are parsed once into literal and placeholder segments and
//! rendered against a set of bindings. Condition templates (`static`,
//! `dynamic`, `filter`) only know the range placeholders `{v}` and `{v_plus}`.

use crate::types::DimensionKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Rendered text of a wildcard binding
pub const WILDCARD: &str = "+";

/// Template parsing and rendering errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A `{` without a matching `}`
    #[error("Unclosed placeholder at position {position} in template '{template}'")]
    UnclosedPlaceholder {
        /// Template text
        template: String,
        /// Byte offset of the opening brace
        position: usize,
    },

    /// A `}` without a matching `{`
    #[error("Unexpected '}}' at position {position} in template '{template}'")]
    UnexpectedClose {
        /// Template text
        template: String,
        /// Byte offset of the closing brace
        position: usize,
    },

    /// A placeholder name that is not a dimension
    #[error("Unknown placeholder {{{name}}} in template '{template}'")]
    UnknownPlaceholder {
        /// Template text
        template: String,
        /// Placeholder name
        name: String,
    },

    /// `{v_plus}` has no successor for the range value
    #[error("Range value {value} has no successor for {{v_plus}} in '{template}'")]
    ValueOverflow {
        /// Condition text
        template: String,
        /// Range value
        value: i64,
    },

    /// Rendering found no binding for a placeholder
    #[error("Placeholder {{{placeholder}}} in template '{template}' has no binding")]
    Unresolved {
        /// Template text
        template: String,
        /// Placeholder name
        placeholder: String,
    },
}

/// A piece of a parsed topic template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim
    Literal(String),
    /// A dimension placeholder
    Placeholder(DimensionKind),
}

/// A parsed topic template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl TopicTemplate {
    /// Parse a template such as `{b}/{fl}/{r}/{dev}/#`
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => break,
                            other => name.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedPlaceholder {
                            template: source.to_string(),
                            position,
                        });
                    }
                    let kind = DimensionKind::from_placeholder(&name).ok_or_else(|| {
                        TemplateError::UnknownPlaceholder { template: source.to_string(), name }
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(kind));
                }
                '}' => {
                    return Err(TemplateError::UnexpectedClose {
                        template: source.to_string(),
                        position,
                    });
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source: source.to_string(), segments })
    }

    /// Original template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Dimensions referenced by the template
    pub fn placeholders(&self) -> BTreeSet<DimensionKind> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(kind) => Some(*kind),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Whether the template references a dimension
    pub fn references(&self, kind: DimensionKind) -> bool {
        self.segments.iter().any(|segment| *segment == Segment::Placeholder(kind))
    }

    /// Render the template and normalize the resulting topic
    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(kind) => match bindings.get(*kind) {
                    Some(binding) => out.push_str(binding.as_str()),
                    None => {
                        return Err(TemplateError::Unresolved {
                            template: self.source.clone(),
                            placeholder: kind.placeholder().to_string(),
                        })
                    }
                },
            }
        }
        Ok(normalize_topic(&out))
    }
}

impl fmt::Display for TopicTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Collapse empty topic levels, strip outer slashes, and map an empty topic to `#`
pub fn normalize_topic(topic: &str) -> String {
    let mut normalized = topic.to_string();
    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }
    let trimmed = normalized.trim_matches('/');
    if trimmed.is_empty() {
        "#".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Value bound to a placeholder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    /// A concrete dimension value
    Value(String),
    /// Any value (`+`)
    Wildcard,
}

impl Binding {
    /// Text substituted into the topic
    pub fn as_str(&self) -> &str {
        match self {
            Binding::Value(value) => value,
            Binding::Wildcard => WILDCARD,
        }
    }

    /// Whether this binding is a non-empty concrete value
    pub fn is_concrete(&self) -> bool {
        matches!(self, Binding::Value(value) if !value.is_empty())
    }
}

/// Placeholder bindings of one rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bindings(BTreeMap<DimensionKind, Binding>);

impl Bindings {
    /// Create empty bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a dimension to a concrete value
    pub fn bind(&mut self, kind: DimensionKind, value: impl Into<String>) {
        self.0.insert(kind, Binding::Value(value.into()));
    }

    /// Bind a dimension to the wildcard
    pub fn bind_wildcard(&mut self, kind: DimensionKind) {
        self.0.insert(kind, Binding::Wildcard);
    }

    /// Builder form of [`Bindings::bind`]
    pub fn with(mut self, kind: DimensionKind, value: impl Into<String>) -> Self {
        self.bind(kind, value);
        self
    }

    /// Binding of a dimension
    pub fn get(&self, kind: DimensionKind) -> Option<&Binding> {
        self.0.get(&kind)
    }

    /// Concrete value bound to a dimension
    pub fn value(&self, kind: DimensionKind) -> Option<&str> {
        match self.0.get(&kind) {
            Some(Binding::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Replace a concrete binding by the wildcard
    ///
    /// Returns false when the dimension holds no concrete value.
    pub fn widen(&mut self, kind: DimensionKind) -> bool {
        match self.0.get_mut(&kind) {
            Some(binding) if binding.is_concrete() => {
                *binding = Binding::Wildcard;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConditionSegment {
    Literal(String),
    Value,
    ValuePlus,
}

/// A `static`, `dynamic` or `filter` expression with optional range placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionTemplate {
    source: String,
    segments: Vec<ConditionSegment>,
}

impl ConditionTemplate {
    const VALUE: &'static str = "{v}";
    const VALUE_PLUS: &'static str = "{v_plus}";

    /// Parse an expression; any text other than `{v}` / `{v_plus}` is literal
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = source;
        while !rest.is_empty() {
            let next = [(Self::VALUE, ConditionSegment::Value), (Self::VALUE_PLUS, ConditionSegment::ValuePlus)]
                .into_iter()
                .filter_map(|(token, segment)| rest.find(token).map(|pos| (pos, token, segment)))
                .min_by_key(|(pos, _, _)| *pos);
            match next {
                Some((pos, token, segment)) => {
                    if pos > 0 {
                        segments.push(ConditionSegment::Literal(rest[..pos].to_string()));
                    }
                    segments.push(segment);
                    rest = &rest[pos + token.len()..];
                }
                None => {
                    segments.push(ConditionSegment::Literal(rest.to_string()));
                    rest = "";
                }
            }
        }
        Self { source: source.to_string(), segments }
    }

    /// Whether the expression uses a range placeholder
    pub fn has_placeholders(&self) -> bool {
        self.segments.iter().any(|s| !matches!(s, ConditionSegment::Literal(_)))
    }

    /// Whether the expression uses `{v_plus}`
    pub fn uses_successor(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, ConditionSegment::ValuePlus))
    }

    /// Render with a range value; without one the text is returned unchanged
    ///
    /// Fails when `{v_plus}` is used with `i64::MAX`.
    pub fn render(&self, value: Option<i64>) -> Result<String, TemplateError> {
        let Some(v) = value else {
            return Ok(self.source.clone());
        };
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                ConditionSegment::Literal(text) => out.push_str(text),
                ConditionSegment::Value => out.push_str(&v.to_string()),
                ConditionSegment::ValuePlus => {
                    let next = v.checked_add(1).ok_or_else(|| TemplateError::ValueOverflow {
                        template: self.source.clone(),
                        value: v,
                    })?;
                    out.push_str(&next.to_string());
                }
            }
        }
        Ok(out)
    }
}
