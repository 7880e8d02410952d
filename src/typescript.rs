//! Rendering of JSON schemas and tool definitions as TypeScript-like type
//! signatures, the way tools are described to the model in the developer
//! segment.

use crate::chat::ToolDescription;
use serde_json::Value;
use std::fmt;

/// Primitive item types an array can declare directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveKind {
    fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    fn as_typescript(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number | Self::Integer => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Item type of an array node.
///
/// Items that declare a primitive `type` render as that primitive no matter
/// what else they carry (enums, `oneOf`, ...), so the distinction is made
/// when the schema is parsed.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayItems {
    Primitive(PrimitiveKind),
    Nested(Box<SchemaNode>),
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum SchemaKind {
    #[default]
    Unspecified,
    Array {
        items: Option<ArrayItems>,
    },
    /// `"type": ["string", "null"]`; names are rendered verbatim.
    Union(Vec<String>),
    OneOf(Vec<SchemaNode>),
    String {
        enum_values: Vec<String>,
    },
    Number,
    Integer,
    Boolean,
    Object {
        /// Declaration order is preserved.
        properties: Vec<(String, SchemaNode)>,
        required: Vec<String>,
    },
}

/// One parameter or nested field of a tool's parameter schema.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub nullable: bool,
    pub description: Option<String>,
    pub default: Option<Value>,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Parse a JSON-schema-like value. Never fails: anything unrecognized
    /// becomes [`SchemaKind::Unspecified`].
    ///
    /// Precedence follows the renderer: `"type": "array"` first, then a type
    /// list, then `oneOf`, then the scalar `type`.
    pub fn from_json(schema: &Value) -> Self {
        let Some(obj) = schema.as_object() else {
            return Self::default();
        };
        let ty = obj.get("type");
        let type_name = ty.and_then(Value::as_str);

        let kind = if type_name == Some("array") {
            let items = obj.get("items").filter(|items| is_truthy(items)).map(|items| {
                match items
                    .get("type")
                    .and_then(Value::as_str)
                    .and_then(PrimitiveKind::from_type_name)
                {
                    Some(primitive) => ArrayItems::Primitive(primitive),
                    None => ArrayItems::Nested(Box::new(Self::from_json(items))),
                }
            });
            SchemaKind::Array { items }
        } else if let Some(kinds) = ty.and_then(Value::as_array).filter(|k| !k.is_empty()) {
            SchemaKind::Union(kinds.iter().map(display_literal).collect())
        } else if let Some(variants) = obj
            .get("oneOf")
            .and_then(Value::as_array)
            .filter(|v| !v.is_empty())
        {
            SchemaKind::OneOf(variants.iter().map(Self::from_json).collect())
        } else {
            match type_name {
                Some("string") => SchemaKind::String {
                    enum_values: obj
                        .get("enum")
                        .and_then(Value::as_array)
                        .map(|values| values.iter().map(display_literal).collect())
                        .unwrap_or_default(),
                },
                Some("number") => SchemaKind::Number,
                Some("integer") => SchemaKind::Integer,
                Some("boolean") => SchemaKind::Boolean,
                Some("object") => SchemaKind::Object {
                    properties: obj
                        .get("properties")
                        .and_then(Value::as_object)
                        .map(|props| {
                            props
                                .iter()
                                .map(|(name, prop)| (name.clone(), Self::from_json(prop)))
                                .collect()
                        })
                        .unwrap_or_default(),
                    required: required_names(obj),
                },
                _ => SchemaKind::Unspecified,
            }
        };

        Self {
            kind,
            nullable: obj.get("nullable").is_some_and(is_truthy),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_owned),
            default: obj.get("default").cloned(),
        }
    }

    /// Render this node as a compact type string, e.g. `{a: string, b?: number}`.
    pub fn to_typescript(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match &self.kind {
            SchemaKind::Array { items } => {
                match items {
                    Some(ArrayItems::Primitive(primitive)) => out.push_str(primitive.as_typescript()),
                    Some(ArrayItems::Nested(node)) => node.render_into(out),
                    None => out.push_str("any"),
                }
                out.push_str("[]");
                if self.nullable {
                    out.push_str(" | null");
                }
            }
            SchemaKind::Union(kinds) => out.push_str(&kinds.join(" | ")),
            SchemaKind::OneOf(variants) => {
                for (i, variant) in variants.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    variant.render_into(out);
                }
            }
            SchemaKind::String { enum_values } if !enum_values.is_empty() => {
                for (i, value) in enum_values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    out.push('"');
                    out.push_str(value);
                    out.push('"');
                }
            }
            SchemaKind::String { .. } => {
                out.push_str("string");
                if self.nullable {
                    out.push_str(" | null");
                }
            }
            SchemaKind::Number | SchemaKind::Integer => out.push_str("number"),
            SchemaKind::Boolean => out.push_str("boolean"),
            SchemaKind::Object {
                properties,
                required,
            } if !properties.is_empty() => {
                out.push('{');
                for (i, (name, property)) in properties.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    if !required.contains(name) {
                        out.push('?');
                    }
                    out.push_str(": ");
                    property.render_into(out);
                }
                out.push('}');
            }
            SchemaKind::Object { .. } => out.push_str("object"),
            SchemaKind::Unspecified => out.push_str("any"),
        }
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_typescript())
    }
}

/// Helper to convert a JSON schema to its TypeScript-like type string.
pub fn json_schema_to_typescript(schema: &Value) -> String {
    SchemaNode::from_json(schema).to_typescript()
}

/// Render one tool as a commented type declaration:
///
/// ```text
/// // Gets the weather.
/// type get_weather = (_: {
/// city: string,
/// unit?: "c" | "f", // default: c
/// }) => any;
/// ```
pub fn render_tool_signature(tool: &ToolDescription) -> String {
    let mut out = format!("// {}\ntype {} = ", tool.description, tool.name);
    // the body is decided on the raw parameters, whatever else they declare
    let parameters = tool.parameters.as_ref().and_then(Value::as_object);
    let properties = parameters
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("object"))
        .and_then(|p| p.get("properties"))
        .and_then(Value::as_object)
        .filter(|props| !props.is_empty());
    let (Some(parameters), Some(properties)) = (parameters, properties) else {
        out.push_str("() => any;");
        return out;
    };

    let required = required_names(parameters);
    out.push_str("(_: {\n");
    for (i, (name, schema)) in properties.iter().enumerate() {
        let field = SchemaNode::from_json(schema);
        if let Some(description) = field.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str("// ");
            out.push_str(description);
            out.push('\n');
        }
        out.push_str(name);
        if !required.contains(name) {
            out.push('?');
        }
        out.push_str(": ");
        field.render_into(&mut out);
        if let Some(default) = &field.default {
            out.push_str(", // default: ");
            out.push_str(&display_literal(default));
        }
        out.push_str(if i + 1 < properties.len() { ",\n" } else { "\n" });
    }
    out.push_str("}) => any;");
    out
}

/// Render every tool, newline separated.
pub fn render_tools_section(tools: &[ToolDescription]) -> String {
    if tools.is_empty() {
        return "// No tools provided".to_string();
    }
    tools
        .iter()
        .map(render_tool_signature)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn required_names(obj: &serde_json::Map<String, Value>) -> Vec<String> {
    obj.get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Text a schema literal (default, enum value, type name) is spliced in as.
///
/// Strings are inserted raw. Other values take the model's training
/// notation: `True`/`False`, `None`, and `['a', 1]` / `{'k': 'v'}` for
/// containers, with quoted strings inside.
fn display_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => {
            let mut out = String::new();
            write_repr(other, &mut out);
            out
        }
    }
}

fn write_repr(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_quoted(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_quoted(key, out);
                out.push_str(": ");
                write_repr(item, out);
            }
            out.push('}');
        }
    }
}

/// Single quotes unless the string holds one and no double quote.
fn write_quoted(s: &str, out: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}
