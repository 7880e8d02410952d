use core::fmt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt::Display;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    Developer,
    Tool,
    /// A role the format has no segment for. It is kept so the renderer can
    /// emit an invalid-role marker in its place.
    Other(String),
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            "developer" => Role::Developer,
            "tool" => Role::Tool,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Developer => "developer",
            Role::Tool => "tool",
            Role::Other(name) => name,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `content` field of a message.
///
/// Which shapes are valid depends on the role: system messages take a string
/// or a `{"text": ...}` map, user messages a string or a `{"parts": [...]}`
/// map, assistant messages a string or a `{"blocks": [...]}` map. Any other
/// JSON value is kept as [`Content::Other`] and rendered as an invalid marker.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(StructuredContent),
    Other(serde_json::Value),
}

impl Content {
    /// Classify an arbitrary JSON value. Never fails.
    ///
    /// A map is structured as soon as it carries a `text`, `parts` or
    /// `blocks` key; the other keys are kept but not interpreted.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Content::Text(text),
            serde_json::Value::Object(map)
                if StructuredContent::KEYS.iter().any(|k| map.contains_key(*k)) =>
            {
                Content::Structured(StructuredContent::from_map(map))
            }
            other => Content::Other(other),
        }
    }

    /// Text used where a payload is spliced in verbatim (tool messages).
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Content::Text(text) => Cow::Borrowed(text),
            Content::Structured(StructuredContent { raw: Some(raw), .. }) => json_literal(raw),
            Content::Structured(structured) => {
                Cow::Owned(serde_json::to_string(structured).unwrap_or_default())
            }
            Content::Other(value) => json_literal(value),
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Content::from_value)
    }
}

impl<T> From<T> for Content
where
    T: Into<String>,
{
    fn from(text: T) -> Self {
        Self::Text(text.into())
    }
}

impl From<StructuredContent> for Content {
    fn from(structured: StructuredContent) -> Self {
        Self::Structured(structured)
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct StructuredContent {
    /// Structured system content.
    pub text: Option<String>,
    /// Structured user content.
    pub parts: Option<Vec<ContentPart>>,
    /// Structured assistant content.
    pub blocks: Option<Vec<AssistantBlock>>,
    /// The map this content was read from, if any.
    raw: Option<serde_json::Value>,
}

impl StructuredContent {
    const KEYS: [&'static str; 3] = ["text", "parts", "blocks"];

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn parts<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = ContentPart>,
    {
        Self {
            parts: Some(parts.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn blocks<I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = AssistantBlock>,
    {
        Self {
            blocks: Some(blocks.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Key presence decides the shape. Elements of `parts` and `blocks` are
    /// read one by one, so a malformed element never hides its siblings.
    fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let text = map.get("text").map(|t| json_literal(t).into_owned());
        let parts = map
            .get("parts")
            .map(|parts| elements(parts).map(ContentPart::from_value).collect());
        let blocks = map
            .get("blocks")
            .map(|blocks| elements(blocks).map(AssistantBlock::from_value).collect());
        Self {
            text,
            parts,
            blocks,
            raw: Some(serde_json::Value::Object(map)),
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize)]
struct StructuredFields<'a> {
    text: Option<&'a String>,
    parts: Option<&'a Vec<ContentPart>>,
    blocks: Option<&'a Vec<AssistantBlock>>,
}

impl Serialize for StructuredContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.raw {
            Some(raw) => raw.serialize(serializer),
            None => StructuredFields {
                text: self.text.as_ref(),
                parts: self.parts.as_ref(),
                blocks: self.blocks.as_ref(),
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StructuredContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = serde_json::Map::deserialize(deserializer)?;
        Ok(Self::from_map(map))
    }
}

/// Items of a JSON array; anything else has none.
fn elements(value: &serde_json::Value) -> impl Iterator<Item = &serde_json::Value> {
    value.as_array().into_iter().flatten()
}

/// A string field of an element; missing or `null` reads as empty.
fn text_field(value: &serde_json::Value, key: &str) -> String {
    match value.get(key) {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(text) => json_literal(text).into_owned(),
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ContentPart {
    Text { text: String },
    /// Images, audio, untyped parts and every other part type.
    Unsupported,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("text") => Self::Text {
                text: text_field(value, "text"),
            },
            _ => Self::Unsupported,
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(|v| Self::from_value(&v))
    }
}

/// One block of a structured assistant message.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AssistantBlock {
    Thoughts { text: String },
    ToolCalls { calls: Vec<ToolCall> },
    ToolOutputs { outputs: Vec<ToolOutput> },
    Response { text: String },
    /// A block without a known `type`.
    Unknown,
}

impl AssistantBlock {
    pub fn thoughts(text: impl Into<String>) -> Self {
        Self::Thoughts { text: text.into() }
    }

    pub fn response(text: impl Into<String>) -> Self {
        Self::Response { text: text.into() }
    }

    pub fn tool_calls<I>(calls: I) -> Self
    where
        I: IntoIterator<Item = ToolCall>,
    {
        Self::ToolCalls {
            calls: calls.into_iter().collect(),
        }
    }

    pub fn tool_outputs<I>(outputs: I) -> Self
    where
        I: IntoIterator<Item = ToolOutput>,
    {
        Self::ToolOutputs {
            outputs: outputs.into_iter().collect(),
        }
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("thoughts") => Self::Thoughts {
                text: text_field(value, "text"),
            },
            Some("tool_calls") => Self::ToolCalls {
                calls: value
                    .get("calls")
                    .map(|calls| elements(calls).map(ToolCall::from_value).collect())
                    .unwrap_or_default(),
            },
            Some("tool_outputs") => Self::ToolOutputs {
                outputs: value
                    .get("outputs")
                    .map(|outputs| elements(outputs).map(ToolOutput::from_value).collect())
                    .unwrap_or_default(),
            },
            Some("response") => Self::Response {
                text: text_field(value, "text"),
            },
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for AssistantBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(|v| Self::from_value(&v))
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ToolCall {
    pub name: Option<String>,
    /// Either a JSON string holding the literal arguments, or any JSON value.
    pub arguments: Option<serde_json::Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            arguments: Some(serde_json::Value::String(arguments.into())),
        }
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            name: value.get("name").map(|n| json_literal(n).into_owned()),
            arguments: value.get("arguments").cloned(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("tool")
    }

    pub fn arguments(&self) -> Cow<'_, str> {
        self.arguments
            .as_ref()
            .map_or(Cow::Borrowed("{}"), json_literal)
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ToolOutput {
    pub output: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: Some(serde_json::Value::String(output.into())),
        }
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            output: value.get("output").cloned(),
        }
    }

    pub fn output(&self) -> Cow<'_, str> {
        self.output
            .as_ref()
            .map_or(Cow::Borrowed(""), json_literal)
    }
}

/// A tool call in the OpenAI chat shape, carried next to an assistant
/// message's content.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LegacyToolCall {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub function: Option<FunctionCall>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: Option<String>,
    pub arguments: Option<serde_json::Value>,
}

impl LegacyToolCall {
    pub fn function(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: Some("function".to_string()),
            function: Some(FunctionCall {
                name: Some(name.into()),
                arguments: Some(serde_json::Value::String(arguments.into())),
            }),
        }
    }

    /// The `(name, arguments)` pair rendered for this call. Anything that is
    /// not a function call collapses to `("tool", "{}")`.
    pub fn name_and_arguments(&self) -> (&str, Cow<'_, str>) {
        match (self.kind.as_deref(), &self.function) {
            (Some("function"), Some(function)) => (
                function.name.as_deref().unwrap_or_default(),
                function
                    .arguments
                    .as_ref()
                    .map_or(Cow::Borrowed("{}"), json_literal),
            ),
            _ => ("tool", Cow::Borrowed("{}")),
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,

    /// `None` when the message has no `content` key. An explicit JSON `null`
    /// is kept as `Some(Content::Other(Value::Null))`.
    #[serde(default, deserialize_with = "de_present_content")]
    pub content: Option<Content>,

    /// Sibling tool calls in the OpenAI chat shape (assistant messages only).
    #[serde(default)]
    pub tool_calls: Option<Vec<LegacyToolCall>>,
}

impl Message {
    pub fn from_role(role: Role) -> Self {
        Message {
            role,
            content: None,
            tool_calls: None,
        }
    }

    pub fn from_role_and_content<C>(role: Role, content: C) -> Self
    where
        C: Into<Content>,
    {
        Message {
            role,
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    pub fn with_tool_calls<I>(mut self, tool_calls: I) -> Self
    where
        I: IntoIterator<Item = LegacyToolCall>,
    {
        self.tool_calls = Some(tool_calls.into_iter().collect());
        self
    }
}

fn de_present_content<'de, D>(deserializer: D) -> Result<Option<Content>, D::Error>
where
    D: Deserializer<'de>,
{
    Content::deserialize(deserializer).map(Some)
}

#[derive(Deserialize, Default)]
struct FunctionDescription {
    name: Option<String>,
    description: Option<String>,
    parameters: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawToolDescription {
    function: Option<FunctionDescription>,
    #[serde(flatten)]
    inline: FunctionDescription,
}

impl From<RawToolDescription> for ToolDescription {
    fn from(raw: RawToolDescription) -> Self {
        let function = raw.function.unwrap_or(raw.inline);
        Self {
            name: function.name.unwrap_or_else(|| "tool".to_string()),
            description: function.description.unwrap_or_default(),
            parameters: function.parameters,
        }
    }
}

/// A function the model may call.
///
/// Deserializes from both `{"type": "function", "function": {...}}` and the
/// flat `{"name": ..., "description": ..., "parameters": ...}` shape.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "RawToolDescription")]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Option<serde_json::Value>,
}

impl ToolDescription {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Option<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn from_messages<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = Message>,
    {
        Self {
            messages: messages.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Strings are spliced in raw, every other value as compact JSON.
pub(crate) fn json_literal(value: &serde_json::Value) -> Cow<'_, str> {
    match value {
        serde_json::Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}
