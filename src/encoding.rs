use crate::{
    chat::{
        AssistantBlock, Content, ContentPart, LegacyToolCall, Message, Role, StructuredContent,
        ToolCall, ToolDescription,
    },
    typescript::render_tools_section,
};
use std::{borrow::Cow, collections::HashMap};

/// Date used in the default system message when the caller supplies none.
pub const DEFAULT_CURRENT_DATE: &str = "2025-11-06";

const INVALID_SYSTEM_MESSAGE: &str = "Invalid system message";
const INVALID_USER_MESSAGE: &str = "[Invalid user message]";
const UNSUPPORTED_USER_PART: &str = "[Unsupported user part]";
const INVALID_ASSISTANT_MESSAGE: &str = "[Invalid assistant message]";
const INVALID_ASSISTANT_CONTENT: &str = "[Invalid assistant content]";
const INVALID_ASSISTANT_BLOCK: &str = "[Invalid assistant block]";
const MIXED_TOOL_OUTPUTS: &str = "[Invalid: mixed tool outputs]";
const TOOL_OUTSIDE_ASSISTANT: &str = "[Tool message outside of assistant]";
const INVALID_MESSAGE_ROLE: &str = "[Invalid message role]";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormattingTokenError {
    #[error("formatting token {0} has no literal mapped")]
    UnmappedToken(FormattingToken),

    #[error("formatting token {0} cannot be mapped to an empty literal")]
    EmptyLiteral(FormattingToken),

    #[error("formatting tokens {first} and {second} are both mapped to {literal:?}")]
    DuplicateLiteral {
        first: FormattingToken,
        second: FormattingToken,
        literal: String,
    },
}

/// Segment delimiters the renderer emits. At render time they are replaced
/// by the literals mapped on the encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormattingToken {
    SystemStart,
    SystemEnd,
    DeveloperStart,
    DeveloperEnd,
    UserStart,
    UserEnd,
    AssistantStart,
    AssistantEnd,
    InnerPrefix,
    InnerSuffix,
    ToolsPrefix,
    ToolsSuffix,
}

impl FormattingToken {
    pub const ALL: [FormattingToken; 12] = [
        FormattingToken::SystemStart,
        FormattingToken::SystemEnd,
        FormattingToken::DeveloperStart,
        FormattingToken::DeveloperEnd,
        FormattingToken::UserStart,
        FormattingToken::UserEnd,
        FormattingToken::AssistantStart,
        FormattingToken::AssistantEnd,
        FormattingToken::InnerPrefix,
        FormattingToken::InnerSuffix,
        FormattingToken::ToolsPrefix,
        FormattingToken::ToolsSuffix,
    ];

    /// The literal the Apertus tokenizer reserves for this token.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormattingToken::SystemStart => "<|system_start|>",
            FormattingToken::SystemEnd => "<|system_end|>",
            FormattingToken::DeveloperStart => "<|developer_start|>",
            FormattingToken::DeveloperEnd => "<|developer_end|>",
            FormattingToken::UserStart => "<|user_start|>",
            FormattingToken::UserEnd => "<|user_end|>",
            FormattingToken::AssistantStart => "<|assistant_start|>",
            FormattingToken::AssistantEnd => "<|assistant_end|>",
            FormattingToken::InnerPrefix => "<|inner_prefix|>",
            FormattingToken::InnerSuffix => "<|inner_suffix|>",
            FormattingToken::ToolsPrefix => "<|tools_prefix|>",
            FormattingToken::ToolsSuffix => "<|tools_suffix|>",
        }
    }
}

impl std::fmt::Display for FormattingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone)]
pub struct ApertusEncoding {
    pub(crate) name: String,
    pub(crate) bos_token: String,
    pub(crate) model_identity: String,
    pub(crate) knowledge_cutoff: String,
    pub(crate) format_token_mapping: HashMap<FormattingToken, String>,
    pub(crate) stop_formatting_tokens: Vec<FormattingToken>,
}

impl std::fmt::Debug for ApertusEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApertusEncoding")
            .field("name", &self.name)
            .field("bos_token", &self.bos_token)
            .field("knowledge_cutoff", &self.knowledge_cutoff)
            .finish()
    }
}

impl std::fmt::Display for ApertusEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Renderer({})", self.name)
    }
}

// General methods
impl ApertusEncoding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bos_token(&self) -> &str {
        &self.bos_token
    }

    pub fn model_identity(&self) -> &str {
        &self.model_identity
    }

    pub fn knowledge_cutoff(&self) -> &str {
        &self.knowledge_cutoff
    }

    /// Literal mapped for `t`.
    pub fn formatting_token(&self, t: FormattingToken) -> Result<&str, FormattingTokenError> {
        self.format_token_mapping
            .get(&t)
            .map(|s| s.as_str())
            .ok_or(FormattingTokenError::UnmappedToken(t))
    }

    /// Literals that end an assistant turn, for use as generation stop sequences.
    pub fn stop_sequences(&self) -> Result<Vec<&str>, FormattingTokenError> {
        self.stop_formatting_tokens
            .iter()
            .map(|t| self.formatting_token(*t))
            .collect()
    }

    pub fn with_bos_token(mut self, bos_token: impl Into<String>) -> Self {
        self.bos_token = bos_token.into();
        self
    }

    pub fn with_model_identity(mut self, model_identity: impl Into<String>) -> Self {
        self.model_identity = model_identity.into();
        self
    }

    pub fn with_knowledge_cutoff(mut self, knowledge_cutoff: impl Into<String>) -> Self {
        self.knowledge_cutoff = knowledge_cutoff.into();
        self
    }

    /// Replace the literal emitted for one formatting token.
    pub fn with_formatting_token(
        mut self,
        t: FormattingToken,
        literal: impl Into<String>,
    ) -> Result<Self, FormattingTokenError> {
        self.format_token_mapping.insert(t, literal.into());
        self.validate_formatting_tokens()?;
        Ok(self)
    }

    /// Every token must be mapped to a distinct, non-empty literal.
    pub fn validate_formatting_tokens(&self) -> Result<(), FormattingTokenError> {
        let mut seen: HashMap<&str, FormattingToken> = HashMap::new();
        for t in FormattingToken::ALL {
            let literal = self.formatting_token(t)?;
            if literal.is_empty() {
                return Err(FormattingTokenError::EmptyLiteral(t));
            }
            if let Some(first) = seen.insert(literal, t) {
                return Err(FormattingTokenError::DuplicateLiteral {
                    first,
                    second: t,
                    literal: literal.to_string(),
                });
            }
        }
        Ok(())
    }
}

// Methods for rendering conversations
impl ApertusEncoding {
    /// Renders a conversation into `into`.
    ///
    /// `tools` is `None` when tool use is disabled; an empty slice still
    /// announces tool capabilities, with no tools listed.
    pub fn render_conversation_into<'a, I>(
        &self,
        conversation: I,
        tools: Option<&[ToolDescription]>,
        into: &mut String,
        config: Option<&RenderConversationConfig>,
    ) where
        I: IntoIterator<Item = &'a Message>,
    {
        let default_config = RenderConversationConfig::default();
        let config = config.unwrap_or(&default_config);
        let messages: Vec<&Message> = conversation.into_iter().collect();
        let start = into.len();
        tracing::debug!(
            encoding = %self.name,
            messages = messages.len(),
            tools = tools.map(<[_]>::len),
            "rendering conversation"
        );

        into.push_str(&self.bos_token);
        let remaining = self.render_system_into(&messages, into, config);
        self.render_developer_into(tools, into, config);

        let mut state = RenderState::default();
        for message in remaining {
            Render::<Message>::render(self, message, into, &mut state);
        }
        state.close_tool_outputs(into);
        if config.add_generation_prompt {
            self.render_formatting_token_into(FormattingToken::AssistantStart, into);
        }

        tracing::debug!(rendered_len = into.len() - start, "rendered conversation");
    }

    /// Render a conversation without appending a new assistant turn unless
    /// `config` asks for one.
    pub fn render_conversation<'a, I>(
        &self,
        conversation: I,
        tools: Option<&[ToolDescription]>,
        config: Option<&RenderConversationConfig>,
    ) -> String
    where
        I: IntoIterator<Item = &'a Message>,
    {
        let mut out = String::new();
        self.render_conversation_into(conversation, tools, &mut out, config);
        out
    }

    /// Renders a conversation and opens the assistant turn the model should
    /// complete.
    pub fn render_conversation_for_completion<'a, I>(
        &self,
        conversation: I,
        tools: Option<&[ToolDescription]>,
        config: Option<&RenderConversationConfig>,
    ) -> String
    where
        I: IntoIterator<Item = &'a Message>,
    {
        let config = config
            .cloned()
            .unwrap_or_default()
            .with_add_generation_prompt(true);
        self.render_conversation(conversation, tools, Some(&config))
    }
}

// Rendering helper methods
impl ApertusEncoding {
    /// Every token is mapped: `load_apertus_encoding` and
    /// `with_formatting_token` both run [`Self::validate_formatting_tokens`].
    fn render_formatting_token_into(&self, t: FormattingToken, into: &mut String) {
        debug_assert!(
            self.format_token_mapping.contains_key(&t),
            "formatting token {t} has no literal mapped"
        );
        into.push_str(self.formatting_token(t).unwrap_or(t.as_str()));
    }

    /// Emits the system segment and returns the messages left to walk.
    fn render_system_into<'m, 'a>(
        &self,
        messages: &'m [&'a Message],
        into: &mut String,
        config: &RenderConversationConfig,
    ) -> &'m [&'a Message] {
        self.render_formatting_token_into(FormattingToken::SystemStart, into);
        let remaining = match messages.split_first() {
            Some((first, rest)) if first.role == Role::System && first.content.is_some() => {
                match &first.content {
                    Some(Content::Text(text))
                    | Some(Content::Structured(StructuredContent {
                        text: Some(text), ..
                    })) => into.push_str(text),
                    _ => {
                        tracing::debug!(role = "system", "system content has an invalid shape");
                        into.push_str(INVALID_SYSTEM_MESSAGE);
                    }
                }
                rest
            }
            _ => {
                let current_date = config
                    .current_date
                    .as_deref()
                    .unwrap_or(DEFAULT_CURRENT_DATE);
                into.push_str(&format!(
                    "{}\nKnowledge cutoff: {}\nCurrent date: {}",
                    self.model_identity, self.knowledge_cutoff, current_date
                ));
                messages
            }
        };
        self.render_formatting_token_into(FormattingToken::SystemEnd, into);
        remaining
    }

    fn render_developer_into(
        &self,
        tools: Option<&[ToolDescription]>,
        into: &mut String,
        config: &RenderConversationConfig,
    ) {
        self.render_formatting_token_into(FormattingToken::DeveloperStart, into);
        into.push_str("Deliberation: ");
        into.push_str(if config.enable_thinking {
            "enabled\n"
        } else {
            "disabled\n"
        });
        match tools {
            Some(tools) => {
                into.push_str("Tool Capabilities:\n");
                into.push_str(&render_tools_section(tools));
            }
            None => into.push_str("Tool Capabilities: disabled"),
        }
        self.render_formatting_token_into(FormattingToken::DeveloperEnd, into);
    }

    fn render_tool_calls_into<'c, I>(&self, calls: I, into: &mut String)
    where
        I: IntoIterator<Item = (&'c str, Cow<'c, str>)>,
    {
        self.render_formatting_token_into(FormattingToken::ToolsPrefix, into);
        into.push('[');
        for (i, (name, arguments)) in calls.into_iter().enumerate() {
            if i > 0 {
                into.push_str(", ");
            }
            into.push_str("{\"");
            into.push_str(name);
            into.push_str("\": ");
            into.push_str(&arguments);
            into.push('}');
        }
        into.push(']');
        self.render_formatting_token_into(FormattingToken::ToolsSuffix, into);
    }
}

fn push_marker(into: &mut String, role: &Role, marker: &str) {
    tracing::debug!(%role, marker, "rendering placeholder for malformed input");
    into.push_str(marker);
}

/// Options for a single render call.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConversationConfig {
    /// Announce deliberation (reasoning) as enabled in the developer segment.
    pub enable_thinking: bool,
    /// Open an assistant turn after the conversation.
    pub add_generation_prompt: bool,
    /// Date for the default system message; [`DEFAULT_CURRENT_DATE`] if unset.
    pub current_date: Option<String>,
}

impl RenderConversationConfig {
    pub fn with_enable_thinking(mut self, enable_thinking: bool) -> Self {
        self.enable_thinking = enable_thinking;
        self
    }

    pub fn with_add_generation_prompt(mut self, add_generation_prompt: bool) -> Self {
        self.add_generation_prompt = add_generation_prompt;
        self
    }

    pub fn with_current_date(mut self, current_date: impl Into<String>) -> Self {
        self.current_date = Some(current_date.into());
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Turn {
    #[default]
    Idle,
    Assistant {
        reasoning: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum ToolOutputBracket {
    #[default]
    Closed,
    Open,
}

/// Content shape of the first assistant message; later ones must match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum AssistantShape {
    #[default]
    Unset,
    PlainText,
    Blocks,
}

impl AssistantShape {
    fn admits(self, shape: AssistantShape) -> bool {
        self == AssistantShape::Unset || self == shape
    }
}

/// Walk state of one render call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RenderState {
    pub(crate) turn: Turn,
    pub(crate) tool_outputs: ToolOutputBracket,
    pub(crate) assistant_shape: AssistantShape,
}

impl RenderState {
    fn in_assistant(&self) -> bool {
        matches!(self.turn, Turn::Assistant { .. })
    }

    fn in_reasoning(&self) -> bool {
        matches!(self.turn, Turn::Assistant { reasoning: true })
    }

    fn close_tool_outputs(&mut self, into: &mut String) {
        if self.tool_outputs == ToolOutputBracket::Open {
            into.push(']');
            self.tool_outputs = ToolOutputBracket::Closed;
        }
    }

    fn append_tool_output(&mut self, into: &mut String) {
        match self.tool_outputs {
            ToolOutputBracket::Closed => {
                into.push('[');
                self.tool_outputs = ToolOutputBracket::Open;
            }
            ToolOutputBracket::Open => into.push_str(", "),
        }
    }

    fn enter_assistant(&mut self, encoding: &ApertusEncoding, into: &mut String) {
        if !self.in_assistant() {
            encoding.render_formatting_token_into(FormattingToken::AssistantStart, into);
            self.turn = Turn::Assistant { reasoning: false };
        }
    }

    /// Ends the assistant turn. An open reasoning segment is dropped without
    /// its suffix.
    fn leave_assistant(&mut self, encoding: &ApertusEncoding, into: &mut String) {
        if self.in_assistant() {
            encoding.render_formatting_token_into(FormattingToken::AssistantEnd, into);
        }
        self.turn = Turn::Idle;
    }

    fn open_reasoning(&mut self, encoding: &ApertusEncoding, into: &mut String) {
        if !self.in_reasoning() {
            encoding.render_formatting_token_into(FormattingToken::InnerPrefix, into);
            self.turn = Turn::Assistant { reasoning: true };
        }
    }

    fn close_reasoning(&mut self, encoding: &ApertusEncoding, into: &mut String) {
        if self.in_reasoning() {
            encoding.render_formatting_token_into(FormattingToken::InnerSuffix, into);
            self.turn = Turn::Assistant { reasoning: false };
        }
    }
}

trait Render<T: ?Sized> {
    fn render(&self, item: &T, into: &mut String, state: &mut RenderState);
}

impl Render<Message> for ApertusEncoding {
    fn render(&self, message: &Message, into: &mut String, state: &mut RenderState) {
        match &message.role {
            Role::User => {
                state.close_tool_outputs(into);
                state.leave_assistant(self, into);
                // a user message without content only closes the open segments
                if let Some(content) = &message.content {
                    self.render_formatting_token_into(FormattingToken::UserStart, into);
                    match content {
                        Content::Text(text) => into.push_str(text),
                        Content::Structured(StructuredContent {
                            parts: Some(parts), ..
                        }) => Render::<[ContentPart]>::render(self, parts, into, state),
                        _ => push_marker(into, &message.role, INVALID_USER_MESSAGE),
                    }
                    self.render_formatting_token_into(FormattingToken::UserEnd, into);
                }
            }
            Role::Assistant => {
                state.enter_assistant(self, into);
                match &message.content {
                    None => push_marker(into, &message.role, INVALID_ASSISTANT_MESSAGE),
                    Some(Content::Text(text))
                        if state.assistant_shape.admits(AssistantShape::PlainText) =>
                    {
                        state.close_tool_outputs(into);
                        state.assistant_shape = AssistantShape::PlainText;
                        into.push_str(text);
                    }
                    Some(Content::Structured(StructuredContent {
                        blocks: Some(blocks),
                        ..
                    })) if state.assistant_shape.admits(AssistantShape::Blocks) => {
                        state.assistant_shape = AssistantShape::Blocks;
                        Render::<[AssistantBlock]>::render(self, blocks, into, state);
                    }
                    Some(_) => push_marker(into, &message.role, INVALID_ASSISTANT_CONTENT),
                }
                if let Some(tool_calls) = message.tool_calls.as_deref().filter(|c| !c.is_empty()) {
                    Render::<[LegacyToolCall]>::render(self, tool_calls, into, state);
                }
            }
            Role::Tool => {
                if !state.in_assistant() {
                    push_marker(into, &message.role, TOOL_OUTSIDE_ASSISTANT);
                }
                state.append_tool_output(into);
                if let Some(content) = &message.content {
                    into.push_str(&content.as_text());
                }
            }
            // system is only valid as the first message, developer only as the preamble
            Role::System | Role::Developer | Role::Other(_) => {
                push_marker(into, &message.role, INVALID_MESSAGE_ROLE)
            }
        }
    }
}

impl Render<[ContentPart]> for ApertusEncoding {
    fn render(&self, parts: &[ContentPart], into: &mut String, _state: &mut RenderState) {
        for part in parts {
            match part {
                ContentPart::Text { text } => into.push_str(text),
                ContentPart::Unsupported => push_marker(into, &Role::User, UNSUPPORTED_USER_PART),
            }
        }
    }
}

impl Render<[AssistantBlock]> for ApertusEncoding {
    fn render(&self, blocks: &[AssistantBlock], into: &mut String, state: &mut RenderState) {
        for (idx, block) in blocks.iter().enumerate() {
            match block {
                AssistantBlock::Thoughts { text } => {
                    state.close_tool_outputs(into);
                    state.open_reasoning(self, into);
                    into.push_str(text);
                }
                AssistantBlock::ToolCalls { calls } => {
                    state.close_tool_outputs(into);
                    // a lone display_answers call after other blocks ends the reasoning
                    if idx > 0 && is_display_answers(calls) {
                        state.close_reasoning(self, into);
                    }
                    self.render_tool_calls_into(
                        calls.iter().map(|call| (call.name(), call.arguments())),
                        into,
                    );
                }
                AssistantBlock::ToolOutputs { outputs } => {
                    // self-contained bracket; the cross-message bracket state is left alone
                    if state.tool_outputs == ToolOutputBracket::Open {
                        push_marker(into, &Role::Assistant, MIXED_TOOL_OUTPUTS);
                    } else {
                        into.push('[');
                        for (i, output) in outputs.iter().enumerate() {
                            if i > 0 {
                                into.push_str(", ");
                            }
                            into.push_str(&output.output());
                        }
                        into.push(']');
                    }
                }
                AssistantBlock::Response { text } => {
                    state.close_tool_outputs(into);
                    state.close_reasoning(self, into);
                    into.push_str(text);
                }
                AssistantBlock::Unknown => {
                    push_marker(into, &Role::Assistant, INVALID_ASSISTANT_BLOCK)
                }
            }
        }
    }
}

impl Render<[LegacyToolCall]> for ApertusEncoding {
    fn render(&self, calls: &[LegacyToolCall], into: &mut String, _state: &mut RenderState) {
        self.render_tool_calls_into(calls.iter().map(LegacyToolCall::name_and_arguments), into);
    }
}

fn is_display_answers(calls: &[ToolCall]) -> bool {
    matches!(calls, [call] if call.name.as_deref() == Some("display_answers"))
}
