use wasm_bindgen::prelude::*;

use crate::{
    chat::{Conversation, ToolDescription},
    encoding::{ApertusEncoding, RenderConversationConfig},
    load_apertus_encoding as inner_load_apertus_encoding,
    typescript::{json_schema_to_typescript, render_tool_signature},
    ApertusEncodingName,
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(typescript_type = "Conversation")]
    pub type JsConversation;

    #[wasm_bindgen(typescript_type = "ToolDescription[] | undefined")]
    pub type JsTools;

    #[wasm_bindgen(typescript_type = "ToolDescription")]
    pub type JsToolDescription;

    #[wasm_bindgen(typescript_type = "RenderConversationConfig")]
    pub type JsRenderConversationConfig;
}

#[wasm_bindgen(typescript_custom_section)]
const TS_APPEND: &str = r#"
export type AssistantBlock =
  | { type: 'thoughts'; text: string }
  | { type: 'tool_calls'; calls: { name?: string; arguments?: any }[] }
  | { type: 'tool_outputs'; outputs: { output?: any }[] }
  | { type: 'response'; text: string };

export type Content =
  | string
  | { text: string }
  | { parts: ({ type: 'text'; text: string } | { type: string })[] }
  | { blocks: AssistantBlock[] };

export interface Message {
  role: 'user' | 'assistant' | 'system' | 'developer' | 'tool' | string;
  content?: Content | null;
  tool_calls?: { id?: string; type?: string; function?: { name?: string; arguments?: any } }[];
}

export interface Conversation {
  messages: Message[];
}

export type ToolDescription =
  | { type?: 'function'; function: { name: string; description?: string; parameters?: any } }
  | { name: string; description?: string; parameters?: any };

export interface RenderConversationConfig {
  enable_thinking?: boolean;
  add_generation_prompt?: boolean;
  current_date?: string;
}
"#;

fn conversation_from_js(conversation: JsConversation) -> Result<Conversation, JsValue> {
    let conversation: JsValue = conversation.into();
    serde_wasm_bindgen::from_value(conversation)
        .map_err(|e| JsValue::from_str(&format!("invalid conversation JSON: {e}")))
}

fn tools_from_js(tools: JsTools) -> Result<Option<Vec<ToolDescription>>, JsValue> {
    let tools: JsValue = tools.into();
    if tools.is_undefined() || tools.is_null() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(tools)
        .map(Some)
        .map_err(|e| JsValue::from_str(&format!("invalid tools JSON: {e}")))
}

fn config_from_js(
    config: JsRenderConversationConfig,
) -> Result<Option<RenderConversationConfig>, JsValue> {
    let config: JsValue = config.into();
    if config.is_undefined() || config.is_null() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(config)
        .map(Some)
        .map_err(|e| JsValue::from_str(&format!("invalid config: {e}")))
}

#[wasm_bindgen]
pub struct JsApertusEncoding {
    inner: ApertusEncoding,
}

#[wasm_bindgen]
impl JsApertusEncoding {
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.inner.name().to_string()
    }

    #[wasm_bindgen(js_name = withBosToken)]
    pub fn with_bos_token(&self, bos_token: String) -> JsApertusEncoding {
        JsApertusEncoding {
            inner: self.inner.clone().with_bos_token(bos_token),
        }
    }

    #[wasm_bindgen(js_name = renderConversation)]
    pub fn render_conversation(
        &self,
        conversation: JsConversation,
        tools: JsTools,
        config: JsRenderConversationConfig,
    ) -> Result<String, JsValue> {
        let conversation = conversation_from_js(conversation)?;
        let tools = tools_from_js(tools)?;
        let config = config_from_js(config)?;
        Ok(self
            .inner
            .render_conversation(&conversation, tools.as_deref(), config.as_ref()))
    }

    #[wasm_bindgen(js_name = renderConversationForCompletion)]
    pub fn render_conversation_for_completion(
        &self,
        conversation: JsConversation,
        tools: JsTools,
        config: JsRenderConversationConfig,
    ) -> Result<String, JsValue> {
        let conversation = conversation_from_js(conversation)?;
        let tools = tools_from_js(tools)?;
        let config = config_from_js(config)?;
        Ok(self.inner.render_conversation_for_completion(
            &conversation,
            tools.as_deref(),
            config.as_ref(),
        ))
    }

    #[wasm_bindgen(js_name = stopSequences)]
    pub fn stop_sequences(&self) -> Result<Vec<String>, JsValue> {
        self.inner
            .stop_sequences()
            .map(|seqs| seqs.into_iter().map(str::to_string).collect())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

#[wasm_bindgen(js_name = renderTool)]
pub fn render_tool(tool: JsToolDescription) -> Result<String, JsValue> {
    let tool: JsValue = tool.into();
    let tool: ToolDescription = serde_wasm_bindgen::from_value(tool)
        .map_err(|e| JsValue::from_str(&format!("invalid tool JSON: {e}")))?;
    Ok(render_tool_signature(&tool))
}

#[wasm_bindgen(js_name = renderSchemaType)]
pub fn render_schema_type(schema: JsValue) -> Result<String, JsValue> {
    let schema: serde_json::Value = serde_wasm_bindgen::from_value(schema)
        .map_err(|e| JsValue::from_str(&format!("invalid schema JSON: {e}")))?;
    Ok(json_schema_to_typescript(&schema))
}

#[wasm_bindgen]
pub fn load_apertus_encoding(name: &str) -> Result<JsApertusEncoding, JsValue> {
    let parsed: ApertusEncodingName = name
        .parse::<ApertusEncodingName>()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let encoding =
        inner_load_apertus_encoding(parsed).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(JsApertusEncoding { inner: encoding })
}
