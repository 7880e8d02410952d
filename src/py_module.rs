//! Python bindings for the apertus-format crate.
//!
//! Conversations, tool lists and schemas cross the FFI boundary as JSON
//! strings in the OpenAI chat shape, and options as a plain dict. The
//! rendered prompt comes back as a `str`.

use pyo3::create_exception;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule};
use pyo3::Bound;
use pyo3::Python;

create_exception!(apertus_format, ApertusError, PyRuntimeError);

use crate::{
    chat::{Conversation, ToolDescription},
    encoding::{ApertusEncoding, RenderConversationConfig},
    load_apertus_encoding,
    typescript::{json_schema_to_typescript, render_tool_signature},
    ApertusEncodingName,
};

/// A thin PyO3 wrapper around the Rust `ApertusEncoding` struct.
#[pyclass]
struct PyApertusEncoding {
    inner: ApertusEncoding,
}

fn parse_conversation(conversation_json: &str) -> PyResult<Conversation> {
    serde_json::from_str(conversation_json)
        .map_err(|e| PyErr::new::<PyValueError, _>(format!("invalid conversation JSON: {e}")))
}

fn parse_tools(tools_json: Option<&str>) -> PyResult<Option<Vec<ToolDescription>>> {
    tools_json
        .map(|json| {
            serde_json::from_str(json)
                .map_err(|e| PyErr::new::<PyValueError, _>(format!("invalid tools JSON: {e}")))
        })
        .transpose()
}

fn parse_config(config: Option<Bound<'_, PyDict>>) -> PyResult<RenderConversationConfig> {
    let Some(cfg_dict) = config else {
        return Ok(RenderConversationConfig::default());
    };
    let enable_thinking = cfg_dict
        .get_item("enable_thinking")?
        .and_then(|v| v.extract().ok())
        .unwrap_or(false);
    let add_generation_prompt = cfg_dict
        .get_item("add_generation_prompt")?
        .and_then(|v| v.extract().ok())
        .unwrap_or(false);
    let current_date = cfg_dict
        .get_item("current_date")?
        .and_then(|v| v.extract::<String>().ok());
    Ok(RenderConversationConfig {
        enable_thinking,
        add_generation_prompt,
        current_date,
    })
}

#[pymethods]
impl PyApertusEncoding {
    #[new]
    #[pyo3(signature = (name, bos_token=None))]
    fn new(name: &str, bos_token: Option<String>) -> PyResult<Self> {
        let parsed: ApertusEncodingName = name
            .parse::<ApertusEncodingName>()
            .map_err(|e| PyErr::new::<PyValueError, _>(e.to_string()))?;
        let mut encoding = load_apertus_encoding(parsed)
            .map_err(|e| PyErr::new::<ApertusError, _>(e.to_string()))?;
        if let Some(bos_token) = bos_token {
            encoding = encoding.with_bos_token(bos_token);
        }
        Ok(Self { inner: encoding })
    }

    #[getter]
    fn name(&self) -> &str {
        self.inner.name()
    }

    /// Render a conversation.
    ///
    /// Parameters
    /// ----------
    /// conversation_json : str
    ///     A JSON encoded `{"messages": [...]}` object.
    /// tools_json : str (optional)
    ///     A JSON encoded list of tool definitions. `None` disables tools.
    /// config : dict (optional)
    ///     `enable_thinking`, `add_generation_prompt` and `current_date`.
    #[pyo3(signature = (conversation_json, tools_json=None, config=None))]
    fn render_conversation(
        &self,
        conversation_json: &str,
        tools_json: Option<&str>,
        config: Option<Bound<'_, PyDict>>,
    ) -> PyResult<String> {
        let conversation = parse_conversation(conversation_json)?;
        let tools = parse_tools(tools_json)?;
        let config = parse_config(config)?;
        Ok(self
            .inner
            .render_conversation(&conversation, tools.as_deref(), Some(&config)))
    }

    /// Render a conversation and open the assistant turn to complete.
    #[pyo3(signature = (conversation_json, tools_json=None, config=None))]
    fn render_conversation_for_completion(
        &self,
        conversation_json: &str,
        tools_json: Option<&str>,
        config: Option<Bound<'_, PyDict>>,
    ) -> PyResult<String> {
        let conversation = parse_conversation(conversation_json)?;
        let tools = parse_tools(tools_json)?;
        let config = parse_config(config)?;
        Ok(self.inner.render_conversation_for_completion(
            &conversation,
            tools.as_deref(),
            Some(&config),
        ))
    }

    /// Render a single tool definition as its type declaration.
    #[staticmethod]
    fn render_tool(tool_json: &str) -> PyResult<String> {
        let tool: ToolDescription = serde_json::from_str(tool_json)
            .map_err(|e| PyErr::new::<PyValueError, _>(format!("invalid tool JSON: {e}")))?;
        Ok(render_tool_signature(&tool))
    }

    /// Render a JSON schema as its type string.
    #[staticmethod]
    fn render_schema_type(schema_json: &str) -> PyResult<String> {
        let schema: serde_json::Value = serde_json::from_str(schema_json)
            .map_err(|e| PyErr::new::<PyValueError, _>(format!("invalid schema JSON: {e}")))?;
        Ok(json_schema_to_typescript(&schema))
    }

    /// Return the stop sequences for the encoding.
    fn stop_sequences(&self) -> PyResult<Vec<String>> {
        self.inner
            .stop_sequences()
            .map(|seqs| seqs.into_iter().map(str::to_string).collect())
            .map_err(|e| PyErr::new::<ApertusError, _>(e.to_string()))
    }
}

/// Python module definition.
#[pymodule]
fn apertus_format(py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyApertusEncoding>()?;
    m.add("ApertusError", py.get_type::<ApertusError>())?;

    #[pyfunction(name = "load_apertus_encoding")]
    fn load_apertus_encoding_py(py: Python<'_>, name: &str) -> PyResult<Py<PyApertusEncoding>> {
        let enc = PyApertusEncoding::new(name, None)?;
        Py::new(py, enc)
    }
    m.add_function(pyo3::wrap_pyfunction!(load_apertus_encoding_py, m)?)?;

    Ok(())
}
