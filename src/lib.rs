#![doc = include_str!("../README.md")]

pub mod chat;
mod encoding;
mod registry;
pub mod typescript;

pub use encoding::{
    ApertusEncoding, FormattingToken, FormattingTokenError, RenderConversationConfig,
    DEFAULT_CURRENT_DATE,
};
pub use registry::load_apertus_encoding;
pub use registry::ApertusEncodingName;


#[cfg(feature = "python-binding")]
mod py_module;

#[cfg(feature = "wasm-binding")]
mod wasm_module;
