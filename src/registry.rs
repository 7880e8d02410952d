use std::collections::HashMap;

use anyhow::Context as _;

use crate::encoding::{ApertusEncoding, FormattingToken};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApertusEncodingName {
    Apertus,
}

impl std::fmt::Display for ApertusEncodingName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ApertusEncodingName::Apertus => "Apertus",
            }
        )
    }
}

impl std::str::FromStr for ApertusEncodingName {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Apertus" => Ok(ApertusEncodingName::Apertus),
            _ => anyhow::bail!("Invalid ApertusEncodingName: {}", s),
        }
    }
}

impl std::fmt::Debug for ApertusEncodingName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

pub fn load_apertus_encoding(name: ApertusEncodingName) -> anyhow::Result<ApertusEncoding> {
    match name {
        ApertusEncodingName::Apertus => {
            let encoding = ApertusEncoding {
                name: name.to_string(),
                bos_token: "<s>".to_string(),
                model_identity:
                    "You are Apertus, a helpful assistant created by the SwissAI initiative."
                        .to_string(),
                knowledge_cutoff: "2024-04".to_string(),
                format_token_mapping: make_mapping(
                    FormattingToken::ALL.into_iter().map(|t| (t, t.as_str())),
                ),
                stop_formatting_tokens: vec![FormattingToken::AssistantEnd],
            };
            encoding
                .validate_formatting_tokens()
                .with_context(|| format!("invalid formatting tokens for {name}"))?;
            Ok(encoding)
        }
    }
}

fn make_mapping<I>(iter: I) -> HashMap<FormattingToken, String>
where
    I: IntoIterator<Item = (FormattingToken, &'static str)>,
{
    iter.into_iter().map(|(k, v)| (k, v.to_string())).collect()
}
