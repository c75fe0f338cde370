//! Typed argument decoding shared by the finance tools.

use pennywise_core::error::ToolError;
use pennywise_core::tool::{ToolArgs, ToolName};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Decode a tool's argument object into its typed form.
///
/// Missing required fields, unexpected fields and wrong JSON types are all
/// argument errors, not business failures.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: ToolName, args: ToolArgs) -> Result<T, ToolError> {
    serde_json::from_value(serde_json::Value::Object(args))
        .map_err(|e| ToolError::InvalidArguments(format!("{tool}: {e}")))
}

/// Accept `12.5` as well as `"12.5"`; models quote numbers often enough.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s
            .trim()
            .trim_start_matches('$')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got \"{s}\""))),
    }
}
