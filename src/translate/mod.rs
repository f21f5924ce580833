//! Schema translation between the OpenAI, Anthropic and Bedrock shapes.
//!
//! All translation functions are pure (no I/O).

pub mod anthropic_types;
pub mod bedrock_types;
pub mod openai_types;
pub mod request;
pub mod response;

use serde::{Deserialize, Deserializer};

/// Token counts arrive as `1024` or `1024.0` depending on the client's JSON
/// encoder. Whole non-negative numbers are accepted either way.
pub(crate) fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => {
            Ok(Some(n as u64))
        }
        Some(n) => Err(serde::de::Error::custom(format!(
            "expected a whole non-negative number, got {}",
            n
        ))),
    }
}
