//! Decodes framed `data:` lines of an OpenAI-compatible chat completion
//! stream into [`StreamEvent`]s.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::stream::{FinishReason, StreamEvent, StreamStats};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Result of decoding one line.
#[derive(Clone, Debug, PartialEq)]
pub enum LineOutcome {
    /// Not a data line, an empty payload, or a payload that failed to parse.
    Skip,
    /// The `[DONE]` sentinel: end of stream, no event.
    Done,
    /// Events decoded from the payload, in the order they apply.
    Events(Vec<StreamEvent>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePayload {
    choices: Option<Vec<WireChoice>>,
    #[serde(deserialize_with = "lenient")]
    usage: Option<WireUsage>,
    #[serde(deserialize_with = "lenient")]
    timings: Option<WireTimings>,
    error: Option<WireError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireChoice {
    delta: Option<WireDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDelta {
    content: Option<String>,
    reasoning: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireUsage {
    #[serde(deserialize_with = "lenient_count")]
    completion_tokens: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    prompt_tokens: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    tokens_per_second: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    generation_tps: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    cache_hit: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireTimings {
    #[serde(deserialize_with = "lenient")]
    predicted_per_second: Option<f64>,
}

/// Statistics are advisory: a field of the wrong shape reads as absent
/// instead of failing the whole payload and its delta.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Like [`lenient`], also accepting whole-valued floats such as `5.0`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64().or_else(|| {
            v.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        })
    }))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireError {
    Message(String),
    Detailed { message: Option<String> },
}

impl WireError {
    fn into_message(self) -> String {
        match self {
            Self::Message(message) | Self::Detailed {
                message: Some(message),
            } => message,
            Self::Detailed { message: None } => "unknown server error".to_string(),
        }
    }
}

impl WireUsage {
    /// Speed field resolution order: `tokens_per_second`, then
    /// `generation_tps`, then llama-server's `timings.predicted_per_second`.
    fn resolve_tokens_per_second(&self, timings: Option<&WireTimings>) -> f64 {
        self.tokens_per_second
            .or(self.generation_tps)
            .or_else(|| timings.and_then(|t| t.predicted_per_second))
            .unwrap_or(0.0)
    }

    fn into_stats(self, timings: Option<&WireTimings>) -> StreamStats {
        StreamStats {
            tokens_per_second: self.resolve_tokens_per_second(timings),
            tokens: self.completion_tokens.unwrap_or(0),
            cache_hit: self.cache_hit.unwrap_or(false),
            prompt_tokens: self.prompt_tokens,
        }
    }
}

/// Extracts the payload of a `data:` line, or `None` for any other line.
pub fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Decodes one framed line.
///
/// Parse failures are logged and skipped; they never end the stream. A payload
/// with an `error` field decodes to a single terminal [`StreamEvent::Error`].
pub fn decode_line(line: &str) -> LineOutcome {
    let Some(payload) = data_payload(line) else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return LineOutcome::Skip;
    }
    if payload == DONE_SENTINEL {
        return LineOutcome::Done;
    }
    match serde_json::from_str::<WirePayload>(payload) {
        Ok(parsed) => LineOutcome::Events(map_payload(parsed)),
        Err(e) => {
            warn!(error = %e, payload, "dropping undecodable stream line");
            LineOutcome::Skip
        }
    }
}

fn map_payload(payload: WirePayload) -> Vec<StreamEvent> {
    if let Some(error) = payload.error {
        return vec![StreamEvent::Error(error.into_message())];
    }

    let mut events = Vec::new();
    let mut finished = None;
    if let Some(choice) = payload.choices.and_then(|c| c.into_iter().next()) {
        if let Some(delta) = choice.delta {
            if let Some(reasoning) = delta
                .reasoning
                .or(delta.reasoning_content)
                .filter(|s| !s.is_empty())
            {
                events.push(StreamEvent::ReasoningDelta(reasoning));
            }
            if let Some(content) = delta.content.filter(|s| !s.is_empty()) {
                events.push(StreamEvent::ContentDelta(content));
            }
        }
        if let Some(reason) = choice.finish_reason.as_deref() {
            finished = FinishReason::from_wire(reason);
            if finished.is_none() {
                debug!(finish_reason = reason, "ignoring non-terminal finish reason");
            }
        }
    }
    if let Some(usage) = payload.usage {
        events.push(StreamEvent::Usage(
            usage.into_stats(payload.timings.as_ref()),
        ));
    }
    if let Some(reason) = finished {
        events.push(StreamEvent::Finished(reason));
    }
    events
}
