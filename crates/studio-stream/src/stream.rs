use std::fmt;

/// Why a stream finished successfully.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The first choice reported `finish_reason: "stop"`.
    Stop,
    /// The first choice reported `finish_reason: "tool_calls"`.
    ToolCalls,
    /// The `[DONE]` sentinel arrived or the transport closed cleanly.
    Done,
}

impl FinishReason {
    /// Maps a wire finish reason to a terminal reason, if it is one.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "stop" => Some(Self::Stop),
            "tool_calls" => Some(Self::ToolCalls),
            _ => None,
        }
    }

    /// Wire spelling, `done` for the sentinel case.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::ToolCalls => "tool_calls",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live generation statistics. The latest `Usage` event replaces the previous one.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamStats {
    /// Completion tokens generated so far.
    pub tokens: u64,
    /// Generation speed as reported by the server.
    pub tokens_per_second: f64,
    /// Whether the server reused a cached prompt prefix.
    pub cache_hit: bool,
    /// Prompt tokens, when the server reports them.
    pub prompt_tokens: Option<u64>,
}

/// One decoded unit from the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Partial user-visible text.
    ContentDelta(String),
    /// Partial reasoning text delivered outside the content field.
    ReasoningDelta(String),
    /// Usage statistics update.
    Usage(StreamStats),
    /// Payload carried an explicit `error` field.
    Error(String),
    /// The first choice finished.
    Finished(FinishReason),
}

impl StreamEvent {
    /// Returns true if no event may follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Finished(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stop_and_tool_calls_are_terminal_wire_reasons() {
        assert_eq!(FinishReason::from_wire("stop"), Some(FinishReason::Stop));
        assert_eq!(
            FinishReason::from_wire("tool_calls"),
            Some(FinishReason::ToolCalls)
        );
        assert_eq!(FinishReason::from_wire("length"), None);
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Finished(FinishReason::Stop).is_terminal());
        assert!(StreamEvent::Error("boom".into()).is_terminal());
        assert!(!StreamEvent::ContentDelta("x".into()).is_terminal());
        assert!(!StreamEvent::Usage(StreamStats::default()).is_terminal());
    }
}
