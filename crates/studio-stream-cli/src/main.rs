//! Streams a chat completion from a local OpenAI-compatible server and prints
//! it as it arrives.
//!
//! ```text
//! studio-stream --model qwen3-8b "Explain borrowing in two sentences"
//! studio-stream --model qwen3-8b --compare 2 --html "Write a haiku"
//! ```

use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use studio_stream::observability::init_observability;
use studio_stream::prelude::*;
use studio_stream::segment::THINK_OPEN;
use studio_stream::{RenderedSegment, SegmentKind};

#[derive(Debug, Parser)]
#[command(name = "studio-stream", about = "Stream a chat completion and render it live")]
struct Args {
    /// User prompt.
    prompt: String,

    /// Model name sent to the server.
    #[arg(short, long)]
    model: String,

    /// Server base URL; overrides STUDIO_STREAM_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Optional system prompt.
    #[arg(short, long)]
    system: Option<String>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(long)]
    temperature: Option<f32>,

    /// Run the same prompt this many times side by side under one key.
    #[arg(long, default_value_t = 1)]
    compare: usize,

    /// Hide thinking sections.
    #[arg(long)]
    hide_thinking: bool,

    /// Print the final rendered markup instead of raw text.
    #[arg(long)]
    html: bool,
}

/// Tracks which part of the content text has reached the terminal.
#[derive(Debug, Default)]
struct ContentEcho {
    printed: String,
}

impl ContentEcho {
    /// Returns the text to write for the latest content.
    ///
    /// A trailing partial `<think>` tag is held back. If content no longer
    /// extends what was printed, it is written again on a new line.
    fn advance(&mut self, content: &str) -> String {
        let stable = &content[..content.len() - partial_tag_len(content)];
        let out = match stable.strip_prefix(self.printed.as_str()) {
            Some(fresh) => fresh.to_string(),
            None => format!("\n{stable}"),
        };
        self.printed.clear();
        self.printed.push_str(stable);
        out
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the
/// opening thinking tag.
fn partial_tag_len(text: &str) -> usize {
    (1..THINK_OPEN.len())
        .rev()
        .find(|n| text.ends_with(&THINK_OPEN[..*n]))
        .unwrap_or(0)
}

/// Prints content deltas to stdout as they arrive.
struct LivePrinter {
    label: Option<String>,
    echo: ContentEcho,
    html: bool,
    last: Vec<RenderedSegment>,
}

impl LivePrinter {
    fn new(label: Option<String>, html: bool) -> Self {
        Self {
            label,
            echo: ContentEcho::default(),
            html,
            last: Vec::new(),
        }
    }
}

impl StreamObserver for LivePrinter {
    fn on_update(&mut self, snapshot: &StreamSnapshot) {
        self.last.clone_from(&snapshot.segments);
        if self.html || self.label.is_some() {
            return;
        }
        let fresh = self.echo.advance(&snapshot.content_text());
        if !fresh.is_empty() {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(fresh.as_bytes());
            let _ = out.flush();
        }
    }

    fn on_complete(&mut self, result: Result<FinishReason, StreamError>) {
        let prefix = self
            .label
            .as_deref()
            .map(|l| format!("[{l}] "))
            .unwrap_or_default();
        if self.html {
            for segment in &self.last {
                if let Some(markup) = &segment.markup {
                    let tag = match segment.kind {
                        SegmentKind::Thinking => "thinking",
                        SegmentKind::Content => "content",
                    };
                    println!("{prefix}<!-- {tag} -->{}", markup.markup);
                }
            }
        } else if self.label.is_some() {
            let text: String = self
                .last
                .iter()
                .filter(|s| s.kind == SegmentKind::Content)
                .map(|s| s.text.as_str())
                .collect();
            println!("{prefix}{text}");
        } else {
            println!();
        }
        match result {
            Ok(reason) => eprintln!("{prefix}finished: {reason}"),
            Err(err) => eprintln!("{prefix}failed: {err}"),
        }
    }
}

fn build_request(args: &Args) -> ChatRequest {
    let mut request = ChatRequest::new(&args.model).key("cli");
    if let Some(system) = &args.system {
        request = request.system_prompt(system);
    }
    request = request.user_text(&args.prompt);
    if let Some(max_tokens) = args.max_tokens {
        request = request.max_tokens(max_tokens);
    }
    if let Some(temperature) = args.temperature {
        request = request.temperature(temperature);
    }
    request
}

fn build_orchestrator(args: &Args) -> Result<StreamOrchestrator, StreamError> {
    let mut config = TransportConfig::from_env()?;
    if let Some(base_url) = &args.base_url {
        config = config.base_url(base_url);
    }
    let transport = Arc::new(HttpTransport::new(config)?);
    let policy = if args.hide_thinking {
        ThinkingPolicy::Suppress
    } else {
        ThinkingPolicy::Show
    };
    let orchestrator = StreamOrchestrator::new(transport).thinking_policy(policy);
    #[cfg(feature = "syntect")]
    let orchestrator =
        orchestrator.highlighter(Arc::new(studio_stream::SyntectHighlighter::new()));
    Ok(orchestrator)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_observability();
    let args = Args::parse();

    let orchestrator = build_orchestrator(&args)?;
    let request = build_request(&args);
    let count = args.compare.max(1);

    let mut handles = Vec::with_capacity(count);
    for index in 0..count {
        let label = (count > 1).then(|| format!("{}", index + 1));
        let observer = LivePrinter::new(label, args.html);
        handles.push(orchestrator.open_stream(request.clone(), observer)?);
    }

    let cancels: Vec<CancelHandle> = handles.iter().map(StreamHandle::cancel_handle).collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            for cancel in &cancels {
                cancel.cancel();
            }
        }
    });

    let mut failed = false;
    for handle in handles {
        let summary = handle.join().await?;
        tracing::debug!(stream_id = %summary.stream_id, chars = summary.text.len(), "stream joined");
        match summary.outcome {
            StreamOutcome::Finished(_) => {}
            StreamOutcome::Failed(_) => failed = true,
            StreamOutcome::Cancelled => {
                eprintln!("cancelled");
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
