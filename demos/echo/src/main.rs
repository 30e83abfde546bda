//! Echo Demo
//!
//! Drives a handwire chain with in-memory requests and prints what each
//! request wrote.
//!
//! The chain:
//!
//! ```text
//! Before  authorize(req)                 -> Result<(), Failure>
//! Before  request_id(req)                -> RequestId
//! Main    echo(msg, id)                  -> Result<Echo, Failure>
//! After   render(response, err, rw)      writes JSON or an error status
//! After   access_log(req, rw, id?)       logs one line per request
//! ```
//!
//! `EchoMessage` is never published by a handler; it is built from the
//! request's query by the constructor the first time `echo` asks for it.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-demo -- "/echo?text=hi" "/echo" --token secret
//! ```

use std::collections::HashMap;
use std::future::{Ready, ready};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use clap::Parser;
use handwire::prelude::*;
use parking_lot::Mutex;
use serde::Serialize;
use tower::ServiceExt;

// ============================================================================
// Transport stand-ins
// ============================================================================

/// An inbound request: a path with an optional query string, plus headers.
#[derive(Debug, Clone)]
struct Request {
    path: String,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
}

impl Injectable for Request {}

impl Request {
    fn parse(target: &str, token: Option<&str>) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let query = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut headers = HashMap::new();
        if let Some(token) = token {
            headers.insert("authorization".to_string(), format!("Bearer {token}"));
        }

        Self {
            path: path.to_string(),
            query,
            headers,
        }
    }
}

/// Collects what handlers write for one request.
#[derive(Debug, Clone, Default)]
struct Recorder {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Debug, Default)]
struct Recorded {
    status: u16,
    body: String,
}

impl Injectable for Recorder {}

impl Recorder {
    fn write(&self, status: u16, body: impl Into<String>) {
        let mut recorded = self.inner.lock();
        recorded.status = status;
        recorded.body = body.into();
    }

    fn status(&self) -> u16 {
        self.inner.lock().status
    }

    fn body(&self) -> String {
        self.inner.lock().body.clone()
    }
}

// ============================================================================
// Domain values
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct RequestId(u64);

impl Injectable for RequestId {}

/// Built by the constructor from the request query.
#[derive(Debug, Clone)]
struct EchoMessage(String);

impl Injectable for EchoMessage {}

#[derive(Debug, Clone, Serialize)]
struct Echo {
    id: u64,
    text: String,
    length: usize,
}

impl Injectable for Echo {}

#[derive(Debug)]
enum DemoError {
    Unauthorized,
    MissingText,
}

impl std::fmt::Display for DemoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("missing or invalid token"),
            Self::MissingText => f.write_str("query parameter `text` is required"),
        }
    }
}

impl std::error::Error for DemoError {}

// ============================================================================
// Handler Functions
// ============================================================================

/// Requires `Authorization: Bearer <expected>` when a token is configured.
fn authorizer(
    expected: Option<String>,
) -> impl Fn(Request) -> Ready<Result<(), DemoError>> + Clone + Send + Sync + 'static {
    move |req: Request| {
        let authorized = match &expected {
            None => true,
            Some(token) => req
                .headers
                .get("authorization")
                .and_then(|v| v.strip_prefix("Bearer "))
                .is_some_and(|v| v == token),
        };
        ready(if authorized {
            Ok(())
        } else {
            Err(DemoError::Unauthorized)
        })
    }
}

async fn echo(msg: EchoMessage, id: RequestId) -> Result<Echo, Failure> {
    Ok(Echo {
        id: id.0,
        length: msg.0.chars().count(),
        text: msg.0,
    })
}

async fn render(response: Response, err: Option<Failure>, rw: Recorder) -> Result<(), Failure> {
    if let Some(err) = err {
        let status = match err.downcast_ref::<DemoError>() {
            Some(DemoError::Unauthorized) => 401,
            _ => 400,
        };
        let body = serde_json::json!({ "error": err.to_string() });
        rw.write(status, body.to_string());
        return Ok(());
    }

    let echo = response
        .get::<Echo>()
        .ok_or_else(|| Failure::msg("no response to render"))?;
    rw.write(200, serde_json::to_string(&echo)?);
    Ok(())
}

async fn access_log(req: Request, rw: Recorder, id: Option<RequestId>) {
    tracing::info!(
        id = id.map(|id| id.0),
        path = %req.path,
        status = rw.status(),
        "request served"
    );
}

fn build_chain(config: &HandwireConfig, token: Option<String>) -> Result<Chain, SetupError> {
    let next_id = Arc::new(AtomicU64::new(1));
    let request_id = move |_req: Request| {
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        async move { RequestId(id) }
    };

    let constructors = ConstructorMap::new().with(|exchange| {
        let req = exchange
            .request::<Request>()
            .ok_or_else(|| Failure::msg("request is not a demo request"))?;
        let text = req.query.get("text").ok_or(DemoError::MissingText)?;
        Ok(EchoMessage(text.replace('+', " ")))
    });

    Ok(Chain::new(echo)?
        .before(authorizer(token))?
        .before(request_id)?
        .after(render)?
        .after(access_log)?
        .constructor(constructors)
        .config(config.chain.clone()))
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Debug, Parser)]
#[command(about = "Runs an echo chain against in-memory requests")]
struct Args {
    /// Request targets, e.g. `/echo?text=hello+world`.
    #[arg(default_values = ["/echo?text=hello+world", "/echo"])]
    targets: Vec<String>,

    /// Token the requests carry.
    #[arg(long)]
    token: Option<String>,

    /// Token the chain requires; no check when omitted.
    #[arg(long)]
    require_token: Option<String>,

    /// Configuration file, instead of searching for `handwire.toml`.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Configuration profile.
    #[arg(long)]
    profile: Option<String>,

    /// Log level, over the configuration file and environment.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    if let Some(level) = &args.log_level {
        loader = loader.merge("logging.level", level);
    }
    let config = bootstrap(loader)?;

    let chain = build_chain(&config, args.require_token.clone())?;
    let service: ChainService<Request, Recorder> = chain.into();

    for target in &args.targets {
        let recorder = Recorder::default();
        let request = Request::parse(target, args.token.as_deref());
        let registry = service
            .clone()
            .oneshot((request, recorder.clone()))
            .await?;

        println!("{target} -> {} {}", recorder.status(), recorder.body());
        if let Some(err) = registry.error() {
            tracing::debug!(error = %err, "request finished with an error");
        }
    }

    Ok(())
}
