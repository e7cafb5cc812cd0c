//! The predictor facade handed to the host.
//!
//! # Example
//!
//! ```rust,ignore
//! use script_predictor::{CommandPredictor, PredictionClient, PredictionContext, ScriptPredictor};
//! use tokio_util::sync::CancellationToken;
//!
//! let predictor = ScriptPredictor::builder(r#"
//!     if item.starts_with("git ") { ["git status", suggestion("git stash", "stash changes")] }
//! "#)
//! .name("git")
//! .description("Suggests a couple of git commands")
//! .build()?;
//!
//! let package = predictor
//!     .get_suggestion(
//!         &PredictionClient::default(),
//!         &PredictionContext::new("git s"),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::PredictorConfig;
use crate::diagnostics::{ConsoleSink, Diagnostic, DiagnosticSink, report};
use crate::error::PredictorError;
use crate::invocation::{self, PredictorScript, QueryRequest};
use crate::latency::LatencyMonitor;
use crate::normalize::normalize;
use crate::pool::ContextPool;
use crate::types::{
    FeedbackKind, PredictionClient, PredictionContext, PredictorIdentity, SuggestionPackage,
};

/// Capabilities a host expects from a predictor
///
/// Only [`get_suggestion`](Self::get_suggestion) has to do real work; the
/// feedback hooks default to doing nothing.
#[async_trait]
pub trait CommandPredictor: Send + Sync {
    /// Unique id of the predictor.
    fn id(&self) -> Uuid;

    /// Display name.
    fn name(&self) -> &str;

    /// Display description.
    fn description(&self) -> &str;

    /// Produce suggestions for the line described by `context`.
    async fn get_suggestion(
        &self,
        client: &PredictionClient,
        context: &PredictionContext,
        cancel: &CancellationToken,
    ) -> Result<SuggestionPackage, PredictorError>;

    /// Whether the predictor wants feedback of the given kind.
    fn can_accept_feedback(&self, _client: &PredictionClient, _feedback: FeedbackKind) -> bool {
        false
    }

    /// A command line was accepted.
    fn on_command_line_accepted(&self, _client: &PredictionClient, _history: &[String]) {}

    /// A command line finished executing.
    fn on_command_line_executed(
        &self,
        _client: &PredictionClient,
        _command_line: &str,
        _success: bool,
    ) {
    }

    /// A suggestion from this predictor was accepted.
    fn on_suggestion_accepted(&self, _client: &PredictionClient, _session: u32, _accepted: &str) {}

    /// Suggestions from this predictor were displayed.
    fn on_suggestion_displayed(
        &self,
        _client: &PredictionClient,
        _session: u32,
        _count_or_index: i32,
    ) {
    }
}

/// Builder for a [`ScriptPredictor`]
pub struct ScriptPredictorBuilder {
    script: PredictorScript,
    name: String,
    description: String,
    id: Option<Uuid>,
    config: PredictorConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for ScriptPredictorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptPredictorBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScriptPredictorBuilder {
    fn new(script: impl Into<String>) -> Self {
        Self {
            script: PredictorScript::new(script),
            name: "ScriptPredictor".to_string(),
            description: "Suggestions from a user supplied script".to_string(),
            id: None,
            config: PredictorConfig::default(),
            sink: Arc::new(ConsoleSink),
        }
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the display description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Use a fixed id instead of a random one.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: PredictorConfig) -> Self {
        self.config = config;
        self
    }

    /// Send diagnostics somewhere other than stdout.
    pub fn diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Send diagnostics to a shared sink.
    pub fn diagnostics_arc(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the predictor, warming up its context pool if configured.
    pub fn build(self) -> Result<ScriptPredictor, PredictorError> {
        self.config.validate()?;
        let pool = ContextPool::new(self.config.pool_capacity, self.config.warm_up)?;
        let identity = PredictorIdentity::new(self.name, self.description, self.id);
        tracing::info!(
            id = %identity.id,
            name = %identity.name,
            capacity = self.config.pool_capacity,
            "created script predictor"
        );

        Ok(ScriptPredictor {
            identity,
            script: self.script,
            pool,
            latency: LatencyMonitor::new(self.config.slow_threshold),
            sink: self.sink,
        })
    }
}

/// A predictor whose suggestions come from a user supplied script
///
/// Queries run concurrently, each on its own context from a bounded pool.
/// Errors in the script are reported on the diagnostic channel, since the
/// host drops failed predictions without a trace.
pub struct ScriptPredictor {
    identity: PredictorIdentity,
    script: PredictorScript,
    pool: ContextPool,
    latency: LatencyMonitor,
    sink: Arc<dyn DiagnosticSink>,
}

impl fmt::Debug for ScriptPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptPredictor")
            .field("identity", &self.identity)
            .field("pool", &self.pool)
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl ScriptPredictor {
    /// Start building a predictor for `script`.
    pub fn builder(script: impl Into<String>) -> ScriptPredictorBuilder {
        ScriptPredictorBuilder::new(script)
    }

    /// Create a predictor with the default configuration.
    pub fn new(
        script: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        id: Option<Uuid>,
    ) -> Result<Self, PredictorError> {
        let builder = Self::builder(script).name(name).description(description);
        match id {
            Some(id) => builder.id(id).build(),
            None => builder.build(),
        }
    }

    /// Identity of the predictor.
    pub fn identity(&self) -> &PredictorIdentity {
        &self.identity
    }

    /// The predictor body.
    pub fn script(&self) -> &PredictorScript {
        &self.script
    }

    /// The context pool backing this predictor.
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Report an error that is about to escape and hand it back.
    fn surface(&self, err: PredictorError) -> PredictorError {
        report(
            self.sink.as_ref(),
            Diagnostic::Untrapped {
                kind: err.kind().to_string(),
                message: err.message(),
            },
        );
        err
    }
}

#[async_trait]
impl CommandPredictor for ScriptPredictor {
    fn id(&self) -> Uuid {
        self.identity.id
    }

    fn name(&self) -> &str {
        &self.identity.name
    }

    fn description(&self) -> &str {
        &self.identity.description
    }

    async fn get_suggestion(
        &self,
        client: &PredictionClient,
        context: &PredictionContext,
        cancel: &CancellationToken,
    ) -> Result<SuggestionPackage, PredictorError> {
        let started = self.latency.start();

        if cancel.is_cancelled() {
            tracing::debug!("query cancelled before start");
            return Ok(SuggestionPackage::empty());
        }

        let request = QueryRequest::new(client, context).map_err(|e| self.surface(e))?;

        let mut pooled = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("query cancelled while waiting for a context");
                return Ok(SuggestionPackage::empty());
            }
            acquired = self.pool.acquire() => acquired.map_err(|e| self.surface(e))?,
        };

        let script = self.script.clone();
        let sink = Arc::clone(&self.sink);
        let token = cancel.clone();
        let joined = tokio::task::spawn_blocking(move || {
            invocation::invoke(&mut pooled, &script, request, &token, sink.as_ref())
        })
        .await;

        let output = match joined {
            Ok(result) => result?,
            Err(e) => return Err(self.surface(PredictorError::Join(e.to_string()))),
        };
        let suggestions = normalize(output).map_err(|e| self.surface(e))?;

        self.latency.finish(started, self.sink.as_ref());

        if cancel.is_cancelled() {
            tracing::debug!("query cancelled, dropping {} suggestions", suggestions.len());
            return Ok(SuggestionPackage::empty());
        }
        Ok(SuggestionPackage::new(suggestions))
    }
}
