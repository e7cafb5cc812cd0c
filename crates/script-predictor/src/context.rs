//! Reusable script execution contexts.
//!
//! An [`ExecutionContext`] owns one `rhai` engine with the predictor
//! vocabulary registered on it. Contexts are created by the
//! [`ContextPool`](crate::ContextPool) and reused for many invocations; each
//! invocation starts from an empty scope, so nothing a script defines leaks
//! into the next query.
//!
//! ## Vocabulary
//!
//! Every engine knows about:
//!
//! - `suggestion(text)` and `suggestion(text, tooltip)` to build suggestion
//!   records, with `.text` and `.tooltip` getters
//! - `emit(item)` to push a candidate onto the output stream
//! - `print` / `debug`, which go to `tracing` instead of stdout

use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{AST, Array, Dynamic, Engine, EvalAltResult, ImmutableString, ParseError, Scope};
use tokio_util::sync::CancellationToken;

use crate::types::Suggestion;

/// How many operations run between two cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 64;

/// State shared between a context and the closures registered on its engine.
#[derive(Debug, Default)]
struct InvocationState {
    emitted: Vec<Dynamic>,
    cancel: Option<CancellationToken>,
}

/// An isolated, reusable interpreter session
pub struct ExecutionContext {
    id: usize,
    engine: Engine,
    state: Arc<Mutex<InvocationState>>,
    invocations: u64,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("invocations", &self.invocations)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Create a context with a fresh engine.
    pub(crate) fn new(id: usize) -> Self {
        let state = Arc::new(Mutex::new(InvocationState::default()));
        let engine = create_engine(&state);
        tracing::debug!(context = id, "created execution context");
        Self {
            id,
            engine,
            state,
            invocations: 0,
        }
    }

    /// Sequential id assigned by the pool.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of scripts evaluated on this context.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Run an empty script so the first real query does not pay for
    /// engine initialization.
    pub(crate) fn warm_up(&mut self) -> Result<(), Box<EvalAltResult>> {
        self.engine.run("")?;
        self.invocations += 1;
        Ok(())
    }

    /// Compile a script against this context's engine.
    pub(crate) fn compile(&self, script: &str) -> Result<AST, ParseError> {
        self.engine.compile(script)
    }

    /// Evaluate a compiled script and collect its output stream.
    ///
    /// The stream is every `emit`ted item in order, followed by the script's
    /// final value (flattened one level when it is an array, skipped when it
    /// is unit). A cancelled `cancel` token terminates the script with
    /// `ErrorTerminated` at the next check.
    pub(crate) fn eval(
        &mut self,
        ast: &AST,
        scope: &mut Scope<'_>,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<Dynamic>, Box<EvalAltResult>> {
        self.invocations += 1;
        {
            let mut state = self.state.lock();
            state.emitted.clear();
            state.cancel = cancel;
        }

        let result = self.engine.eval_ast_with_scope::<Dynamic>(scope, ast);

        let mut output = {
            let mut state = self.state.lock();
            state.cancel = None;
            std::mem::take(&mut state.emitted)
        };
        append_value(&mut output, result?);
        Ok(output)
    }
}

fn append_value(output: &mut Vec<Dynamic>, value: Dynamic) {
    let value = value.flatten();
    if value.is_unit() {
        return;
    }
    if value.is_array() {
        output.extend(value.try_cast::<Array>().unwrap_or_default());
    } else {
        output.push(value);
    }
}

fn create_engine(state: &Arc<Mutex<InvocationState>>) -> Engine {
    let mut engine = Engine::new();

    engine
        .register_type_with_name::<Suggestion>("Suggestion")
        .register_fn("suggestion", |text: ImmutableString| {
            Suggestion::new(text.as_str())
        })
        .register_fn("suggestion", |text: ImmutableString, tooltip: ImmutableString| {
            Suggestion::with_tooltip(text.as_str(), tooltip.as_str())
        })
        .register_get("text", |s: &mut Suggestion| s.text.clone())
        .register_get("tooltip", |s: &mut Suggestion| {
            s.tooltip.clone().map_or(Dynamic::UNIT, Dynamic::from)
        })
        .register_fn("to_string", |s: &mut Suggestion| s.text.clone());

    let emit_state = Arc::clone(state);
    engine.register_fn("emit", move |item: Dynamic| {
        emit_state.lock().emitted.push(item);
    });

    let progress_state = Arc::clone(state);
    engine.on_progress(move |operations| {
        if operations % CANCEL_CHECK_INTERVAL != 0 {
            return None;
        }
        let cancelled = progress_state
            .lock()
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled);
        cancelled.then(|| Dynamic::from("cancelled"))
    });

    engine.on_print(|text| tracing::debug!(target: "script_predictor::script", "{text}"));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(
            target: "script_predictor::script",
            source = source.unwrap_or_default(),
            position = %pos,
            "{text}"
        );
    });

    engine
}
