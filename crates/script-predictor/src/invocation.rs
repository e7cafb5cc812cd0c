//! Running a predictor body against one query.
//!
//! An invocation layers three things around the user's script before handing
//! it to a checked-out [`ExecutionContext`]:
//!
//! 1. the suggestion vocabulary registered on every engine (see
//!    [`context`](crate::context)),
//! 2. an error trap: errors raised while the body runs are reported on the
//!    diagnostic channel and turn into an empty result,
//! 3. scope bindings for the two positional arguments: `args` holds
//!    `[line, context]`, `line` and `context` name them, and `item` is a
//!    short alias for `args[0]`.
//!
//! Failures the trap cannot see, such as a syntax error in the body, are
//! reported and returned to the caller.

use std::sync::Arc;

use rhai::{Array, Dynamic, EvalAltResult, Scope};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;
use crate::diagnostics::{Diagnostic, DiagnosticSink, report};
use crate::error::PredictorError;
use crate::types::{PredictionClient, PredictionContext};

/// The user-supplied predictor body
///
/// Immutable and cheap to clone. The source is compiled again on every
/// invocation.
#[derive(Debug, Clone)]
pub struct PredictorScript {
    source: Arc<str>,
}

impl PredictorScript {
    /// Wrap script source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Arc::from(source.into()),
        }
    }

    /// Script source, verbatim.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Structured context as the script sees it
#[derive(Serialize)]
struct ScriptContext<'a> {
    #[serde(flatten)]
    context: &'a PredictionContext,
    client: &'a PredictionClient,
}

/// Arguments for one invocation, already converted for the engine
#[derive(Debug, Clone)]
pub(crate) struct QueryRequest {
    line: String,
    context: Dynamic,
}

impl QueryRequest {
    pub(crate) fn new(
        client: &PredictionClient,
        context: &PredictionContext,
    ) -> Result<Self, PredictorError> {
        let view = ScriptContext { context, client };
        let context = rhai::serde::to_dynamic(&view).map_err(|e| PredictorError::Script {
            kind: "SerializationError".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            line: view.context.input.clone(),
            context,
        })
    }

    fn into_scope(self) -> Scope<'static> {
        let line = Dynamic::from(self.line);
        let args: Array = vec![line.clone(), self.context.clone()];

        let mut scope = Scope::new();
        scope.push_dynamic("line", line.clone());
        scope.push_dynamic("context", self.context);
        scope.push("args", args);
        scope.push_dynamic("item", line);
        scope
    }
}

/// Evaluate `script` for `request` on `context`.
///
/// Returns the raw output stream. Errors raised by the script body are
/// trapped and produce an empty stream; so does cancellation while the
/// script runs. Anything else is reported to `sink` and returned.
pub(crate) fn invoke(
    context: &mut ExecutionContext,
    script: &PredictorScript,
    request: QueryRequest,
    cancel: &CancellationToken,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<Dynamic>, PredictorError> {
    let ast = match context.compile(script.source()) {
        Ok(ast) => ast,
        Err(e) => {
            let err = PredictorError::Script {
                kind: "ParseError".to_string(),
                message: e.to_string(),
            };
            report(
                sink,
                Diagnostic::Untrapped {
                    kind: err.kind().to_string(),
                    message: err.message(),
                },
            );
            return Err(err);
        }
    };

    let mut scope = request.into_scope();
    match context.eval(&ast, &mut scope, Some(cancel.clone())) {
        Ok(output) => Ok(output),
        Err(e) if matches!(*e, EvalAltResult::ErrorTerminated(..)) => {
            tracing::debug!(context = context.id(), "predictor script cancelled");
            Ok(Vec::new())
        }
        Err(e) => {
            report(
                sink,
                Diagnostic::Trapped {
                    kind: error_kind(&e).to_string(),
                    message: e.to_string(),
                },
            );
            Ok(Vec::new())
        }
    }
}

/// Qualified identifier of a script error.
fn error_kind(err: &EvalAltResult) -> &'static str {
    match err {
        EvalAltResult::ErrorRuntime(..) => "ErrorRuntime",
        EvalAltResult::ErrorFunctionNotFound(..) => "ErrorFunctionNotFound",
        EvalAltResult::ErrorVariableNotFound(..) => "ErrorVariableNotFound",
        EvalAltResult::ErrorPropertyNotFound(..) => "ErrorPropertyNotFound",
        EvalAltResult::ErrorIndexNotFound(..) => "ErrorIndexNotFound",
        EvalAltResult::ErrorInFunctionCall(..) => "ErrorInFunctionCall",
        EvalAltResult::ErrorMismatchDataType(..) => "ErrorMismatchDataType",
        EvalAltResult::ErrorMismatchOutputType(..) => "ErrorMismatchOutputType",
        EvalAltResult::ErrorIndexingType(..) => "ErrorIndexingType",
        EvalAltResult::ErrorArrayBounds(..) => "ErrorArrayBounds",
        EvalAltResult::ErrorStringBounds(..) => "ErrorStringBounds",
        EvalAltResult::ErrorArithmetic(..) => "ErrorArithmetic",
        EvalAltResult::ErrorDotExpr(..) => "ErrorDotExpr",
        EvalAltResult::ErrorAssignmentToConstant(..) => "ErrorAssignmentToConstant",
        EvalAltResult::ErrorStackOverflow(..) => "ErrorStackOverflow",
        EvalAltResult::ErrorTooManyOperations(..) => "ErrorTooManyOperations",
        EvalAltResult::ErrorTerminated(..) => "ErrorTerminated",
        _ => "EvalAltResult",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::types::ClientKind;

    fn request(line: &str) -> QueryRequest {
        let client = PredictionClient::new("test", ClientKind::Terminal);
        let context = PredictionContext::new(line).with_history(vec!["git status".into()]);
        QueryRequest::new(&client, &context).unwrap()
    }

    fn run(script: &str, line: &str, sink: &MemorySink) -> Result<Vec<String>, PredictorError> {
        let mut context = ExecutionContext::new(0);
        let output = invoke(
            &mut context,
            &PredictorScript::new(script),
            request(line),
            &CancellationToken::new(),
            sink,
        )?;
        Ok(output.into_iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_positional_bindings() {
        let sink = MemorySink::new();
        let output = run(
            r#"[line, item, args[0], context.input, `${args.len()}`]"#,
            "git ch",
            &sink,
        )
        .unwrap();

        assert_eq!(output, ["git ch", "git ch", "git ch", "git ch", "2"]);
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn test_context_exposes_client_and_history() {
        let sink = MemorySink::new();
        let output = run(
            r#"[context.client.name, context.client.kind, context.history[0], `${context.cursor}`]"#,
            "ls",
            &sink,
        )
        .unwrap();

        assert_eq!(output, ["test", "terminal", "git status", "2"]);
    }

    #[test]
    fn test_thrown_error_is_trapped() {
        let sink = MemorySink::new();
        let output = run(r#"throw "no idea""#, "x", &sink).unwrap();

        assert!(output.is_empty());
        let diagnostics = sink.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            Diagnostic::Trapped { kind, message } => {
                assert_eq!(kind, "ErrorRuntime");
                assert!(message.contains("no idea"));
            }
            other => panic!("unexpected diagnostic: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_function_is_trapped() {
        let sink = MemorySink::new();
        let output = run("no_such_function(item)", "x", &sink).unwrap();

        assert!(output.is_empty());
        assert!(sink.lines()[0].contains("ErrorFunctionNotFound"));
    }

    #[test]
    fn test_emitted_items_dropped_when_body_fails() {
        let sink = MemorySink::new();
        let output = run(r#"emit("partial"); throw "late failure""#, "x", &sink).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_syntax_error_is_untrapped() {
        let sink = MemorySink::new();
        let err = run("let = ;", "x", &sink).unwrap_err();

        assert!(matches!(err, PredictorError::Script { ref kind, .. } if kind == "ParseError"));
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("untrapped predictor error - ParseError"));
    }

    #[test]
    fn test_cancelled_run_is_silent() {
        let sink = MemorySink::new();
        let mut context = ExecutionContext::new(0);
        let token = CancellationToken::new();
        token.cancel();

        let output = invoke(
            &mut context,
            &PredictorScript::new("loop { emit(item); }"),
            request("x"),
            &token,
            &sink,
        )
        .unwrap();

        assert!(output.is_empty());
        assert!(sink.diagnostics().is_empty());
    }
}
