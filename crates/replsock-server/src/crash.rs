use std::error::Error;

use tracing::error;

/// Sink for unexpected errors that should reach process-wide crash
/// reporting. Implementations must not panic.
pub trait CrashReporter: Send + Sync {
    fn report(&self, error: &(dyn Error + 'static), context: &str);
}

/// Default sink: logs the error chain at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrashReporter;

impl CrashReporter for TracingCrashReporter {
    fn report(&self, err: &(dyn Error + 'static), context: &str) {
        let mut chain = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        error!(context = context, error = %chain, "crash report");
    }
}

pub(crate) fn context_label(endpoint: &str) -> String {
    format!("REPL: {endpoint}")
}
