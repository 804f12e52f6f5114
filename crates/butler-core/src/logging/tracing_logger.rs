//! Logger backed by the `tracing` crate

use tracing_subscriber::EnvFilter;

use super::traits::Logger;

/// Forwards engine log lines to `tracing` under a fixed target
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    component: Option<String>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every message with a component field (e.g. "registry")
    pub fn with_component(component: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
        }
    }

    fn component(&self) -> &str {
        self.component.as_deref().unwrap_or("butler")
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "butler_core", component = self.component(), "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "butler_core", component = self.component(), "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "butler_core", component = self.component(), "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "butler_core", component = self.component(), "{}", message);
    }
}

/// Install a stderr fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` if a global
/// subscriber was already set.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_logger_logs() {
        // No subscriber installed: every call must be a silent no-op
        let logger = TracingLogger::with_component("registry");
        assert_eq!(logger.component(), "registry");
        logger.debug("debug message");
        logger.info("info message");
        logger.warn("warn message");
        logger.error("error message");

        assert_eq!(TracingLogger::new().component(), "butler");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let first = init_tracing("butler_core=debug");
        let second = init_tracing("butler_core=debug");
        assert!(!(first && second));
    }
}
