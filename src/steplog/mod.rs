use std::future::Future;

use crate::Result;

/// Structured per-step logging for one ingestion request.
///
/// Emits through `tracing`; logging can never abort the pipeline, so every
/// method is infallible.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepLogger;

impl StepLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn info(&self, request_id: i64, step: &str, message: &str) {
        tracing::info!(request_id, step, "{message}");
    }

    pub fn error(&self, request_id: i64, step: &str, message: &str, err: &anyhow::Error) {
        tracing::error!(request_id, step, "{message}: {err:#}");
    }

    /// Run `op` bracketed by entry/success/failure log lines
    pub async fn with_step<T, F, Fut>(&self, request_id: i64, step: &str, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.info(request_id, step, "started");
        match op().await {
            Ok(value) => {
                self.info(request_id, step, "completed");
                Ok(value)
            }
            Err(err) => {
                self.error(request_id, step, "failed", &err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_step_passes_through_success_value() {
        let log = StepLogger::new();
        let value = log
            .with_step(1, "resolve", || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_step_passes_through_error() {
        let log = StepLogger::new();
        let result: Result<()> = log
            .with_step(1, "fetch", || async { anyhow::bail!("boom") })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
