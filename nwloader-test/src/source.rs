use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use nwloader::{BoxError, Source};

/// Loader source that counts its invocations.
///
/// Fetches resolve to `{"id": <args>}` after an optional delay. A single
/// argument value can be armed to fail instead, for exercising the error
/// paths.
#[derive(Clone, Debug, Default)]
pub struct CountingSource {
    delay: Duration,
    fail_on: Option<(String, String)>,
    calls: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated upstream latency per fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes fetches for `arg` fail with `message`.
    pub fn fail_on(mut self, arg: impl Into<String>, message: impl Into<String>) -> Self {
        self.fail_on = Some((arg.into(), message.into()));
        self
    }

    /// Number of fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for CountingSource {
    type Args = String;
    type Value = Value;

    async fn fetch(&self, args: &String) -> Result<Value, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some((arg, message)) = &self.fail_on
            && arg == args
        {
            return Err(message.clone().into());
        }
        Ok(json!({ "id": args }))
    }
}
