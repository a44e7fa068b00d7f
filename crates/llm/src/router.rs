use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::provider::LlmProvider;

const CANNED_FALLBACK: &str = "I'm having trouble finding the right words right now — could we try that again in a moment?";

/// Two-attempt-at-most router (spec §4.6 "LLM invocation contract"):
/// primary call with the full assembled prompt, and on error a fallback
/// call with just the bare user message; if that also errors, a final
/// canned line is returned rather than propagating the failure.
#[derive(Clone)]
pub struct LlmRouter {
    provider: Arc<dyn LlmProvider>,
}

impl LlmRouter {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn generate_with_fallback(
        &self,
        assembled_prompt: &str,
        bare_user_message: &str,
        user_id: &str,
        deadline: Duration,
    ) -> String {
        match self.provider.generate(assembled_prompt, user_id, deadline).await {
            Ok(text) => return text,
            Err(err) => warn!(?err, "primary llm call failed, retrying with bare message"),
        }

        match self.provider.generate(bare_user_message, user_id, deadline).await {
            Ok(text) => text,
            Err(err) => {
                warn!(?err, "fallback llm call failed, returning canned response");
                CANNED_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::LlmError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        calls: AtomicUsize,
        fail_first_n: usize,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        async fn generate(&self, prompt: &str, _user_id: &str, _deadline: Duration) -> Result<String, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                Err(LlmError::Provider("simulated failure".to_string()))
            } else {
                Ok(format!("echo: {prompt}"))
            }
        }
    }

    #[tokio::test]
    async fn succeeds_on_primary_attempt() {
        let router = LlmRouter::new(Arc::new(FlakyProvider { calls: AtomicUsize::new(0), fail_first_n: 0 }));
        let text = router.generate_with_fallback("full prompt", "hi", "alex", Duration::from_secs(1)).await;
        assert_eq!(text, "echo: full prompt");
    }

    #[tokio::test]
    async fn falls_back_to_bare_message_after_one_failure() {
        let router = LlmRouter::new(Arc::new(FlakyProvider { calls: AtomicUsize::new(0), fail_first_n: 1 }));
        let text = router.generate_with_fallback("full prompt", "hi", "alex", Duration::from_secs(1)).await;
        assert_eq!(text, "echo: hi");
    }

    #[tokio::test]
    async fn returns_canned_text_after_two_failures() {
        let router = LlmRouter::new(Arc::new(FlakyProvider { calls: AtomicUsize::new(0), fail_first_n: 2 }));
        let text = router.generate_with_fallback("full prompt", "hi", "alex", Duration::from_secs(1)).await;
        assert_eq!(text, CANNED_FALLBACK);
    }
}
