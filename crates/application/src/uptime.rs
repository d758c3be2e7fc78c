//! Uptime checker: one health probe composing the invoker, the metrics
//! collector, and the throttle.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::debug;

use arguslm_common::CredentialVault;
use arguslm_domain::monitoring::DEFAULT_PROMPT_PACK;
use arguslm_domain::{get_prompt_pack, Model, ProviderAccount, ProviderCredentials, UptimeCheck};

use crate::invoker::{CompletionRequest, CompletionTarget, ProviderInvoker};
use crate::metrics::{extract_chunk_content, MetricsCollector};
use crate::throttle::ThrottleManager;

/// Health probes are cheap and short: a small token budget on a tight clock.
const UPTIME_MAX_TOKENS: u32 = 100;
const UPTIME_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("{0}")]
    Invoker(#[from] crate::invoker::InvokerError),
    #[error("credential decryption failed: {0}")]
    Vault(#[from] arguslm_common::VaultError),
    #[error("{0}")]
    Domain(#[from] arguslm_domain::DomainError),
    #[error("throttle closed")]
    Throttle(#[from] tokio::sync::AcquireError),
}

/// Streams a short completion against one model and records the outcome.
///
/// The checker never fails: every error becomes a `down` record carrying the
/// error text.
pub struct UptimeChecker {
    invoker: Arc<ProviderInvoker>,
    throttle: Arc<ThrottleManager>,
    vault: Arc<CredentialVault>,
}

impl UptimeChecker {
    pub fn new(
        invoker: Arc<ProviderInvoker>,
        throttle: Arc<ThrottleManager>,
        vault: Arc<CredentialVault>,
    ) -> Self {
        Self {
            invoker,
            throttle,
            vault,
        }
    }

    /// Probe one model. The provider account must be the model's parent.
    pub async fn check(
        &self,
        model: &Model,
        provider: &ProviderAccount,
        prompt_pack: &str,
    ) -> UptimeCheck {
        match self.probe(model, provider, prompt_pack).await {
            Ok(check) => check,
            Err(err) => {
                debug!(model_id = %model.model_id, error = %err, "uptime probe failed");
                UptimeCheck::down(model.id, err.to_string())
            }
        }
    }

    async fn probe(
        &self,
        model: &Model,
        provider: &ProviderAccount,
        prompt_pack: &str,
    ) -> Result<UptimeCheck, ProbeError> {
        let pack =
            get_prompt_pack(prompt_pack).or_else(|_| get_prompt_pack(DEFAULT_PROMPT_PACK))?;

        let credentials: ProviderCredentials =
            self.vault.decrypt(&provider.credentials_encrypted)?;
        let target = CompletionTarget::new(
            provider.provider_kind,
            model.model_id.clone(),
            credentials,
        );

        let _guard = self
            .throttle
            .acquire(provider.provider_kind.as_str(), &model.id.to_string())
            .await?;

        let request = CompletionRequest {
            max_tokens: Some(UPTIME_MAX_TOKENS),
            timeout: UPTIME_TIMEOUT,
            ..CompletionRequest::user_prompt(pack.prompt)
        };

        let mut collector = MetricsCollector::new();
        collector.start();

        let mut stream = self.invoker.complete_stream(&target, &request).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(content) = extract_chunk_content(&chunk) {
                collector.record_token(content);
            }
        }

        let metrics = collector.finalize(None, None, None);
        Ok(UptimeCheck::up(
            model.id,
            metrics.total_latency_ms,
            metrics.ttft_ms,
            metrics.tps,
            metrics.output_tokens,
        ))
    }
}
