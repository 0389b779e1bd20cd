//! HandleWebhookHandler - verification and reconciliation of
//! incoming provider webhooks.

use tracing::{info, warn};

use crate::domain::entitlement::{ReconcileOutcome, WebhookError, WebhookReconciler, WebhookVerifier};

/// Handler for the webhook endpoint.
///
/// Verifies the signature over the raw body before anything acts on
/// the content, then hands the parsed event to the reconciler.
pub struct HandleWebhookHandler {
    verifier: WebhookVerifier,
    reconciler: WebhookReconciler,
}

impl HandleWebhookHandler {
    pub fn new(verifier: WebhookVerifier, reconciler: WebhookReconciler) -> Self {
        Self {
            verifier,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let event = self
            .verifier
            .verify_and_parse(payload, signature_header)
            .map_err(|e| {
                warn!(error = %e, "webhook signature verification failed");
                e
            })?;

        let event_id = event.id.clone();
        let event_type = event.event_type.clone();
        let outcome = self.reconciler.process(event).await?;

        match &outcome {
            ReconcileOutcome::Applied => {
                info!(event_id = %event_id, event_type = %event_type, "webhook applied");
            }
            ReconcileOutcome::Ignored(reason) => {
                info!(event_id = %event_id, event_type = %event_type, reason = %reason, "webhook ignored");
            }
            ReconcileOutcome::AlreadyProcessed => {
                info!(event_id = %event_id, "webhook already processed");
            }
        }
        Ok(outcome)
    }
}
