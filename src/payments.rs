use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::models::listing::Currency;
use crate::utils::errorhandler::AppError;

/// Payment collaborator. Intents are fabricated in-process; the service
/// never moves money itself, it only tracks the gateway references.
#[derive(Clone)]
pub struct PaymentClient {
    provider: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount_minor: i64,
    pub currency: Currency,
}

impl PaymentClient {
    pub fn new() -> Self {
        PaymentClient { provider: "local" }
    }

    pub async fn create_intent(
        &self,
        amount_minor: i64,
        currency: Currency,
        _payment_method_id: Option<&str>,
    ) -> Result<PaymentIntent, AppError> {
        if amount_minor <= 0 {
            return Err(AppError::external(
                "payment gateway rejected a non-positive amount",
            ));
        }

        let id = format!("pi_{}", Uuid::new_v4().simple());
        debug!(
            "{} gateway intent {} for {} minor units",
            self.provider, id, amount_minor
        );
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();

        Ok(PaymentIntent {
            client_secret: format!("{id}_secret_{nonce}"),
            id,
            amount_minor,
            currency,
        })
    }
}

impl Default for PaymentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn intents_carry_unique_references() {
        let client = PaymentClient::new();
        let a = client
            .create_intent(11_700_00, Currency::USD, None)
            .await
            .unwrap();
        let b = client
            .create_intent(11_700_00, Currency::USD, None)
            .await
            .unwrap();
        assert!(a.id.starts_with("pi_"));
        assert!(a.client_secret.contains("_secret_"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.amount_minor, 1_170_000);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let client = PaymentClient::new();
        assert!(client.create_intent(0, Currency::EUR, None).await.is_err());
    }
}
