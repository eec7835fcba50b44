//! # Payment Verification
//!
//! [`ManualPaymentVerifier`] is for back-office entry of payments that staff
//! have already matched against a bank statement or cash register. Online
//! payments go through a gateway-backed [`PaymentVerifier`] instead.
//!
//! Nothing wires a verifier by default. `Collaborators::sqlite` and
//! `Collaborators::in_memory` take one, so a desk that accepts card or UPI
//! payments must be built with a gateway verifier.

use async_trait::async_trait;
use tracing::debug;
use tripdesk_core::ports::PaymentVerifier;
use tripdesk_core::{CoreResult, Money};

#[derive(Debug, Clone, Default)]
pub struct ManualPaymentVerifier;

#[async_trait]
impl PaymentVerifier for ManualPaymentVerifier {
    async fn verify(&self, payment_id: &str, expected_amount: Money, currency: &str) -> CoreResult<bool> {
        debug!(
            payment_id = %payment_id,
            amount = %expected_amount,
            currency = %currency,
            "Manually entered payment accepted"
        );
        Ok(expected_amount.is_positive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_only_positive_amounts_pass() {
        let verifier = ManualPaymentVerifier;
        assert!(verifier
            .verify("p-1", Money::from_major(300), "USD")
            .await
            .unwrap());
        assert!(!verifier.verify("p-2", Money::zero(), "USD").await.unwrap());
    }
}
