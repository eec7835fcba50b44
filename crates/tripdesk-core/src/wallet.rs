//! # Agent Wallet
//!
//! Prepaid balance plus a credit limit. The balance may go negative down to
//! `-credit_limit`; anything beyond that fails with `InsufficientFunds`.
//!
//! ```text
//! balance 100, credit_limit 50  ──► available 150
//! debit 120 ──► balance -20, available 30
//! debit 40  ──► InsufficientFunds { requested: 40, available: 30 }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::validation::{validate_currency_code, validate_non_negative, validate_payment_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionKind {
    Credit,
    Debit,
}

/// Append-only wallet movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WalletTransaction {
    pub id: String,
    pub kind: WalletTransactionKind,
    pub amount: Money,
    /// Booking payment id or top-up reference.
    pub reference: String,
    pub balance_after: Money,
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AgentWallet {
    pub agent_id: String,
    pub currency: String,
    pub balance: Money,
    pub credit_limit: Money,
    pub transactions: Vec<WalletTransaction>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub record_version: u64,
}

impl AgentWallet {
    /// A new, empty wallet.
    pub fn open(
        agent_id: impl Into<String>,
        currency: impl Into<String>,
        credit_limit: Money,
        at: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let currency = currency.into();
        validate_currency_code(&currency)?;
        validate_non_negative("credit_limit", credit_limit)?;
        Ok(AgentWallet {
            agent_id: agent_id.into(),
            currency,
            balance: Money::zero(),
            credit_limit,
            transactions: Vec::new(),
            updated_at: at,
            record_version: 0,
        })
    }

    /// Balance plus credit limit.
    #[inline]
    pub fn available(&self) -> Money {
        self.balance + self.credit_limit
    }

    /// Tops up the wallet.
    pub fn credit(
        &mut self,
        amount: Money,
        reference: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<WalletTransaction> {
        validate_payment_amount(amount)?;
        self.balance += amount;
        Ok(self.push(WalletTransactionKind::Credit, amount, reference, at))
    }

    /// Deducts `amount`, failing if it exceeds balance plus credit limit.
    pub fn debit(
        &mut self,
        amount: Money,
        reference: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<WalletTransaction> {
        validate_payment_amount(amount)?;
        let available = self.available();
        if amount > available {
            return Err(CoreError::InsufficientFunds {
                agent_id: self.agent_id.clone(),
                requested: amount,
                available,
            });
        }
        self.balance -= amount;
        Ok(self.push(WalletTransactionKind::Debit, amount, reference, at))
    }

    fn push(
        &mut self,
        kind: WalletTransactionKind,
        amount: Money,
        reference: &str,
        at: DateTime<Utc>,
    ) -> WalletTransaction {
        let tx = WalletTransaction {
            id: Uuid::new_v4().to_string(),
            kind,
            amount,
            reference: reference.to_string(),
            balance_after: self.balance,
            at,
        };
        self.transactions.push(tx.clone());
        self.updated_at = at;
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> AgentWallet {
        let mut w = AgentWallet::open("agent-1", "USD", Money::from_major(50), Utc::now()).unwrap();
        w.credit(Money::from_major(100), "topup-1", Utc::now()).unwrap();
        w
    }

    #[test]
    fn test_debit_into_credit_limit() {
        let mut w = wallet();
        let tx = w.debit(Money::from_major(120), "pay-1", Utc::now()).unwrap();
        assert_eq!(tx.balance_after, Money::from_major(-20));
        assert_eq!(w.available(), Money::from_major(30));
    }

    #[test]
    fn test_insufficient_funds_leaves_wallet_untouched() {
        let mut w = wallet();
        w.debit(Money::from_major(120), "pay-1", Utc::now()).unwrap();

        let err = w.debit(Money::from_major(40), "pay-2", Utc::now()).unwrap_err();
        match err {
            CoreError::InsufficientFunds {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, Money::from_major(40));
                assert_eq!(available, Money::from_major(30));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(w.balance, Money::from_major(-20));
        assert_eq!(w.transactions.len(), 2);
    }

    #[test]
    fn test_exact_limit_is_allowed() {
        let mut w = wallet();
        w.debit(Money::from_major(150), "pay-1", Utc::now()).unwrap();
        assert!(w.available().is_zero());
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let mut w = wallet();
        assert!(w.credit(Money::zero(), "x", Utc::now()).is_err());
        assert!(w.debit(Money::from_major(-1), "x", Utc::now()).is_err());
    }
}
