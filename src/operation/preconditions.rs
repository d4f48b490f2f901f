//! Precondition Checker
//!
//! Verifies the source has enough balance plus fee headroom before any
//! state-changing call is made. Advisory only: the balance can move between
//! the check and the deposit, and the deposit call stays authoritative.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use crate::clients::{ClientError, LedgerClient};

use super::types::Asset;

/// Result of a balance precondition check
#[derive(Debug, Clone)]
pub struct BalanceCheck {
    pub sufficient: bool,
    pub observed: Decimal,
    /// Human-readable reason when insufficient
    pub reason: Option<String>,
}

/// Balance + fee headroom check against the ledger
pub struct PreconditionChecker {
    ledger: Arc<dyn LedgerClient>,
    /// Fixed headroom reserved for network fees
    fee_reserve: Decimal,
}

impl PreconditionChecker {
    pub fn new(ledger: Arc<dyn LedgerClient>, fee_reserve: Decimal) -> Self {
        Self {
            ledger,
            fee_reserve,
        }
    }

    /// Check that `source` can cover `amount` plus the fee reserve.
    /// No side effects.
    pub async fn check(
        &self,
        source: &str,
        amount: Decimal,
        asset: Asset,
    ) -> Result<BalanceCheck, ClientError> {
        let observed = self.ledger.get_balance(source, asset).await?;
        let required = amount + self.fee_reserve;

        debug!(
            source,
            %asset,
            %observed,
            %required,
            "Balance precondition checked"
        );

        if observed >= required {
            Ok(BalanceCheck {
                sufficient: true,
                observed,
                reason: None,
            })
        } else {
            Ok(BalanceCheck {
                sufficient: false,
                observed,
                reason: Some(format!(
                    "balance {} {} below required {} (amount {} + fee reserve {})",
                    observed, asset, required, amount, self.fee_reserve
                )),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::mock::MockLedger;

    #[tokio::test]
    async fn test_sufficient_balance() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance("src", Asset::Usdc, Decimal::from(100));

        let checker = PreconditionChecker::new(ledger, Decimal::new(1, 1)); // 0.1
        let check = checker
            .check("src", Decimal::from(10), Asset::Usdc)
            .await
            .unwrap();

        assert!(check.sufficient);
        assert_eq!(check.observed, Decimal::from(100));
        assert!(check.reason.is_none());
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance("src", Asset::Usdc, Decimal::from(5));

        let checker = PreconditionChecker::new(ledger, Decimal::ZERO);
        let check = checker
            .check("src", Decimal::from(10), Asset::Usdc)
            .await
            .unwrap();

        assert!(!check.sufficient);
        assert_eq!(check.observed, Decimal::from(5));
        assert!(check.reason.unwrap().contains("below required"));
    }

    #[tokio::test]
    async fn test_fee_reserve_counts() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance("src", Asset::Sol, Decimal::from(10));

        // Exactly the amount, but no fee headroom left
        let checker = PreconditionChecker::new(ledger, Decimal::new(5, 2)); // 0.05
        let check = checker
            .check("src", Decimal::from(10), Asset::Sol)
            .await
            .unwrap();

        assert!(!check.sufficient);
    }

    #[tokio::test]
    async fn test_unknown_address_reads_zero() {
        let ledger = Arc::new(MockLedger::new());
        let checker = PreconditionChecker::new(ledger, Decimal::ZERO);

        let check = checker
            .check("nobody", Decimal::from(1), Asset::Usdt)
            .await
            .unwrap();
        assert!(!check.sufficient);
        assert_eq!(check.observed, Decimal::ZERO);
    }
}
