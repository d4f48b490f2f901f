//! External Collaborator Clients
//!
//! Traits for the three remote services the saga depends on: the ledger,
//! the shielded pool, and the signer. All calls cross a network boundary,
//! may be slow, may fail, and may lie about completion; the saga treats
//! every response as eventually consistent.
//!
//! All trait methods return typed [`ClientError`]s so recoverability is a
//! property of the error, not a message substring.

pub mod error;
pub mod ledger;
pub mod pool;
pub mod signer;

pub use error::ClientError;
pub use ledger::HttpLedgerClient;
pub use pool::HttpPoolClient;
pub use signer::HttpSignerClient;

use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::operation::Asset;

/// Ledger transaction reference (opaque, e.g. a signature or tx id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(pub String);

impl TxRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque serialized transaction awaiting a signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTx {
    /// Base64 payload as produced by the pool service
    pub payload: String,
}

/// Opaque signed transaction ready for ledger submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTx {
    pub payload: String,
}

/// Result of the pool's deposit preparation
#[derive(Debug, Clone, Deserialize)]
pub struct PreparedDeposit {
    /// Transaction to sign with the source key and submit to the ledger
    pub unsigned_tx: UnsignedTx,
    /// Pool account the deposit lands in
    pub pool_address: String,
}

/// Pool-side balances for an owner
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PoolBalance {
    /// Settled and withdrawable
    pub available: Decimal,
    /// Total deposited (settled or not)
    pub deposited: Decimal,
}

/// Ledger service: balances, submission, confirmation
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current on-ledger balance for an address
    async fn get_balance(&self, address: &str, asset: Asset) -> Result<Decimal, ClientError>;

    /// Submit a signed transaction, returning its reference
    async fn submit(&self, tx: &SignedTx) -> Result<TxRef, ClientError>;

    /// Block until the transaction is confirmed or the confirmation
    /// timeout elapses (no spin loop on the caller's side)
    async fn confirm(&self, tx_ref: &TxRef) -> Result<(), ClientError>;
}

/// Shielded pool service: deposit preparation, settlement queries,
/// proof-carrying withdrawals
#[async_trait]
pub trait PoolClient: Send + Sync {
    /// Prepare a deposit from `owner` into the pool
    async fn prepare_deposit(
        &self,
        owner: &str,
        amount: Decimal,
        asset: Asset,
    ) -> Result<PreparedDeposit, ClientError>;

    /// Pool-side balances for `owner`
    async fn get_balance(&self, owner: &str, asset: Asset) -> Result<PoolBalance, ClientError>;

    /// Withdraw `amount` from the pool to `recipient`. The pool constructs
    /// and attaches whatever proof it requires; the call is opaque to us
    /// and may take a while.
    async fn withdraw(
        &self,
        owner: &str,
        amount: Decimal,
        asset: Asset,
        recipient: &str,
    ) -> Result<TxRef, ClientError>;
}

/// Signing capability lookup and remote signing
///
/// Key material never enters this process; the provider fronts an external
/// signer service.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Whether a signing key for this address is obtainable
    async fn can_sign(&self, address: &str) -> bool;

    /// Sign a prepared transaction with the key for `address`
    async fn sign(&self, address: &str, tx: &UnsignedTx) -> Result<SignedTx, ClientError>;
}

/// Mock clients for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted ledger client
    pub struct MockLedger {
        balances: Mutex<HashMap<(String, Asset), Decimal>>,
        submit_count: AtomicUsize,
        fail_submit: Mutex<Option<ClientError>>,
        fail_confirm: Mutex<Option<ClientError>>,
    }

    impl MockLedger {
        pub fn new() -> Self {
            Self {
                balances: Mutex::new(HashMap::new()),
                submit_count: AtomicUsize::new(0),
                fail_submit: Mutex::new(None),
                fail_confirm: Mutex::new(None),
            }
        }

        pub fn set_balance(&self, address: &str, asset: Asset, amount: Decimal) {
            self.balances
                .lock()
                .unwrap()
                .insert((address.to_string(), asset), amount);
        }

        pub fn set_fail_submit(&self, err: Option<ClientError>) {
            *self.fail_submit.lock().unwrap() = err;
        }

        pub fn set_fail_confirm(&self, err: Option<ClientError>) {
            *self.fail_confirm.lock().unwrap() = err;
        }

        pub fn submit_count(&self) -> usize {
            self.submit_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedger {
        async fn get_balance(&self, address: &str, asset: Asset) -> Result<Decimal, ClientError> {
            Ok(self
                .balances
                .lock()
                .unwrap()
                .get(&(address.to_string(), asset))
                .copied()
                .unwrap_or(Decimal::ZERO))
        }

        async fn submit(&self, _tx: &SignedTx) -> Result<TxRef, ClientError> {
            if let Some(err) = self.fail_submit.lock().unwrap().clone() {
                return Err(err);
            }
            let n = self.submit_count.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TxRef(format!("ledger-tx-{}", n)))
        }

        async fn confirm(&self, _tx_ref: &TxRef) -> Result<(), ClientError> {
            match self.fail_confirm.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    /// Scripted pool client
    ///
    /// `settle_after` delays settlement visibility by a number of
    /// `get_balance` polls, mimicking the pool's internal ledger lag.
    pub struct MockPool {
        pool_address: String,
        available: Mutex<HashMap<(String, Asset), Decimal>>,
        settle_after: Mutex<u32>,
        poll_count: AtomicUsize,
        withdraw_count: AtomicUsize,
        /// Fail the next N withdraw calls with this error
        fail_withdraws: Mutex<Option<(u32, ClientError)>>,
        fail_prepare: Mutex<Option<ClientError>>,
    }

    impl MockPool {
        pub fn new() -> Self {
            Self {
                pool_address: "mock-pool-address".to_string(),
                available: Mutex::new(HashMap::new()),
                settle_after: Mutex::new(0),
                poll_count: AtomicUsize::new(0),
                withdraw_count: AtomicUsize::new(0),
                fail_withdraws: Mutex::new(None),
                fail_prepare: Mutex::new(None),
            }
        }

        /// Credit an owner's settled pool balance
        pub fn set_available(&self, owner: &str, asset: Asset, amount: Decimal) {
            self.available
                .lock()
                .unwrap()
                .insert((owner.to_string(), asset), amount);
        }

        /// Hide settled balances for the first `polls` balance queries
        pub fn set_settle_after(&self, polls: u32) {
            *self.settle_after.lock().unwrap() = polls;
        }

        /// Fail the next `times` withdrawals with `err`
        pub fn set_fail_withdraws(&self, times: u32, err: ClientError) {
            *self.fail_withdraws.lock().unwrap() = Some((times, err));
        }

        pub fn set_fail_prepare(&self, err: Option<ClientError>) {
            *self.fail_prepare.lock().unwrap() = err;
        }

        pub fn poll_count(&self) -> usize {
            self.poll_count.load(Ordering::SeqCst)
        }

        pub fn withdraw_count(&self) -> usize {
            self.withdraw_count.load(Ordering::SeqCst)
        }

        pub fn available_of(&self, owner: &str, asset: Asset) -> Decimal {
            self.available
                .lock()
                .unwrap()
                .get(&(owner.to_string(), asset))
                .copied()
                .unwrap_or(Decimal::ZERO)
        }
    }

    #[async_trait]
    impl PoolClient for MockPool {
        async fn prepare_deposit(
            &self,
            _owner: &str,
            _amount: Decimal,
            _asset: Asset,
        ) -> Result<PreparedDeposit, ClientError> {
            if let Some(err) = self.fail_prepare.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(PreparedDeposit {
                unsigned_tx: UnsignedTx {
                    payload: "unsigned-deposit".to_string(),
                },
                pool_address: self.pool_address.clone(),
            })
        }

        async fn get_balance(&self, owner: &str, asset: Asset) -> Result<PoolBalance, ClientError> {
            let polls = self.poll_count.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            let settled = polls > *self.settle_after.lock().unwrap();

            let amount = self.available_of(owner, asset);
            Ok(PoolBalance {
                available: if settled { amount } else { Decimal::ZERO },
                deposited: amount,
            })
        }

        async fn withdraw(
            &self,
            owner: &str,
            amount: Decimal,
            asset: Asset,
            _recipient: &str,
        ) -> Result<TxRef, ClientError> {
            let n = self.withdraw_count.fetch_add(1, Ordering::SeqCst) + 1;

            let mut fail = self.fail_withdraws.lock().unwrap();
            if let Some((remaining, err)) = fail.as_mut() {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(err.clone());
                }
            }
            drop(fail);

            let mut balances = self.available.lock().unwrap();
            let key = (owner.to_string(), asset);
            let held = balances.get(&key).copied().unwrap_or(Decimal::ZERO);
            if held < amount {
                return Err(ClientError::InsufficientBalance(format!(
                    "pool holds {} {}, requested {}",
                    held, asset, amount
                )));
            }
            balances.insert(key, held - amount);

            Ok(TxRef(format!("pool-withdraw-{}", n)))
        }
    }

    /// Key provider over a fixed address set
    pub struct MockKeys {
        signable: HashSet<String>,
    }

    impl MockKeys {
        pub fn with_addresses(addresses: &[&str]) -> Self {
            Self {
                signable: addresses.iter().map(|a| a.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl KeyProvider for MockKeys {
        async fn can_sign(&self, address: &str) -> bool {
            self.signable.contains(address)
        }

        async fn sign(&self, address: &str, tx: &UnsignedTx) -> Result<SignedTx, ClientError> {
            if !self.signable.contains(address) {
                return Err(ClientError::Rejected(format!("no key for {}", address)));
            }
            Ok(SignedTx {
                payload: format!("signed:{}:{}", address, tx.payload),
            })
        }
    }
}
