//! Account ledger owned by one participant.
//!
//! This service handles:
//! - Account registration with a fixed opening balance
//! - Sufficient-funds checks (strict: balance must exceed the amount)
//! - Debits that re-check funds under the same lock acquisition
//! - Unconditional deposits
//!
//! # Locking
//!
//! One lock guards the whole account map. Every operation holds it from
//! lookup to mutation, so operations on one account are totally ordered.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::account::{Account, OPENING_BALANCE_CENTS},
};

pub struct Ledger {
    accounts: Mutex<HashMap<String, i64>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Create an account with the opening balance.
    ///
    /// Re-registering an existing account is a successful no-op.
    /// Returns `true` when the account was created.
    pub async fn register_account(&self, account_number: &str) -> Result<bool, AppError> {
        if account_number.is_empty() {
            return Err(AppError::InvalidRequest(
                "account_number is required".to_string(),
            ));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(account_number) {
            tracing::debug!(account_number, "Account already registered");
            return Ok(false);
        }

        accounts.insert(account_number.to_string(), OPENING_BALANCE_CENTS);
        tracing::info!(
            account_number,
            balance_cents = OPENING_BALANCE_CENTS,
            "Account created"
        );
        Ok(true)
    }

    /// Report whether the balance strictly exceeds `amount_cents`.
    ///
    /// An amount equal to the balance is not approved.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: unknown account
    pub async fn check_sufficient_funds(
        &self,
        account_number: &str,
        amount_cents: i64,
    ) -> Result<(bool, i64), AppError> {
        let accounts = self.accounts.lock().await;
        check(&accounts, account_number, amount_cents)
    }

    /// Subtract `amount_cents` if the strict funds check passes.
    ///
    /// The check runs under the same lock acquisition as the subtraction;
    /// an earlier prepare answer is not trusted.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: unknown account
    /// - `InsufficientFunds`: balance does not exceed the amount
    pub async fn debit(&self, account_number: &str, amount_cents: i64) -> Result<i64, AppError> {
        let mut accounts = self.accounts.lock().await;
        let (approved, _) = check(&accounts, account_number, amount_cents)?;
        if !approved {
            tracing::warn!(account_number, amount_cents, "Debit rejected: insufficient funds");
            return Err(AppError::InsufficientFunds);
        }

        let balance = accounts
            .get_mut(account_number)
            .ok_or(AppError::AccountNotFound)?;
        *balance -= amount_cents;
        tracing::info!(account_number, amount_cents, balance_cents = *balance, "Debited");
        Ok(*balance)
    }

    /// Add `amount_cents` and return the new balance.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: unknown account
    /// - `InvalidRequest`: the new balance would overflow
    pub async fn deposit(&self, account_number: &str, amount_cents: i64) -> Result<i64, AppError> {
        let mut accounts = self.accounts.lock().await;
        let balance = accounts
            .get_mut(account_number)
            .ok_or(AppError::AccountNotFound)?;

        *balance = balance
            .checked_add(amount_cents)
            .ok_or_else(|| AppError::InvalidRequest("Deposit would overflow the balance".to_string()))?;
        tracing::info!(account_number, amount_cents, balance_cents = *balance, "Deposited");
        Ok(*balance)
    }

    /// Record that the coordinator aborted a transaction.
    ///
    /// No funds are held between prepare and commit, so there is nothing to release.
    pub fn acknowledge_abort(&self, transaction_id: &str) {
        tracing::info!(transaction_id, "Transaction aborted, nothing to roll back");
    }

    pub async fn account(&self, account_number: &str) -> Result<Account, AppError> {
        let accounts = self.accounts.lock().await;
        let balance_cents = *accounts
            .get(account_number)
            .ok_or(AppError::AccountNotFound)?;

        Ok(Account {
            account_number: account_number.to_string(),
            balance_cents,
        })
    }
}

fn check(
    accounts: &HashMap<String, i64>,
    account_number: &str,
    amount_cents: i64,
) -> Result<(bool, i64), AppError> {
    let balance = *accounts
        .get(account_number)
        .ok_or(AppError::AccountNotFound)?;
    Ok((balance > amount_cents, balance))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger_with(account: &str) -> Ledger {
        let ledger = Ledger::new();
        ledger.register_account(account).await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_registration_opens_with_fixed_balance() {
        let ledger = ledger_with("acc-1").await;
        assert_eq!(
            ledger.account("acc-1").await.unwrap().balance_cents,
            OPENING_BALANCE_CENTS
        );
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let ledger = ledger_with("acc-1").await;
        ledger.debit("acc-1", 2_500).await.unwrap();

        assert!(!ledger.register_account("acc-1").await.unwrap());
        // balance untouched by re-registration
        assert_eq!(ledger.account("acc-1").await.unwrap().balance_cents, 7_500);
    }

    #[tokio::test]
    async fn test_check_is_strict() {
        let ledger = ledger_with("acc-1").await;

        let (approved, balance) = ledger
            .check_sufficient_funds("acc-1", OPENING_BALANCE_CENTS)
            .await
            .unwrap();
        assert!(!approved);
        assert_eq!(balance, OPENING_BALANCE_CENTS);

        let (approved, _) = ledger
            .check_sufficient_funds("acc-1", OPENING_BALANCE_CENTS - 1)
            .await
            .unwrap();
        assert!(approved);
    }

    #[tokio::test]
    async fn test_exact_balance_debit_is_rejected() {
        let ledger = ledger_with("acc-1").await;

        assert!(matches!(
            ledger.debit("acc-1", OPENING_BALANCE_CENTS).await,
            Err(AppError::InsufficientFunds)
        ));
        assert_eq!(
            ledger.account("acc-1").await.unwrap().balance_cents,
            OPENING_BALANCE_CENTS
        );
    }

    #[tokio::test]
    async fn test_debit_just_below_balance_leaves_remainder() {
        let ledger = ledger_with("acc-1").await;

        let remaining = ledger
            .debit("acc-1", OPENING_BALANCE_CENTS - 1)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_unknown_account_errors() {
        let ledger = Ledger::new();

        assert!(matches!(
            ledger.check_sufficient_funds("ghost", 1).await,
            Err(AppError::AccountNotFound)
        ));
        assert!(matches!(
            ledger.debit("ghost", 1).await,
            Err(AppError::AccountNotFound)
        ));
        assert!(matches!(
            ledger.deposit("ghost", 1).await,
            Err(AppError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_deposit_adds_unconditionally() {
        let ledger = ledger_with("acc-1").await;
        assert_eq!(ledger.deposit("acc-1", 250).await.unwrap(), 10_250);
    }

    #[tokio::test]
    async fn test_overflowing_deposit_is_refused() {
        let ledger = ledger_with("acc-1").await;

        assert!(matches!(
            ledger.deposit("acc-1", i64::MAX).await,
            Err(AppError::InvalidRequest(_))
        ));
        // balance untouched
        assert_eq!(ledger.account("acc-1").await.unwrap().balance_cents, 10_000);
    }

    #[tokio::test]
    async fn test_concurrent_debits_never_overdraw() {
        let ledger = std::sync::Arc::new(ledger_with("acc-1").await);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.debit("acc-1", 1_000).await }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        // 10_000 > n * 1_000 must hold before each debit, so at most 9 pass
        assert_eq!(succeeded, 9);
        assert_eq!(ledger.account("acc-1").await.unwrap().balance_cents, 1_000);
    }
}
