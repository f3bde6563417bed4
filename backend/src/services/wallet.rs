//! Wallet service: balances and the append-only transaction ledger
//!
//! Every balance change locks the wallet row, applies the pure ledger rule
//! from `shared`, then updates the balance and appends the transaction in the
//! same database transaction.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    LedgerEntry, Wallet, WalletStatistics, WalletTransaction, WalletTransactionStatus,
    WalletTransactionType,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;

const WALLET_COLUMNS: &str = "id, user_id, balance, is_active, created_at, updated_at";
const TRANSACTION_COLUMNS: &str = "id, wallet_id, transaction_type, amount, balance_after, \
                                   status, description, reference_id, created_at";

#[derive(Clone)]
pub struct WalletService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DepositInput {
    pub user_id: Uuid,
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawInput {
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    #[serde(rename = "type")]
    pub transaction_type: Option<WalletTransactionType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub wallet_id: Uuid,
    pub balance: Decimal,
    pub is_active: bool,
}

/// Result of a balance movement
#[derive(Debug, Clone, Serialize)]
pub struct WalletMovement {
    pub wallet: Wallet,
    pub transaction: WalletTransaction,
}

/// Lock the user's wallet, creating it on first use
pub(crate) async fn lock_wallet(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Wallet> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let wallet = sqlx::query_as::<_, Wallet>(&format!(
        "SELECT {} FROM wallets WHERE user_id = $1 FOR UPDATE",
        WALLET_COLUMNS
    ))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(wallet)
}

async fn post_entry(
    conn: &mut PgConnection,
    wallet: &Wallet,
    entry: LedgerEntry,
    description: &str,
    reference_id: Option<&str>,
) -> AppResult<WalletMovement> {
    let wallet = sqlx::query_as::<_, Wallet>(&format!(
        "UPDATE wallets SET balance = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        WALLET_COLUMNS
    ))
    .bind(wallet.id)
    .bind(entry.balance_after)
    .fetch_one(&mut *conn)
    .await?;

    let transaction = sqlx::query_as::<_, WalletTransaction>(&format!(
        r#"
        INSERT INTO wallet_transactions
            (wallet_id, transaction_type, amount, balance_after, status, description, reference_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(wallet.id)
    .bind(entry.transaction_type)
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(WalletTransactionStatus::Completed)
    .bind(description)
    .bind(reference_id)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        "Wallet {} {} {} -> balance {}",
        wallet.id,
        entry.transaction_type.as_str(),
        entry.amount,
        entry.balance_after
    );
    Ok(WalletMovement {
        wallet,
        transaction,
    })
}

/// Credit a user's wallet inside the caller's transaction
pub(crate) async fn credit_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
    transaction_type: WalletTransactionType,
    description: &str,
    reference_id: Option<&str>,
) -> AppResult<WalletMovement> {
    let wallet = lock_wallet(conn, user_id).await?;
    let entry = wallet.add_funds(amount, transaction_type)?;
    post_entry(conn, &wallet, entry, description, reference_id).await
}

/// Debit a user's wallet inside the caller's transaction
pub(crate) async fn debit_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
    transaction_type: WalletTransactionType,
    description: &str,
    reference_id: Option<&str>,
) -> AppResult<WalletMovement> {
    let wallet = lock_wallet(conn, user_id).await?;
    let entry = wallet.deduct_funds(amount, transaction_type)?;
    post_entry(conn, &wallet, entry, description, reference_id).await
}

impl WalletService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_or_create(&self, user_id: Uuid) -> AppResult<Wallet> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = $1",
            WALLET_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(wallet)
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<WalletBalance> {
        let wallet = self.get_or_create(user_id).await?;
        Ok(WalletBalance {
            wallet_id: wallet.id,
            balance: wallet.balance,
            is_active: wallet.is_active,
        })
    }

    pub async fn get(&self, wallet_id: Uuid) -> AppResult<Wallet> {
        sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE id = $1",
            WALLET_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Wallet".to_string()))
    }

    /// Managers and admins see every wallet, everyone else only their own
    pub async fn list(&self, caller: &AuthUser) -> AppResult<Vec<Wallet>> {
        if caller.access().is_manager_or_admin() {
            let wallets = sqlx::query_as::<_, Wallet>(&format!(
                "SELECT {} FROM wallets ORDER BY created_at DESC",
                WALLET_COLUMNS
            ))
            .fetch_all(&self.db)
            .await?;
            Ok(wallets)
        } else {
            Ok(vec![self.get_or_create(caller.user_id).await?])
        }
    }

    pub async fn deposit(&self, input: DepositInput) -> AppResult<WalletMovement> {
        input.validate()?;

        let user_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(input.user_id)
                .fetch_one(&self.db)
                .await?;
        if !user_exists {
            return Err(AppError::NotFound("User".to_string()));
        }

        let description = input
            .description
            .unwrap_or_else(|| "Depósito de fondos".to_string());

        let mut tx = self.db.begin().await?;
        let movement = credit_in_tx(
            &mut tx,
            input.user_id,
            input.amount,
            WalletTransactionType::Deposit,
            &description,
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(movement)
    }

    pub async fn withdraw(&self, user_id: Uuid, input: WithdrawInput) -> AppResult<WalletMovement> {
        input.validate()?;
        let description = input
            .description
            .unwrap_or_else(|| "Retiro de fondos".to_string());

        let mut tx = self.db.begin().await?;
        let movement = debit_in_tx(
            &mut tx,
            user_id,
            input.amount,
            WalletTransactionType::Withdrawal,
            &description,
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(movement)
    }

    pub async fn transactions(
        &self,
        wallet_id: Uuid,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<WalletTransaction>> {
        let transactions = sqlx::query_as::<_, WalletTransaction>(&format!(
            "SELECT {} FROM wallet_transactions \
             WHERE wallet_id = $1 AND ($2::wallet_transaction_type IS NULL OR transaction_type = $2) \
             ORDER BY created_at DESC",
            TRANSACTION_COLUMNS
        ))
        .bind(wallet_id)
        .bind(filter.transaction_type)
        .fetch_all(&self.db)
        .await?;
        Ok(transactions)
    }

    pub async fn statistics(&self, user_id: Uuid) -> AppResult<WalletStatistics> {
        let wallet = self.get_or_create(user_id).await?;
        let transactions = self
            .transactions(wallet.id, &TransactionFilter::default())
            .await?;
        Ok(WalletStatistics::compute(wallet.balance, &transactions))
    }
}
