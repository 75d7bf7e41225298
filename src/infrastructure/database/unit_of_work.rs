//! Transaction scoping for multi-statement writes.
//!
//! Deletes that span several tables (a page of expired messages with their
//! uploads and files, a whole room) must commit or roll back together.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::shared::error::AppError;

/// Transaction context that wraps a SQLx transaction.
pub struct TransactionContext {
    tx: Transaction<'static, Postgres>,
}

impl TransactionContext {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    /// Connection to run queries on inside the transaction.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await.map_err(AppError::Database)
    }
}

/// Execute a closure within a transaction.
///
/// The closure takes ownership of the context and hands it back with its
/// result; the transaction commits on `Ok` and rolls back on `Err`.
///
/// # Example
/// ```ignore
/// let keys = with_transaction(&pool, |mut ctx| async move {
///     let keys = delete_uploads(ctx.conn(), &ids).await?;
///     Ok((keys, ctx))
/// }).await?;
/// ```
pub async fn with_transaction<F, Fut, T>(pool: &PgPool, f: F) -> Result<T, AppError>
where
    F: FnOnce(TransactionContext) -> Fut,
    Fut: std::future::Future<Output = Result<(T, TransactionContext), AppError>>,
{
    let tx = pool.begin().await.map_err(AppError::Database)?;
    let ctx = TransactionContext::new(tx);

    match f(ctx).await {
        Ok((result, ctx)) => {
            ctx.commit().await?;
            Ok(result)
        }
        // Dropping the context rolls the transaction back
        Err(e) => Err(e),
    }
}
