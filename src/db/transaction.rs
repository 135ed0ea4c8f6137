/*!
 * Transaction coordinator
 *
 * Every composite write runs through [`run_in_transaction`]: one pooled
 * connection, one begin/commit-or-rollback scope, bounded by an optional
 * timeout and an optional cancellation token.
 */

use crate::errors::ServiceError;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Limits applied to a single transaction scope
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Abort and roll back once the work has run this long
    pub timeout: Option<Duration>,
    /// Abort and roll back as soon as this token fires
    pub cancel: Option<CancellationToken>,
}

impl TransactionOptions {
    pub fn new(timeout: Option<Duration>, cancel: Option<CancellationToken>) -> Self {
        Self { timeout, cancel }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Execute `work` within a database transaction
///
/// - commits when `work` returns `Ok`
/// - rolls back and returns the original error when `work` fails
/// - rolls back with `ServiceError::Timeout` or `ServiceError::Cancelled`
///   when a limit in `options` trips first
///
/// All statements issued by `work` must go through the handle it is given.
/// If `work` panics the transaction is dropped uncommitted, which rolls it
/// back.
///
/// # Example
///
/// ```rust,ignore
/// let sale_id = run_in_transaction(&db, &options, |txn| {
///     Box::pin(async move {
///         let sale = sale::ActiveModel { .. }.insert(txn).await?;
///         sale_item::Entity::insert_many(items).exec(txn).await?;
///         Ok(sale.id)
///     })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<F, T>(
    db: &DatabaseConnection,
    options: &TransactionOptions,
    work: F,
) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>>,
{
    let transaction_id = Uuid::new_v4();
    let start = Instant::now();

    if let Some(token) = &options.cancel {
        if token.is_cancelled() {
            return Err(ServiceError::Cancelled(
                "transaction not started: shutting down".to_string(),
            ));
        }
    }

    let txn = db.begin().await.map_err(|e| {
        error!(transaction_id = %transaction_id, error = %e, "Failed to begin transaction");
        ServiceError::DatabaseError(e)
    })?;
    debug!(transaction_id = %transaction_id, "Starting database transaction");
    counter!("taller_db.transaction.started", 1);

    let outcome = bounded(work(&txn), options).await;

    let result = match outcome {
        Ok(value) => match txn.commit().await {
            Ok(()) => {
                counter!("taller_db.transaction.committed", 1);
                debug!(
                    transaction_id = %transaction_id,
                    "Transaction committed successfully in {:?}",
                    start.elapsed()
                );
                Ok(value)
            }
            Err(e) => {
                counter!("taller_db.transaction.rolled_back", 1);
                error!(transaction_id = %transaction_id, error = %e, "Transaction commit failed");
                Err(ServiceError::DatabaseError(e))
            }
        },
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!(
                    transaction_id = %transaction_id,
                    error = %rollback_err,
                    "Rollback failed; returning original error"
                );
            }
            counter!("taller_db.transaction.rolled_back", 1);
            warn!(
                transaction_id = %transaction_id,
                error = %err,
                "Transaction rolled back after {:?}",
                start.elapsed()
            );
            Err(err)
        }
    };

    histogram!("taller_db.transaction.duration", start.elapsed());
    result
}

async fn bounded<T>(
    work: BoxFuture<'_, Result<T, ServiceError>>,
    options: &TransactionOptions,
) -> Result<T, ServiceError> {
    let deadline = async {
        match options.timeout {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                limit
            }
            None => std::future::pending().await,
        }
    };
    let cancelled = async {
        match &options.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(ServiceError::Cancelled(
            "transaction aborted: shutting down".to_string(),
        )),
        limit = deadline => Err(ServiceError::Timeout(limit)),
        result = work => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::brand;
    use assert_matches::assert_matches;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

    async fn setup() -> DatabaseConnection {
        let db = establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .unwrap();
        run_migrations(&db).await.unwrap();
        db
    }

    fn new_brand(name: &str) -> brand::ActiveModel {
        brand::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn commits_on_success() {
        let db = setup().await;
        let id = run_in_transaction(&db, &TransactionOptions::default(), |txn| {
            Box::pin(async move {
                let row = new_brand("Samsung").insert(txn).await?;
                Ok(row.id)
            })
        })
        .await
        .unwrap();

        assert!(brand::Entity::find_by_id(id).one(&db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rolls_back_and_returns_original_error() {
        let db = setup().await;
        let result: Result<(), _> = run_in_transaction(&db, &TransactionOptions::default(), |txn| {
            Box::pin(async move {
                new_brand("Motorola").insert(txn).await?;
                Err(ServiceError::ValidationError("bad row".into()))
            })
        })
        .await;

        assert_matches!(result, Err(ServiceError::ValidationError(msg)) if msg == "bad row");
        assert_eq!(brand::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn timeout_rolls_back() {
        let db = setup().await;
        let options = TransactionOptions::default().with_timeout(Duration::from_millis(50));
        let result: Result<(), _> = run_in_transaction(&db, &options, |txn| {
            Box::pin(async move {
                new_brand("Xiaomi").insert(txn).await?;
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await;

        assert_matches!(result, Err(ServiceError::Timeout(_)));
        assert_eq!(brand::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cancellation_rolls_back() {
        let db = setup().await;
        let token = CancellationToken::new();
        let options = TransactionOptions::default().with_cancel(token.clone());

        let trigger = token.clone();
        let result: Result<(), _> = run_in_transaction(&db, &options, move |txn| {
            Box::pin(async move {
                new_brand("Huawei").insert(txn).await?;
                trigger.cancel();
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
        })
        .await;

        assert_matches!(result, Err(ServiceError::Cancelled(_)));
        assert_eq!(brand::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn already_cancelled_token_never_begins() {
        let db = setup().await;
        let token = CancellationToken::new();
        token.cancel();
        let options = TransactionOptions::new(None, Some(token));

        let result: Result<(), _> =
            run_in_transaction(&db, &options, |_txn| Box::pin(async move { Ok(()) })).await;
        assert_matches!(result, Err(ServiceError::Cancelled(_)));
    }

    #[tokio::test]
    async fn connection_is_released_after_rollback() {
        // single-connection pool: a leaked checkout would block the second call
        let db = setup().await;
        let _: Result<(), _> = run_in_transaction(&db, &TransactionOptions::default(), |_txn| {
            Box::pin(async move { Err(ServiceError::Conflict("first".into())) })
        })
        .await;

        let options = TransactionOptions::default().with_timeout(Duration::from_secs(2));
        let id = run_in_transaction(&db, &options, |txn| {
            Box::pin(async move { Ok(new_brand("Apple").insert(txn).await?.id) })
        })
        .await
        .unwrap();
        assert!(id > 0);
    }
}
