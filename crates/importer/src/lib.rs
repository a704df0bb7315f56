//! Pumps one ledger transaction feed into the warehouse.
//!
//! Each turn fetches the next page at the feed cursor, applies it one ledger
//! transaction per database transaction, and only then advances the cursor.
//! A crash between commit and cursor advance replays the page; replayed
//! transactions are recognized by their primary key and reported as
//! [`ApplyOutcome::AlreadyApplied`].

use std::{sync::Arc, time::Duration};

use ledger_types::{
    feed::{Feed, FeedUpdate, TransactionPage, TransactionQuery},
    transaction::Transaction,
};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbErr, SqlErr, Statement, TransactionTrait,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warehouse::{Catalog, Table, Warehouse, value::flag};

pub use error::{FeedError, ImportError};
pub use feed::{FeedApi, HttpFeedClient, ResultFeed, open_feed};
pub use retry::RetryPolicy;

mod error;
pub mod feed;
mod retry;
mod rows;

pub type ResultImport<T> = Result<T, ImportError>;

/// Default long-poll wait of a page fetch.
pub const DEFAULT_LONG_POLL: Duration = Duration::from_secs(60);

/// Result of applying one ledger transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The transaction row already existed: a previous run committed it but
    /// did not advance the cursor.
    AlreadyApplied,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub applied: usize,
    pub already_applied: usize,
}

/// What one fetch/apply/ack turn did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing new: the long poll expired or the page left the cursor as is.
    Idle,
    Advanced {
        applied: usize,
        already_applied: usize,
        after: String,
    },
}

pub struct Importer {
    api: Arc<dyn FeedApi>,
    warehouse: Arc<Warehouse>,
    feed: Feed,
    long_poll: Duration,
    retry: RetryPolicy,
}

impl Importer {
    pub fn new(api: Arc<dyn FeedApi>, warehouse: Arc<Warehouse>, feed: Feed) -> Self {
        Self {
            api,
            warehouse,
            feed,
            long_poll: DEFAULT_LONG_POLL,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_long_poll(mut self, long_poll: Duration) -> Self {
        self.long_poll = long_poll;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The feed as last acknowledged.
    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Run turns until `token` is cancelled.
    ///
    /// Failed turns are logged and retried after a capped exponential delay;
    /// an expired long poll is not a failure.
    pub async fn run(&mut self, token: CancellationToken) {
        let mut delays = self.retry.backoff();
        info!(feed = %self.feed.alias, after = %self.feed.after, "importer started");

        while !token.is_cancelled() {
            let fetched = tokio::select! {
                fetched = self.fetch() => fetched,
                _ = token.cancelled() => break,
            };
            let turn = match fetched {
                Ok(Some(page)) => self.commit_page(page).await,
                Ok(None) => Ok(TurnOutcome::Idle),
                Err(err) => Err(err),
            };

            match turn {
                Ok(_) => delays.reset(),
                Err(err) => {
                    let delay = delays.next_delay();
                    warn!(
                        feed = %self.feed.alias,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "import turn failed"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = token.cancelled() => break,
                    }
                }
            }
        }

        info!(feed = %self.feed.alias, after = %self.feed.after, "importer stopped");
    }

    /// One fetch, apply and acknowledge turn.
    pub async fn run_once(&mut self) -> ResultImport<TurnOutcome> {
        match self.fetch().await? {
            Some(page) => self.commit_page(page).await,
            None => Ok(TurnOutcome::Idle),
        }
    }

    /// Next page at the cursor, `None` when the long poll expired.
    async fn fetch(&self) -> ResultImport<Option<TransactionPage>> {
        let query = TransactionQuery {
            filter: self.feed.filter.clone(),
            after: self.feed.after.clone(),
            timeout: self.long_poll.as_millis() as u64,
            ascending_with_long_poll: true,
        };
        match self.api.list_transactions(&query).await {
            Ok(page) => Ok(Some(page)),
            Err(FeedError::Timeout) => {
                debug!(feed = %self.feed.alias, "long poll expired");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn commit_page(&mut self, page: TransactionPage) -> ResultImport<TurnOutcome> {
        let summary = self.process_batch(&page.items).await?;

        if page.items.is_empty() && page.next.after == self.feed.after {
            return Ok(TurnOutcome::Idle);
        }

        let update = FeedUpdate {
            id: self.feed.id.clone(),
            previous_after: self.feed.after.clone(),
            after: page.next.after.clone(),
        };
        match self.api.update_feed(&update).await {
            Ok(_) => {}
            Err(FeedError::Rejected(reason)) => {
                warn!(
                    feed = %self.feed.alias,
                    previous_after = %update.previous_after,
                    reason = %reason,
                    "cursor update rejected, resyncing feed"
                );
                self.feed = self.api.get_feed(&self.feed.alias).await?;
                return Err(FeedError::Rejected(reason).into());
            }
            Err(err) => return Err(err.into()),
        }
        self.feed.after = update.after;

        info!(
            feed = %self.feed.alias,
            applied = summary.applied,
            already_applied = summary.already_applied,
            after = %self.feed.after,
            "cursor advanced"
        );
        Ok(TurnOutcome::Advanced {
            applied: summary.applied,
            already_applied: summary.already_applied,
            after: self.feed.after.clone(),
        })
    }

    /// Apply `transactions` in order, stopping at the first failure.
    pub async fn process_batch(&self, transactions: &[Transaction]) -> ResultImport<BatchSummary> {
        let catalog = self.warehouse.catalog().await;
        let mut summary = BatchSummary::default();

        for tx in transactions {
            match apply_transaction(self.warehouse.database(), &catalog, tx).await? {
                ApplyOutcome::Applied => summary.applied += 1,
                ApplyOutcome::AlreadyApplied => summary.already_applied += 1,
            }
        }
        Ok(summary)
    }
}

/// Record `tx`, its inputs and outputs, and mark the outputs it spends, all
/// in one database transaction.
pub async fn apply_transaction<C: TransactionTrait>(
    db: &C,
    catalog: &Catalog,
    tx: &Transaction,
) -> ResultImport<ApplyOutcome> {
    let values = rows::transaction(catalog, tx)?;
    let txn = db.begin().await?;

    let sql = catalog.schema(Table::Transactions).insert_statement();
    if let Err(err) = insert(&txn, sql, values).await {
        txn.rollback().await?;
        if is_unique_violation(&err) {
            warn!(tx_id = %tx.id, "transaction already recorded");
            return Ok(ApplyOutcome::AlreadyApplied);
        }
        return Err(err.into());
    }

    if let Err(err) = write_legs(&txn, catalog, tx).await {
        txn.rollback().await?;
        return Err(err);
    }

    match txn.commit().await {
        Ok(()) => {
            debug!(
                tx_id = %tx.id,
                inputs = tx.inputs.len(),
                outputs = tx.outputs.len(),
                "transaction applied"
            );
            Ok(ApplyOutcome::Applied)
        }
        Err(err) if is_unique_violation(&err) => {
            warn!(tx_id = %tx.id, "transaction already recorded");
            Ok(ApplyOutcome::AlreadyApplied)
        }
        Err(err) => Err(err.into()),
    }
}

async fn write_legs(
    txn: &DatabaseTransaction,
    catalog: &Catalog,
    tx: &Transaction,
) -> ResultImport<()> {
    let inputs = catalog.schema(Table::TransactionInputs);
    let outputs = catalog.schema(Table::TransactionOutputs);

    for (index, input) in tx.inputs.iter().enumerate() {
        let values = rows::input(catalog, tx, index, input)?;
        insert(txn, inputs.insert_statement(), values).await?;
    }
    for (index, output) in tx.outputs.iter().enumerate() {
        let values = rows::output(catalog, tx, index, output)?;
        insert(txn, outputs.insert_statement(), values).await?;
    }

    let mark_spent = outputs.update_statement("spent", "output_id");
    for spent in tx.inputs.iter().filter_map(|i| i.spent_output_id.as_deref()) {
        txn.execute(Statement::from_sql_and_values(
            txn.get_database_backend(),
            mark_spent.as_str(),
            [flag(true), spent.into()],
        ))
        .await?;
    }
    Ok(())
}

async fn insert(
    txn: &DatabaseTransaction,
    sql: String,
    values: Vec<sea_orm::Value>,
) -> Result<(), DbErr> {
    txn.execute(Statement::from_sql_and_values(
        txn.get_database_backend(),
        sql,
        values,
    ))
    .await?;
    Ok(())
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
