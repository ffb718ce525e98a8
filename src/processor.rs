//! Processing units: the per-item work the dispatcher launches.
//!
//! The dispatcher knows nothing about what processing does or how long it
//! takes. It only needs one result or one failure per item.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Status, Trade, TradeResult, WorkItem};

/// Asynchronous per-item processing.
pub trait Processor: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Process one item, resolving to exactly one result or one failure.
    fn process(
        &self,
        item: WorkItem<Self::Input>,
    ) -> impl Future<Output = Result<Self::Output>> + Send;
}

// ---------------------------------------------------------------------------
// Closures
// ---------------------------------------------------------------------------

/// Processor backed by an async closure. Build one with [`processor_fn`].
pub struct ProcessorFn<I, F> {
    f: F,
    _input: PhantomData<fn(I)>,
}

/// Wrap an async closure as a [`Processor`].
///
/// ```
/// use tradeq::processor::processor_fn;
///
/// let doubler = processor_fn(|item: tradeq::model::WorkItem<u32>| async move {
///     Ok::<_, tradeq::error::Error>(item.payload * 2)
/// });
/// # let _ = doubler;
/// ```
pub fn processor_fn<I, O, F, Fut>(f: F) -> ProcessorFn<I, F>
where
    F: Fn(WorkItem<I>) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    ProcessorFn {
        f,
        _input: PhantomData,
    }
}

impl<I, O, F, Fut> Processor for ProcessorFn<I, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(WorkItem<I>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send,
{
    type Input = I;
    type Output = O;

    fn process(&self, item: WorkItem<I>) -> impl Future<Output = Result<O>> + Send {
        (self.f)(item)
    }
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// Computes trade notional after a fixed simulated latency.
#[derive(Debug, Clone)]
pub struct TradeProcessor {
    delay: Duration,
}

impl TradeProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for TradeProcessor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_PROCESS_DELAY)
    }
}

impl Processor for TradeProcessor {
    type Input = Trade;
    type Output = TradeResult;

    async fn process(&self, item: WorkItem<Trade>) -> Result<TradeResult> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let trade = item.payload;
        let notional = trade.quantity * trade.price;
        if !notional.is_finite() {
            return Err(Error::Processing {
                key: item.key,
                message: format!(
                    "notional is not finite (quantity {}, price {})",
                    trade.quantity, trade.price
                ),
            });
        }

        debug!(id = %trade.id, symbol = %trade.symbol, notional, "trade processed");
        Ok(TradeResult {
            id: trade.id,
            symbol: trade.symbol,
            notional,
            status: Status::Processed,
        })
    }
}
