use std::time::Duration;

use tradeq::error::Error;
use tradeq::model::{Status, Trade, WorkItem};
use tradeq::processor::{Processor, TradeProcessor};

#[tokio::test]
async fn trade_notional_is_quantity_times_price() {
    let processor = TradeProcessor::new(Duration::ZERO);
    let result = processor
        .process(WorkItem::from(Trade::new("T-1", "AAPL", 4.0, 2.5)))
        .await
        .unwrap();

    assert_eq!(result.id, "T-1");
    assert_eq!(result.symbol, "AAPL");
    assert_eq!(result.notional, 10.0);
    assert_eq!(result.status, Status::Processed);
}

#[tokio::test]
async fn non_finite_notional_is_a_processing_failure() {
    let processor = TradeProcessor::new(Duration::ZERO);
    let err = processor
        .process(WorkItem::from(Trade::new("x", "S", f64::MAX, 10.0)))
        .await
        .unwrap_err();

    match err {
        Error::Processing { key, message } => {
            assert_eq!(key, "x");
            assert!(message.contains("not finite"), "{message}");
        }
        other => panic!("expected processing error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn trade_processor_waits_for_its_delay() {
    let processor = TradeProcessor::new(Duration::from_secs(1));
    let started = tokio::time::Instant::now();
    processor
        .process(WorkItem::from(Trade::new("T-1", "AAPL", 1.0, 1.0)))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[test]
fn trades_are_keyed_by_id() {
    let item = WorkItem::from(Trade::new("T-9", "MSFT", 1.0, 1.0));
    assert_eq!(item.key, "T-9");
    assert_eq!(item.payload.symbol, "MSFT");
}
