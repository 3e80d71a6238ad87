use futures::StreamExt;
use futures::stream::FuturesUnordered;

/// Drive `futures` with at most `limit` in flight.
///
/// Futures start in submission order as earlier ones finish; outputs come
/// back in completion order.
pub(crate) async fn bounded<F: Future>(futures: impl IntoIterator<Item = F>, limit: usize) -> Vec<F::Output> {
    let mut pending = futures.into_iter();
    let mut processing: FuturesUnordered<F> = pending.by_ref().take(limit.max(1)).collect();
    let mut outputs = Vec::new();
    while let Some(output) = processing.next().await {
        outputs.push(output);
        // Pop-n-push, FIFO.
        if let Some(next) = pending.next() {
            processing.push(next);
        }
    }
    outputs
}
