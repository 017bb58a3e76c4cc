//! Bounded fan-out over independent fallible operations.

use futures::future::join_all;
use std::future::Future;

/// Index-aligned outcomes: exactly one of `results[i]` / `errors[i]` is set.
#[derive(Debug)]
pub struct FanOutResults<T, E> {
    pub results: Vec<Option<T>>,
    pub errors: Vec<Option<E>>,
}

impl<T, E> FanOutResults<T, E> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Outcomes in submission order.
    pub fn into_outcomes(self) -> impl Iterator<Item = Result<T, E>> {
        self.results
            .into_iter()
            .zip(self.errors)
            .filter_map(|(result, error)| match (result, error) {
                (Some(value), _) => Some(Ok(value)),
                (None, Some(err)) => Some(Err(err)),
                (None, None) => None,
            })
    }
}

/// Run `operations` in batches of at most `limit`, one batch after another.
///
/// A failure never cancels its siblings or later batches.
pub async fn bounded_fan_out<F, T, E>(operations: Vec<F>, limit: usize) -> FanOutResults<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let limit = limit.max(1);
    let mut results = Vec::with_capacity(operations.len());
    let mut errors = Vec::with_capacity(operations.len());

    let mut pending = operations.into_iter();
    loop {
        let batch: Vec<F> = pending.by_ref().take(limit).collect();
        if batch.is_empty() {
            break;
        }
        for outcome in join_all(batch).await {
            match outcome {
                Ok(value) => {
                    results.push(Some(value));
                    errors.push(None);
                }
                Err(err) => {
                    results.push(None);
                    errors.push(Some(err));
                }
            }
        }
    }

    FanOutResults { results, errors }
}
