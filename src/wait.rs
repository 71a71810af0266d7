//! Bounded, cancellable convergence polling
//!
//! [`poll_until_converged`] is the only suspension point of a reconciliation.
//! It observes a resource at a fixed interval until a readiness predicate
//! holds, the time budget is spent, or the caller cancels.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Terminal state of a convergence wait
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// The predicate held for the last observation
    Converged(Option<T>),
    /// The time budget was spent before the predicate held
    TimedOut {
        /// Message of the last predicate failure, if any
        last_error: Option<String>,
    },
    /// The caller canceled the wait
    Canceled,
}

impl<T> PollOutcome<T> {
    /// Map a terminal outcome onto the crate error taxonomy
    ///
    /// `Converged` yields the last snapshot, the other outcomes become
    /// [`Error::Timeout`] and [`Error::Canceled`] for `kind` `name`.
    pub fn into_result(self, kind: &str, name: &str) -> Result<Option<T>> {
        match self {
            Self::Converged(snapshot) => Ok(snapshot),
            Self::TimedOut { last_error } => Err(Error::timeout(kind, name, last_error)),
            Self::Canceled => Err(Error::canceled(kind, name)),
        }
    }
}

/// Poll `fetch` until `predicate` accepts the observation
///
/// The first fetch happens immediately. Between fetches the poller sleeps
/// `min(interval, remaining)`; cancellation interrupts the sleep and no fetch
/// is issued once cancellation has been observed. A predicate `Err` is
/// remembered for the timeout diagnostic and polling continues. A fetch `Err`
/// aborts the wait.
pub async fn poll_until_converged<T, F, Fut, P>(
    mut fetch: F,
    mut predicate: P,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
    P: FnMut(Option<&T>) -> Result<bool>,
{
    let start = Instant::now();
    let mut last_error: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            debug!("wait canceled before next observation");
            return Ok(PollOutcome::Canceled);
        }

        let snapshot = fetch().await?;
        match predicate(snapshot.as_ref()) {
            Ok(true) => return Ok(PollOutcome::Converged(snapshot)),
            Ok(false) => trace!("condition not yet met"),
            Err(e) => {
                debug!(error = %e, "condition reported failure, retrying");
                last_error = Some(e.to_string());
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(PollOutcome::TimedOut { last_error });
        }

        let pause = interval.min(timeout - elapsed);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("wait canceled during sleep");
                return Ok(PollOutcome::Canceled);
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_secs(5);
    const TIMEOUT: Duration = Duration::from_secs(60);

    fn counting_fetch(
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<Result<Option<usize>>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(Some(n)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn converges_after_k_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome = poll_until_converged(
            counting_fetch(calls.clone()),
            |n: Option<&usize>| Ok(n.is_some_and(|n| *n >= 3)),
            INTERVAL,
            TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Converged(Some(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_fetch_does_not_sleep() {
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome = poll_until_converged(
            || std::future::ready(Ok(Some(()))),
            |_| Ok(true),
            INTERVAL,
            TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Converged(Some(())));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let outcome = poll_until_converged(
            counting_fetch(calls.clone()),
            |_| Ok(false),
            INTERVAL,
            TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::TimedOut { last_error: None });
        assert!(start.elapsed() <= TIMEOUT + INTERVAL);
        assert!(start.elapsed() >= TIMEOUT);
        // t = 0, 5, ..., 60
        assert_eq!(calls.load(Ordering::SeqCst), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn last_predicate_failure_is_reported_on_timeout() {
        let cancel = CancellationToken::new();

        let outcome = poll_until_converged(
            || std::future::ready(Ok(Some(()))),
            |_| Err(Error::not_ready("Infrastructure", "ns/a", "quota exceeded")),
            INTERVAL,
            Duration::from_secs(10),
            &cancel,
        )
        .await
        .unwrap();

        match outcome {
            PollOutcome::TimedOut {
                last_error: Some(msg),
            } => assert!(msg.contains("quota exceeded")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep_and_stops_fetching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let outcome = poll_until_converged(
            counting_fetch(calls.clone()),
            |_| Ok(false),
            INTERVAL,
            TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Canceled);
        // t = 0, 5, 10; canceled at 12 while sleeping
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn already_canceled_token_never_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poll_until_converged(
            counting_fetch(calls.clone()),
            |_| Ok(true),
            INTERVAL,
            TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Canceled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_aborts_wait() {
        let cancel = CancellationToken::new();

        let result: Result<PollOutcome<()>> = poll_until_converged(
            || std::future::ready(Err(Error::internal("connection refused"))),
            |_| Ok(true),
            INTERVAL,
            TIMEOUT,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn absent_object_is_an_observation() {
        let cancel = CancellationToken::new();

        let outcome: PollOutcome<()> = poll_until_converged(
            || std::future::ready(Ok(None)),
            |obj: Option<&()>| Ok(obj.is_none()),
            INTERVAL,
            TIMEOUT,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, PollOutcome::Converged(None));
    }

    #[test]
    fn outcomes_map_to_errors() {
        let converged: PollOutcome<u8> = PollOutcome::Converged(Some(1));
        assert_eq!(converged.into_result("Infrastructure", "ns/a").unwrap(), Some(1));

        let timed_out: PollOutcome<u8> = PollOutcome::TimedOut {
            last_error: Some("boom".to_string()),
        };
        let err = timed_out.into_result("Infrastructure", "ns/a").unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.to_string().contains("boom"));

        let canceled: PollOutcome<u8> = PollOutcome::Canceled;
        assert!(matches!(
            canceled.into_result("Infrastructure", "ns/a"),
            Err(Error::Canceled { .. })
        ));
    }
}
