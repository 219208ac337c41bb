use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// What a sequential run does after an item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Keep going; failed items stay stale until the next run.
    #[default]
    ContinueOnError,
    /// Stop at the first failure; the rest are reported as skipped.
    AbortOnError,
}

#[derive(Debug)]
pub struct RunReport<T, E> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(T, E)>,
    pub skipped: Vec<T>,
}

impl<T, E> RunReport<T, E> {
    fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Runs one async call per item, strictly one at a time: an item's call is
/// not issued until the previous item's call has resolved and been settled.
#[derive(Debug, Clone, Default)]
pub struct SequentialRunner {
    policy: ErrorPolicy,
    stop: Option<CancellationToken>,
}

impl SequentialRunner {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self { policy, stop: None }
    }

    /// Once `stop` fires, no further call is issued; the remaining items are
    /// reported as skipped. A call already in flight still settles.
    pub fn until(mut self, stop: CancellationToken) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stopped(&self) -> bool {
        self.stop.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// `call` issues the request for one item; `settle` runs synchronously
    /// with its result before the next item starts.
    pub async fn run<T, E, F, Fut, S>(&self, items: Vec<T>, mut call: F, mut settle: S) -> RunReport<T, E>
    where
        F: FnMut(&T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        S: FnMut(&T, &Result<(), E>),
    {
        let mut report = RunReport::new();
        let mut queue = items.into_iter();

        while let Some(item) = queue.next() {
            if self.stopped() {
                report.skipped.push(item);
                report.skipped.extend(queue);
                break;
            }

            let result = call(&item).await;
            settle(&item, &result);

            match result {
                Ok(()) => report.succeeded.push(item),
                Err(e) => {
                    report.failed.push((item, e));
                    if self.policy == ErrorPolicy::AbortOnError {
                        report.skipped.extend(queue);
                        break;
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn fail_on(bad: u32) -> impl FnMut(&u32) -> std::future::Ready<Result<(), String>> {
        move |item| {
            let result = if *item == bad { Err(format!("item {item} failed")) } else { Ok(()) };
            std::future::ready(result)
        }
    }

    #[tokio::test]
    async fn continue_policy_visits_every_item() {
        let settled = RefCell::new(Vec::new());
        let report = SequentialRunner::new(ErrorPolicy::ContinueOnError)
            .run(vec![1, 2, 3], fail_on(2), |item, result| {
                settled.borrow_mut().push((*item, result.is_ok()))
            })
            .await;

        assert_eq!(report.succeeded, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(settled.into_inner(), vec![(1, true), (2, false), (3, true)]);
    }

    #[tokio::test]
    async fn abort_policy_skips_the_rest() {
        let report = SequentialRunner::new(ErrorPolicy::AbortOnError)
            .run(vec![1, 2, 3, 4], fail_on(2), |_, _| {})
            .await;

        assert_eq!(report.succeeded, vec![1]);
        assert_eq!(report.failed[0].0, 2);
        assert_eq!(report.skipped, vec![3, 4]);
    }

    #[tokio::test]
    async fn calls_do_not_overlap() {
        let log = RefCell::new(Vec::new());
        SequentialRunner::default()
            .run(
                vec![1, 2, 3],
                |item| {
                    let item = *item;
                    log.borrow_mut().push(format!("start {item}"));
                    async move {
                        tokio::task::yield_now().await;
                        Ok::<(), ()>(())
                    }
                },
                |item, _| log.borrow_mut().push(format!("end {item}")),
            )
            .await;

        assert_eq!(
            log.into_inner(),
            vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
        );
    }

    #[tokio::test]
    async fn stop_token_prevents_further_calls() {
        let stop = CancellationToken::new();
        let calls = RefCell::new(Vec::new());
        let report = SequentialRunner::default()
            .until(stop.clone())
            .run(
                vec![1, 2, 3],
                |item| {
                    calls.borrow_mut().push(*item);
                    std::future::ready(Ok::<(), ()>(()))
                },
                |item, _| {
                    if *item == 1 {
                        stop.cancel();
                    }
                },
            )
            .await;

        assert_eq!(calls.into_inner(), vec![1]);
        assert_eq!(report.succeeded, vec![1]);
        assert_eq!(report.skipped, vec![2, 3]);
    }
}
