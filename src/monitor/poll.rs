use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A spawned background job that is aborted when dropped.
///
/// Views own these, so leaving a view (dropping its state) cancels every
/// interval and in-flight request it started.
#[derive(Debug)]
pub struct PollTask {
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Runs `job` right away and then every `period`.
    ///
    /// Ticks that fall behind (slow request, suspended laptop) are skipped
    /// instead of bursting.
    pub fn every<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                job().await;
            }
        });
        Self { handle }
    }

    /// Runs `job` once.
    pub fn once<Fut>(job: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(job),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A value produced by the generation `generation` of a [`Feed`].
#[derive(Debug)]
struct Tagged<T> {
    generation: u64,
    value: T,
}

/// Sends results into a [`Feed`] under the generation it was created for.
#[derive(Debug)]
pub struct Reporter<T> {
    generation: u64,
    tx: mpsc::UnboundedSender<Tagged<T>>,
}

impl<T> Clone for Reporter<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Reporter<T> {
    pub fn send(&self, value: T) {
        // the feed is gone, nobody is interested anymore
        let _ = self.tx.send(Tagged {
            generation: self.generation,
            value,
        });
    }
}

/// Results of one kind of background fetch, last request wins.
///
/// Starting a new fetch bumps the generation and aborts the previous job, so
/// a result is only ever delivered if no newer fetch was started after it.
/// Results sent before the abort landed are discarded on [`Feed::drain`].
#[derive(Debug)]
pub struct Feed<T> {
    generation: u64,
    tx: mpsc::UnboundedSender<Tagged<T>>,
    rx: mpsc::UnboundedReceiver<Tagged<T>>,
    task: Option<PollTask>,
}

impl<T: Send + 'static> Default for Feed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Feed<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            generation: 0,
            tx,
            rx,
            task: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn reporter(&self) -> Reporter<T> {
        Reporter {
            generation: self.generation,
            tx: self.tx.clone(),
        }
    }

    /// Whether a job is currently scheduled (repeating or not yet done).
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Invalidates everything in flight and cancels the current job.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.task = None;
    }

    /// Replaces the current job with `fetch`, run now and then every `period`.
    pub fn spawn_every<F, Fut>(&mut self, period: Duration, fetch: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.spawn_reporting(period, move |reporter| {
            let fut = fetch();
            async move { reporter.send(fut.await) }
        });
    }

    /// Like [`Feed::spawn_every`], for jobs that deliver several results per run.
    pub fn spawn_reporting<F, Fut>(&mut self, period: Duration, job: F)
    where
        F: Fn(Reporter<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();
        let reporter = self.reporter();
        self.task = Some(PollTask::every(period, move || job(reporter.clone())));
    }

    /// Replaces the current job with a single `fetch`.
    pub fn spawn_once<Fut>(&mut self, fetch: Fut)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        self.stop();
        let reporter = self.reporter();
        self.task = Some(PollTask::once(async move { reporter.send(fetch.await) }));
    }

    /// Runs `job` to completion without replacing the current job.
    ///
    /// Used for mutations that must not be aborted halfway; the result is still
    /// dropped if the feed is stopped or restarted before it arrives.
    pub fn detach<Fut>(&self, job: Fut)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let reporter = self.reporter();
        tokio::spawn(async move { reporter.send(job.await) });
    }

    /// All results of the current generation that arrived since the last call.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(tagged) = self.rx.try_recv() {
            if tagged.generation == self.generation {
                values.push(tagged.value);
            }
        }
        values
    }

    /// The most recent result of the current generation, if any.
    pub fn latest(&mut self) -> Option<T> {
        self.drain().pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_last_selection_wins() {
        let mut feed: Feed<&'static str> = Feed::new();
        feed.spawn_once(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "6h"
        });
        feed.spawn_once(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "24h"
        });

        settle().await;
        assert_eq!(feed.drain(), vec!["24h"]);
        assert!(feed.drain().is_empty());
    }

    #[tokio::test]
    async fn test_stale_results_are_discarded() {
        let mut feed: Feed<u32> = Feed::new();
        feed.spawn_once(async { 1 });
        settle().await;

        // already delivered but not drained before the restart
        feed.spawn_once(async { 2 });
        settle().await;
        assert_eq!(feed.latest(), Some(2));

        feed.detach(async { 3 });
        feed.stop();
        settle().await;
        assert_eq!(feed.latest(), None);
    }

    #[tokio::test]
    async fn test_drop_cancels_interval() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = PollTask::every(Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        settle().await;
        drop(task);
        let after_drop = runs.load(Ordering::SeqCst);
        assert!(after_drop >= 1);

        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), after_drop);
    }

    #[tokio::test]
    async fn test_repeating_feed() {
        let mut feed: Feed<usize> = Feed::new();
        let runs = Arc::new(AtomicUsize::new(0));
        feed.spawn_every(Duration::from_millis(5), move || {
            let runs = runs.clone();
            async move { runs.fetch_add(1, Ordering::SeqCst) }
        });
        assert!(feed.is_active());

        settle().await;
        let values = feed.drain();
        assert!(values.len() >= 2);
        assert_eq!(values[0], 0);

        feed.stop();
        assert!(!feed.is_active());
    }
}
