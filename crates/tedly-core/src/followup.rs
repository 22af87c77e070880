// ── Delayed follow-up tasks ──
//
// After a command the controller schedules a few delayed actions (clear
// the operating guard, refresh from the cloud, revert a rejected request).
// Each one is its own task with its own cancellation token, parented to
// the controller's token so shutdown cancels whatever is still pending.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct FollowUp {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct FollowUps {
    parent: CancellationToken,
    tasks: Mutex<Vec<FollowUp>>,
}

impl FollowUps {
    pub(crate) fn new(parent: CancellationToken) -> Self {
        Self {
            parent,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Run `action` after `delay` unless cancelled first.
    ///
    /// The returned token cancels this follow-up alone.
    pub(crate) fn schedule<F>(&self, delay: Duration, action: F) -> CancellationToken
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.parent.child_token();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => action.await,
            }
        });

        let mut tasks = self.tasks.lock().expect("follow-up lock poisoned");
        tasks.retain(|t| !t.handle.is_finished());
        tasks.push(FollowUp {
            cancel: cancel.clone(),
            handle,
        });
        cancel
    }

    /// Number of follow-ups that have not run or been cancelled yet.
    pub(crate) fn pending(&self) -> usize {
        self.tasks
            .lock()
            .expect("follow-up lock poisoned")
            .iter()
            .filter(|t| !t.handle.is_finished() && !t.cancel.is_cancelled())
            .count()
    }

    /// Cancel every pending follow-up.
    pub(crate) fn cancel_all(&self) {
        for task in self.tasks.lock().expect("follow-up lock poisoned").drain(..) {
            task.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn runs_after_delay() {
        let followups = FollowUps::new(CancellationToken::new());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        followups.schedule(Duration::from_secs(5), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(followups.pending(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(followups.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_follow_up_never_runs() {
        let followups = FollowUps::new(CancellationToken::new());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        let token = followups.schedule(Duration::from_secs(5), async move {
            flag.store(true, Ordering::SeqCst);
        });
        token.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_reaches_every_follow_up() {
        let parent = CancellationToken::new();
        let followups = FollowUps::new(parent.clone());
        let ran = Arc::new(AtomicBool::new(false));

        for secs in [1, 2, 3] {
            let flag = Arc::clone(&ran);
            followups.schedule(Duration::from_secs(secs), async move {
                flag.store(true, Ordering::SeqCst);
            });
        }
        parent.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(followups.pending(), 0);
    }
}
