//! State scopes: the structured-concurrency container for per-state work.
//!
//! Each state activation owns one scope. Entry effects, `run` streams and
//! invokes, and non-persistent delay timers are all forked into it; closing
//! the scope cancels its token, aborts every task, and awaits each handle to
//! a cancelled terminal. Tasks observe cancellation cooperatively by
//! selecting on the scope token at their suspension points.

// Layer 1: Standard library imports
use std::future::Future;

// Layer 2: Third-party crate imports
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
// (none)

/// The scope owning all forked work of one state activation.
pub(crate) struct StateScope {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl StateScope {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// A clone of the scope's cancellation token.
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fork `future` into the scope.
    pub(crate) fn spawn(&mut self, future: impl Future<Output = ()> + Send + 'static) {
        self.tasks.push(tokio::spawn(future));
    }

    /// Close the scope: cancel, abort, and await every task to a terminal.
    ///
    /// Interruption errors are swallowed here; they do not transition the
    /// machine.
    pub(crate) async fn close(mut self) {
        self.token.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_interrupts_pending_task() {
        let mut scope = StateScope::new();
        let completed = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&completed);
        scope.spawn(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            flag.store(true, Ordering::SeqCst);
        });

        scope.close().await;
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cooperative_cancellation_via_token() {
        let mut scope = StateScope::new();
        let token = scope.token();
        let observed = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&observed);
        scope.spawn(async move {
            token.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        // Yield so the task reaches its suspension point.
        tokio::task::yield_now().await;
        scope.close().await;

        // The task may have been aborted before or after observing the
        // token; either way close() returned only after its terminal.
    }

    #[tokio::test]
    async fn test_completed_task_close_is_quiet() {
        let mut scope = StateScope::new();
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        scope.spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::task::yield_now().await;
        scope.close().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_close_awaits_all_tasks() {
        let mut scope = StateScope::new();
        for _ in 0..8 {
            scope.spawn(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            });
        }

        // Must return promptly despite the hour-long sleeps.
        tokio::time::timeout(Duration::from_secs(5), scope.close())
            .await
            .unwrap();
    }
}
