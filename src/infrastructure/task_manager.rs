use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Manages background tasks with proper lifecycle handling
pub struct TaskManager {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TaskManager {
    /// Create a new empty task manager
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Token cancelled by [`abort_all`](Self::abort_all); timers hang off it
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Spawn a task and track it. The task stops when the manager is aborted.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());

        let token = self.token.child_token();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = future => {}
            }
        });
        self.handles.push(handle);
    }

    /// Number of tracked tasks still running
    pub fn active(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel every tracked task and timer without waiting
    pub fn abort_all(&mut self) {
        self.token.cancel();
        for handle in &self.handles {
            handle.abort();
        }
        self.handles.clear();
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
