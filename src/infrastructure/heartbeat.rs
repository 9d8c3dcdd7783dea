use super::ScheduledTask;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which half of the activity check fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatStage {
    /// No activity for `activity_timeout`: time to ping
    Activity,
    /// No pong within `pong_timeout` after the ping
    PongTimeout,
}

/// Callback invoked when a stage fires, with the arming sequence number
pub type HeartbeatSink = Arc<dyn Fn(HeartbeatStage, u64) + Send + Sync>;

/// Two-stage activity check: ping after silence, give up when the pong never comes.
///
/// Only one timer is ever armed; re-arming cancels the previous one. Every
/// arming gets a new sequence number so a firing that raced a re-arm can be
/// recognized and ignored with [`is_current`](Self::is_current).
pub struct HeartbeatManager {
    activity_timeout: Duration,
    pong_timeout: Duration,
    timer: Option<ScheduledTask>,
    seq: u64,
}

impl HeartbeatManager {
    pub fn new(activity_timeout: Duration, pong_timeout: Duration) -> Self {
        Self {
            activity_timeout,
            pong_timeout,
            timer: None,
            seq: 0,
        }
    }

    pub fn activity_timeout(&self) -> Duration {
        self.activity_timeout
    }

    /// The server announces its own activity timeout on connection
    pub fn set_activity_timeout(&mut self, timeout: Duration) {
        self.activity_timeout = timeout;
    }

    /// (Re)start the activity stage
    pub fn reset(&mut self, parent: &CancellationToken, sink: HeartbeatSink) {
        self.schedule(HeartbeatStage::Activity, self.activity_timeout, parent, sink);
    }

    /// Start waiting for the pong after a ping went out
    pub fn await_pong(&mut self, parent: &CancellationToken, sink: HeartbeatSink) {
        self.schedule(HeartbeatStage::PongTimeout, self.pong_timeout, parent, sink);
    }

    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.seq += 1;
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.seq == seq
    }

    fn schedule(
        &mut self,
        stage: HeartbeatStage,
        delay: Duration,
        parent: &CancellationToken,
        sink: HeartbeatSink,
    ) {
        self.stop();
        let seq = self.seq;
        self.timer = Some(ScheduledTask::after(delay, parent, move || sink(stage, seq)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_sink() -> (HeartbeatSink, Arc<Mutex<Vec<(HeartbeatStage, u64)>>>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&fired);
        let sink: HeartbeatSink = Arc::new(move |stage, seq| log.lock().unwrap().push((stage, seq)));
        (sink, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_stage_fires_after_timeout() {
        let token = CancellationToken::new();
        let (sink, fired) = recording_sink();
        let mut heartbeat = HeartbeatManager::new(Duration::from_secs(120), Duration::from_secs(30));

        heartbeat.reset(&token, sink);
        tokio::time::sleep(Duration::from_secs(119)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, HeartbeatStage::Activity);
        assert!(heartbeat.is_current(fired[0].1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_stage() {
        let token = CancellationToken::new();
        let (sink, fired) = recording_sink();
        let mut heartbeat = HeartbeatManager::new(Duration::from_secs(10), Duration::from_secs(5));

        heartbeat.reset(&token, Arc::clone(&sink));
        tokio::time::sleep(Duration::from_secs(8)).await;
        heartbeat.reset(&token, sink);
        tokio::time::sleep(Duration::from_secs(8)).await;

        assert!(fired.lock().unwrap().is_empty());
        assert!(heartbeat.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_stage_uses_pong_timeout() {
        let token = CancellationToken::new();
        let (sink, fired) = recording_sink();
        let mut heartbeat = HeartbeatManager::new(Duration::from_secs(120), Duration::from_secs(30));

        heartbeat.await_pong(&token, sink);
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(fired.lock().unwrap()[0].0, HeartbeatStage::PongTimeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_invalidates_sequence() {
        let token = CancellationToken::new();
        let (sink, fired) = recording_sink();
        let mut heartbeat = HeartbeatManager::new(Duration::from_secs(1), Duration::from_secs(1));

        heartbeat.reset(&token, sink);
        let armed_seq = heartbeat.seq;
        heartbeat.stop();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(fired.lock().unwrap().is_empty());
        assert!(!heartbeat.is_current(armed_seq));
        assert!(!heartbeat.is_armed());
    }
}
