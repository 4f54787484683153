// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Timer registration passthrough (§4.F `timer_cb`): the transport owns the
//! actual timer wheel, the engine only ever asks it to register/cancel one.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, sleep},
};

/// How a registered timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// `(enabled=false)`: the timer is disarmed.
    Off,
    /// `(enabled=true, astable=true)`: fires every `period` until cancelled.
    Periodic,
    /// `(enabled=true, astable=false)`: fires once after `period`.
    OneShot,
}

impl TimerMode {
    pub fn from_flags(enabled: bool, astable: bool) -> Self {
        match (enabled, astable) {
            (false, _) => TimerMode::Off,
            (true, true) => TimerMode::Periodic,
            (true, false) => TimerMode::OneShot,
        }
    }
}

/// A registration request for [`crate::transport::Transport::register_timer`].
#[derive(Debug, Clone)]
pub struct TimerSpec {
    pub period: Duration,
    pub mode: TimerMode,
}

/// A handle to a running timer task. Dropping it cancels the timer.
/// Each fire is observed by calling [`TimerHandle::tick`].
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
    ticks: mpsc::UnboundedReceiver<()>,
}

impl TimerHandle {
    /// Spawns the background task implementing `spec`. `Off` mode never
    /// fires and returns a handle whose `tick` never resolves.
    pub fn spawn(spec: TimerSpec) -> Self {
        let (tx, ticks) = mpsc::unbounded_channel();
        let task = match spec.mode {
            TimerMode::Off => None,
            TimerMode::OneShot => Some(tokio::spawn(async move {
                sleep(spec.period).await;
                let _ = tx.send(());
            })),
            TimerMode::Periodic => Some(tokio::spawn(async move {
                let mut ticker = interval(spec.period);
                loop {
                    ticker.tick().await;
                    if tx.send(()).is_err() {
                        break;
                    }
                }
            })),
        };
        Self { task, ticks }
    }

    /// Waits for the next fire. Resolves to `None` once the timer is
    /// cancelled or was registered in `Off` mode.
    pub async fn tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_mapping_matches_spec() {
        assert_eq!(TimerMode::from_flags(false, false), TimerMode::Off);
        assert_eq!(TimerMode::from_flags(false, true), TimerMode::Off);
        assert_eq!(TimerMode::from_flags(true, true), TimerMode::Periodic);
        assert_eq!(TimerMode::from_flags(true, false), TimerMode::OneShot);
    }

    #[tokio::test]
    async fn one_shot_fires_once() {
        let mut handle = TimerHandle::spawn(TimerSpec {
            period: Duration::from_millis(5),
            mode: TimerMode::OneShot,
        });
        handle.tick().await.expect("fires once");
    }
}
