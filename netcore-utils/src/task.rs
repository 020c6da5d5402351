//
// Copyright (c) The Netcore Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use derive_new::new;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task;
use tokio::time::Instant;
use tracing::{Instrument, error};

/// Handle to a task created by [`Task::spawn`].
///
/// Dropping the handle aborts the task unless [`Task::detach`] was called.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
    detached: bool,
}

/// Handle to a one-shot timer created by [`TimeoutTask::new`].
///
/// Dropping the handle cancels the timer. Protocol timers (report delays,
/// neighbor reachability, retransmissions) are all built on top of this.
#[derive(Debug)]
pub struct TimeoutTask {
    _task: Task<()>,
    control: UnboundedSender<Control>,
    deadline: Arc<Mutex<Instant>>,
}

#[derive(Debug, new)]
struct Deadline {
    timeout: Duration,
    next: Instant,
}

#[derive(Debug)]
enum Control {
    Reset(Option<Duration>),
}

// ===== impl Task =====

impl<T> Task<T> {
    /// Spawns a new asynchronous task, returning a handle for it.
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: task::spawn(future),
            detached: false,
        }
    }

    /// Detaches the task so that dropping the handle no longer aborts it.
    pub fn detach(&mut self) {
        self.detached = true;
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, task::JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if !self.detached {
            self.join_handle.abort();
        }
    }
}

// ===== impl TimeoutTask =====

impl TimeoutTask {
    /// Arms a timer that runs `cb` once `timeout` elapses.
    pub fn new<F, Fut>(timeout: Duration, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();

        let deadline = Arc::new(Mutex::new(Instant::now() + timeout));
        let deadline_child = deadline.clone();

        let task = Task::spawn(
            async move {
                let next = Instant::now() + timeout;
                let mut state = Deadline::new(timeout, next);
                let sleep = tokio::time::sleep_until(state.next);
                tokio::pin!(sleep);

                loop {
                    tokio::select! {
                        _ = &mut sleep => {
                            (cb)().await;
                            break;
                        }
                        control = control_rx.recv() => {
                            let Some(Control::Reset(timeout)) = control else {
                                // Handle dropped: timer cancelled.
                                break;
                            };
                            if let Some(timeout) = timeout {
                                state.timeout = timeout;
                            }
                            state.next = Instant::now() + state.timeout;
                            sleep.as_mut().reset(state.next);
                            if let Ok(mut deadline) = deadline_child.lock() {
                                *deadline = state.next;
                            }
                        }
                    }
                }
            }
            .in_current_span(),
        );

        TimeoutTask {
            _task: task,
            control: control_tx,
            deadline,
        }
    }

    /// Re-arms a timer that hasn't fired yet.
    ///
    /// Without a new value the previous timeout is reused.
    pub fn reset(&mut self, timeout: Option<Duration>) {
        if self.control.send(Control::Reset(timeout)).is_err() {
            error!("failed to reset timeout");
        }
    }

    /// Returns the time left before the timer fires.
    pub fn remaining(&self) -> Duration {
        match self.deadline.lock() {
            Ok(deadline) => deadline.saturating_duration_since(Instant::now()),
            Err(_) => Duration::ZERO,
        }
    }
}
