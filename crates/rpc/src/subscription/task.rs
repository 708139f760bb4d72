//! The consumption task shared by the channel based listeners.
//!
//! A [ListenerTask] owns the future which drains the listener's channels, the token which
//! cancels it, and the clean-up which hands the channels back to their event source. The
//! clean-up runs exactly once: when the future exits for whatever reason, when [ListenerTask::stop]
//! gives up waiting for it, or when a task which was never started is stopped.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::StopError;

/// A clean-up action which can only run once.
struct Deregistration(Mutex<Option<Box<dyn FnOnce() + Send>>>);

impl Deregistration {
    fn new(deregister: impl FnOnce() + Send + 'static) -> Arc<Self> {
        Arc::new(Self(Mutex::new(Some(Box::new(deregister)))))
    }

    fn run(&self) {
        let deregister = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(deregister) = deregister {
            deregister();
        }
    }
}

/// Runs the deregistration when the consumption future is dropped, including on abort.
struct DeregisterOnDrop(Arc<Deregistration>);

impl Drop for DeregisterOnDrop {
    fn drop(&mut self) {
        self.0.run();
    }
}

enum State {
    Idle(BoxFuture<'static, ()>),
    Running(JoinHandle<()>),
    Stopped,
}

pub(crate) struct ListenerTask {
    state: Mutex<State>,
    cancellation: CancellationToken,
    deregistration: Arc<Deregistration>,
    cancel_timeout: Duration,
}

impl ListenerTask {
    pub fn new<F, D>(consume: F, deregister: D, cancel_timeout: Duration) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
        D: FnOnce() + Send + 'static,
    {
        Self {
            state: Mutex::new(State::Idle(consume.boxed())),
            cancellation: CancellationToken::new(),
            deregistration: Deregistration::new(deregister),
            cancel_timeout,
        }
    }

    /// Spawns the consumption future. Does nothing if the task was already started or stopped.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, State::Idle(_)) {
            return;
        }
        let State::Idle(consume) = std::mem::replace(&mut *state, State::Stopped) else {
            return;
        };

        let cancellation = self.cancellation.clone();
        let guard = DeregisterOnDrop(self.deregistration.clone());
        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                _ = cancellation.cancelled() => {}
                _ = consume => {}
            }
        });

        *state = State::Running(handle);
    }

    /// Cancels the consumption future and waits for it to exit.
    ///
    /// If it does not exit within the cancellation timeout it is aborted, its channels are
    /// deregistered and a timeout error is returned. Stopping again is a no-op.
    pub async fn stop(&self) -> Result<(), StopError> {
        let state = std::mem::replace(
            &mut *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            State::Stopped,
        );

        match state {
            State::Stopped => Ok(()),
            State::Idle(_) => {
                self.deregistration.run();
                Ok(())
            }
            State::Running(mut handle) => {
                self.cancellation.cancel();
                match tokio::time::timeout(self.cancel_timeout, &mut handle).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => {
                        tracing::warn!(error=%e, "Listener task failed");
                        self.deregistration.run();
                        Ok(())
                    }
                    Err(_) => {
                        handle.abort();
                        self.deregistration.run();
                        Err(StopError::Timeout(self.cancel_timeout))
                    }
                }
            }
        }
    }

    /// Deregisters a task which was never started, without waiting.
    pub fn discard(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let State::Idle(_) = &*state {
            *state = State::Stopped;
            drop(state);
            self.deregistration.run();
        }
    }
}
