//! The time-slicer loop (§4.G): a dedicated background worker that
//! periodically sorts partitions by priority and rotates any partition that
//! cannot currently seat everything it holds.
//!
//! Cancellation uses a `crossbeam_channel` rendezvous channel as the sleep
//! primitive (§9 design notes): `recv_timeout` is simultaneously the sleep
//! and a cancellation point, with an explicit non-blocking check at the top
//! of the loop as the second point, so each tick has the two
//! well-defined cancellation points §5 requires without a hand-rolled
//! polling loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::collaborators::ClusterView;
use crate::error::GangError;
use crate::scheduler::SchedulerState;

const CANCEL_RETRY_ATTEMPTS: u32 = 20;
const CANCEL_RETRY_INTERVAL: Duration = Duration::from_millis(50);

pub struct Slicer {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Slicer {
    pub fn spawn(state: Arc<Mutex<SchedulerState>>, collab: Arc<dyn ClusterView>, time_slice: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(0);
        let handle = thread::Builder::new()
            .name("gang-slicer".to_string())
            .spawn(move || slicer_loop(state, collab, shutdown_rx, time_slice))
            .expect("failed to spawn the gang time-slicer thread");
        Slicer { shutdown_tx: Some(shutdown_tx), handle: Some(handle) }
    }

    /// Signals shutdown and waits, with bounded retries, for the worker to
    /// exit. Never blocks indefinitely: a worker that fails to exit within
    /// the retry budget is logged and abandoned rather than risking a
    /// deadlock in `fini`.
    pub fn shutdown(mut self) -> Result<(), GangError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(handle) = self.handle.take() else { return Ok(()) };

        for _ in 0..CANCEL_RETRY_ATTEMPTS {
            if handle.is_finished() {
                let _ = handle.join();
                return Ok(());
            }
            thread::sleep(CANCEL_RETRY_INTERVAL);
        }

        error!("gang slicer did not exit after {CANCEL_RETRY_ATTEMPTS} cooperative-cancellation attempts; abandoning the handle");
        Err(GangError::WorkerRefusedCancel)
    }
}

fn slicer_loop(state: Arc<Mutex<SchedulerState>>, collab: Arc<dyn ClusterView>, shutdown_rx: Receiver<()>, time_slice: Duration) {
    loop {
        // Cancellation point 1: before this tick's work.
        if shutdown_rx.try_recv().is_ok() {
            debug!("gang slicer cancelled before starting a tick");
            return;
        }

        {
            let mut guard = state.lock();
            guard.tick(collab.as_ref());
        }

        // Cancellation point 2: the sleep itself.
        match shutdown_rx.recv_timeout(time_slice) {
            Ok(()) => {
                debug!("gang slicer cancelled during its sleep");
                return;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("gang slicer shutdown channel disconnected; exiting");
                return;
            }
        }
    }
}
