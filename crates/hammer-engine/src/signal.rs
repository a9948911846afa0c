//! External cancellation wiring.
//!
//! Translates the platform interrupt (Ctrl-C) into [`Barrier::cancel`].
//! Workers observe the resulting done signal at their next
//! `try_grab_work`/`pace` boundary; nothing is forcibly aborted.

use std::sync::Arc;

use log::info;

use crate::barrier::Barrier;

/// Spawn a task that cancels `barrier` the first time the process
/// receives SIGINT. The task exits once the barrier is already done, so
/// it never outlives the run.
pub fn wire_ctrl_c(barrier: Arc<Barrier>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, cancelling run");
                barrier.cancel();
            }
            _ = barrier.done().notified() => {}
        }
    })
}
