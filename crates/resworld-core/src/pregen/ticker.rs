//! Repeating tick driver - one thread per job
//!
//! Each job owns a thread that ticks it on a fixed cadence. Ticks of one job
//! never overlap; a stop request wakes the thread between ticks and a tick
//! already in flight runs to completion first.

use crossbeam_channel::{Receiver, Sender, select};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::job::{PregenJob, TickOutcome};

/// Cooperative cancellation flag shared by a job and its handle
#[derive(Debug, Clone)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl StopSignal {
    /// Create a signal and the receiver its tick thread waits on
    pub fn pair() -> (Self, Receiver<()>) {
        let (wake, wake_rx) = crossbeam_channel::bounded(1);
        (
            Self {
                stopped: Arc::new(AtomicBool::new(false)),
                wake,
            },
            wake_rx,
        )
    }

    /// Request the job to stop; idempotent
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            // Full or disconnected both mean nobody needs waking
            let _ = self.wake.try_send(());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Spawn the tick thread for `job`
///
/// The first tick runs immediately, then once per `interval`.
pub(crate) fn spawn(
    mut job: PregenJob,
    interval: Duration,
    wake: Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("pregen-{}", job.region()))
        .spawn(move || run(&mut job, interval, &wake))
}

fn run(job: &mut PregenJob, interval: Duration, wake: &Receiver<()>) {
    let ticker = crossbeam_channel::tick(interval);

    loop {
        if job.is_stopped() {
            job.mark_cancelled();
            break;
        }

        match catch_unwind(AssertUnwindSafe(|| job.tick())) {
            Ok(TickOutcome::Continue) => {}
            Ok(TickOutcome::Completed) => {
                job.release();
                break;
            }
            Ok(TickOutcome::Cancelled) => break,
            Err(_) => {
                log::error!(
                    "[PREGEN] Tick for {} panicked at index {}, continuing",
                    job.region(),
                    job.cursor()
                );
            }
        }

        select! {
            recv(wake) -> _ => {}
            recv(ticker) -> _ => {}
        }
    }

    log::debug!("[PREGEN] Tick thread for {} exited", job.region());
}
