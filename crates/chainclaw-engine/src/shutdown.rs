//! Shutdown driver (spec.md §5 "Cancellation"): runs a fixed sequence of
//! named steps, each under its own deadline, swallowing any individual
//! step's error so one slow/failing step never blocks the rest.
//!
//! Grounded on the teacher's pervasive `tokio::time::timeout(duration,
//! future)` guard around a single operation (e.g.
//! `tandem-channels::dispatcher`'s per-send timeout,
//! `src-tauri/orchestrator/engine.rs`'s per-event timeout), generalized
//! from one guarded call to a short ordered sequence of them.

use std::time::Duration;

use chainclaw_memory::Store;
use chainclaw_server::BackgroundTasks;

/// Deadline applied to every shutdown step. Short because each step is
/// either synchronous (abort) or a single bounded store flush; there is no
/// long-running drain to wait out (spec.md §5: schedulers "stop all timers
/// ... has no persisted in-flight transaction to wait out").
const STEP_DEADLINE: Duration = Duration::from_secs(5);

/// Runs the shutdown sequence once, in order: stop timers, flush the
/// store's write-ahead log, release the process lock. Each step logs and
/// continues past its own failure or timeout rather than aborting the
/// whole sequence, since a stuck step must never prevent the process from
/// exiting.
pub async fn run(background: &BackgroundTasks, store: &Store, lock: Option<crate::process_lock::ProcessLock>) {
    run_step("stop_timers", async {
        background.stop_all();
        Ok(())
    })
    .await;

    run_step("flush_store", async { store.checkpoint().await.map_err(anyhow::Error::from) }).await;

    if let Some(lock) = lock {
        run_step("release_process_lock", async {
            lock.release();
            Ok(())
        })
        .await;
    }
}

async fn run_step<F>(name: &str, future: F)
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(STEP_DEADLINE, future).await {
        Ok(Ok(())) => tracing::info!(step = name, "shutdown step completed"),
        Ok(Err(err)) => tracing::warn!(step = name, error = %err, "shutdown step failed, continuing"),
        Err(_) => tracing::warn!(step = name, deadline_secs = STEP_DEADLINE.as_secs(), "shutdown step timed out, continuing"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_step_that_errors_does_not_panic_the_sequence() {
        run_step("always_fails", async { Err(anyhow::anyhow!("boom")) }).await;
    }

    #[tokio::test]
    async fn a_step_that_hangs_is_cut_off_by_its_deadline() {
        let start = std::time::Instant::now();
        tokio::time::timeout(Duration::from_millis(50), async {
            run_step("hangs", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;
        })
        .await
        .expect_err("inner step should still be asleep past our short outer timeout");
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
