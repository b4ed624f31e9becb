//! Calibration handler.

use std::time::{Duration, Instant};

use anyhow::bail;
use meowpad_keyboard::{CalibrationSession, KeyCalibrationState};

use super::{is_running, setup_interrupt_handler, CommandResult, Context};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Learn sensor ranges for `keys` (all keys when empty)
pub async fn calibrate(ctx: &Context, keys: &[usize], timeout_s: u64) -> CommandResult {
    let pad = ctx.connect().await?;
    let keys: Vec<usize> = if keys.is_empty() {
        (0..pad.key_count()).collect()
    } else {
        keys.to_vec()
    };

    let mut session = CalibrationSession::new(pad);
    session.start(&keys).await?;

    println!("Calibrating {} key(s).", keys.len());
    println!("Press each key fully and release it. Ctrl-C to stop.\n");

    let running = setup_interrupt_handler();
    let deadline = Instant::now() + Duration::from_secs(timeout_s);
    let mut last_pending = usize::MAX;
    while !session.is_settled() {
        if !is_running(&running) || Instant::now() >= deadline {
            session.cancel();
            break;
        }
        session.poll().await?;
        let pending = session.pending();
        if pending != last_pending {
            println!("  {} of {} key(s) done", keys.len() - pending, keys.len());
            last_pending = pending;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let failed: Vec<usize> = keys
        .iter()
        .copied()
        .filter(|&k| session.key_state(k) != Some(KeyCalibrationState::Calibrated))
        .collect();
    if !failed.is_empty() {
        bail!("Calibration incomplete for key(s) {failed:?}");
    }
    println!("\nCalibration complete");
    Ok(())
}
