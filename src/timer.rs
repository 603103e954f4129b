//! Cyclic timer driver (spec §4.B).
//!
//! Grounded on the pack's background-announcer-thread idiom (the `hdds`
//! crate's SPDP announcer: an `Arc<AtomicBool>` shutdown flag plus a
//! `JoinHandle` running a sleep loop) since the teacher crate itself has no
//! timer/thread subsystem to generalize from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};

/// Whether the host scheduler can guarantee firing at exactly the
/// compensated delay, or only on a best-effort basis (spec §4.B).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HostTimingClass {
    HardRealTime,
    BestEffort,
}

/// Compute the compensated delay for a host whose tick is
/// `stack_cycle_time_us`, per spec §4.B.
///
/// `n = 1` if `wanted_delay_us <= 1.5 * stack_cycle_time_us`, otherwise
/// `n = round(wanted_delay_us / stack_cycle_time_us)` via the
/// `(wanted + tick/2) / tick` integer-division formulation. A hard-real-time
/// host returns `n * tick`; a best-effort host returns `n * tick - tick/2`
/// to fire half a tick early.
pub fn compensate(
    wanted_delay_us: u64,
    stack_cycle_time_us: u64,
    timing_class: HostTimingClass,
) -> u64 {
    debug_assert!(stack_cycle_time_us > 0);
    let n = if wanted_delay_us <= stack_cycle_time_us + stack_cycle_time_us / 2 {
        1
    } else {
        (wanted_delay_us + stack_cycle_time_us / 2) / stack_cycle_time_us
    };
    debug_assert!(n >= 1 && n < (1u64 << 31));
    match timing_class {
        HostTimingClass::HardRealTime => n * stack_cycle_time_us,
        HostTimingClass::BestEffort => n * stack_cycle_time_us - stack_cycle_time_us / 2,
    }
}

/// What a callback should do on its next return: whether the driver should
/// keep re-arming it (the default, non-`one_shot` case) or stop.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerAction {
    Continue,
    Stop,
}

type Callback = Box<dyn FnMut() -> TimerAction + Send + 'static>;

/// A periodic (or one-shot) callback driver (spec §4.B).
///
/// `create` does not start the thread; `start` spawns it. `stop` signals
/// the background thread to exit and joins it; `destroy` is `stop` followed
/// by dropping the handle (modeled here simply as consuming `self`).
pub struct CyclicTimer {
    interval_us: u64,
    one_shot: bool,
    callback: Arc<Mutex<Callback>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CyclicTimer {
    /// Create a timer with the given period and callback. `one_shot`
    /// callbacks must call [`CyclicTimer::start`] again themselves to
    /// continue firing; non-`one_shot` timers re-arm automatically.
    pub fn create<F>(interval_us: u64, callback: F, one_shot: bool) -> Result<CyclicTimer>
    where
        F: FnMut() -> TimerAction + Send + 'static,
    {
        if interval_us == 0 {
            return Err(Error::TimerCreateFailed);
        }
        Ok(CyclicTimer {
            interval_us,
            one_shot,
            callback: Arc::new(Mutex::new(Box::new(callback))),
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn (or re-spawn, for `one_shot` timers) the background thread.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        self.shutdown.store(false, Ordering::Relaxed);
        let interval = Duration::from_micros(self.interval_us);
        let one_shot = self.one_shot;
        let callback = Arc::clone(&self.callback);
        let shutdown = Arc::clone(&self.shutdown);
        self.handle = Some(
            thread::Builder::new()
                .name("pn-cyclic-timer".into())
                .spawn(move || loop {
                    thread::sleep(interval);
                    if shutdown.load(Ordering::Relaxed) {
                        return;
                    }
                    let action = {
                        let mut cb = callback.lock().expect("cyclic timer callback poisoned");
                        cb()
                    };
                    if one_shot || action == TimerAction::Stop {
                        return;
                    }
                })
                .map_err(|_| Error::TimerCreateFailed)?,
        );
        Ok(())
    }

    /// Signal the background thread to stop and wait for it to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Stop the timer and consume it.
    pub fn destroy(mut self) {
        self.stop();
    }
}

impl Drop for CyclicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensated_delay_on_a_1000us_best_effort_tick() {
        assert_eq!(compensate(1200, 1000, HostTimingClass::BestEffort), 500);
        assert_eq!(compensate(2000, 1000, HostTimingClass::BestEffort), 1500);
        assert_eq!(compensate(800, 1000, HostTimingClass::BestEffort), 500);
    }

    #[test]
    fn compensated_delay_on_hard_real_time_host() {
        assert_eq!(compensate(1200, 1000, HostTimingClass::HardRealTime), 1000);
        assert_eq!(compensate(2000, 1000, HostTimingClass::HardRealTime), 2000);
    }

    #[test]
    fn timer_fires_repeatedly_until_stopped() {
        use std::sync::atomic::AtomicU32;
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let mut timer = CyclicTimer::create(
            2_000,
            move || {
                count2.fetch_add(1, Ordering::SeqCst);
                TimerAction::Continue
            },
            false,
        )
        .unwrap();
        timer.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        timer.stop();
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn one_shot_timer_does_not_rearm_itself() {
        use std::sync::atomic::AtomicU32;
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let mut timer = CyclicTimer::create(
            1_000,
            move || {
                count2.fetch_add(1, Ordering::SeqCst);
                TimerAction::Continue
            },
            true,
        )
        .unwrap();
        timer.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
