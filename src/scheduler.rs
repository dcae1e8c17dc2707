//! Timer/scheduler engine.
//!
//! The scheduler notifies a [`SchedulerDelegate`] when schedules fire;
//! the main loop implements the delegate to push events into the queue.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Trigger Sources                          │
//! │                                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐   │
//! │  │  Photo    │  │  Report   │  │ OTA check │  │ Storage  │   │
//! │  │  5 min    │  │  daily    │  │  6 h      │  │  12 h    │   │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬────┘   │
//! │        ▼              ▼              ▼              ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │              SchedulerDelegate                         │  │
//! │  │       (main loop pushes into Event Queue)              │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                    AppService workflows                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Elapsed time is counted in milliseconds of loop ticks, not wall-clock
//! time, so schedules keep running before the clock is synchronized.

use crate::app::ports::{ScheduleFiredKind, SchedulerDelegate};
use log::info;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// A single schedule entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Label passed to the delegate (e.g., "photo").
    pub label: &'static str,
    pub kind: ScheduleKind,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Fire every `interval_secs` seconds.
    Periodic { interval_secs: u32 },
    /// Fire once after `delay_secs`, then auto-disable.
    OneShot { delay_secs: u32 },
}

impl ScheduleKind {
    fn period_ms(self) -> u64 {
        match self {
            Self::Periodic { interval_secs } => u64::from(interval_secs) * 1000,
            Self::OneShot { delay_secs } => u64::from(delay_secs) * 1000,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 6;

/// The scheduler engine.
///
/// Decoupled from the event system: when a schedule fires it invokes the
/// [`SchedulerDelegate`] instead of pushing events itself.
pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
    /// Global enable flag.
    enabled: bool,
}

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// Time accumulated since the last fire.
    elapsed_ms: u64,
    fired: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [const { None }; MAX_SCHEDULES],
            enabled: true,
        }
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            if slot.is_none() {
                info!("Scheduler: added '{}' at slot {}", schedule.label, i);
                *slot = Some(ScheduleEntry {
                    schedule,
                    elapsed_ms: 0,
                    fired: false,
                });
                return Some(i);
            }
        }
        None // All slots full.
    }

    /// Add an enabled periodic schedule.
    pub fn add_periodic(&mut self, label: &'static str, interval_secs: u32) -> Option<usize> {
        self.add(Schedule {
            label,
            kind: ScheduleKind::Periodic { interval_secs },
            enabled: true,
        })
    }

    /// Remove a schedule by slot index.
    pub fn remove(&mut self, slot: usize) {
        if let Some(entry) = self.schedules.get_mut(slot) {
            if let Some(e) = entry.take() {
                info!("Scheduler: removed '{}' from slot {}", e.schedule.label, slot);
            }
        }
    }

    /// Pretend `label` last fired `since_secs` ago.  `None` means it never
    /// ran: the schedule becomes due on the next tick.
    pub fn prime(&mut self, label: &str, since_secs: Option<u64>) {
        for entry in self.schedules.iter_mut().flatten() {
            if entry.schedule.label == label {
                let period = entry.schedule.kind.period_ms();
                entry.elapsed_ms = since_secs.map_or(period, |s| s.saturating_mul(1000).min(period));
                info!(
                    "Scheduler: '{}' primed, {}s until due",
                    label,
                    (period - entry.elapsed_ms) / 1000
                );
            }
        }
    }

    /// Enable or disable the entire scheduler.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Advance every schedule by `tick_ms`.  Call once per loop tick.
    ///
    /// A schedule that is due is reported to the delegate once per tick,
    /// even if several periods elapsed (for example across a long
    /// workflow).
    pub fn tick(&mut self, tick_ms: u32, delegate: &mut dyn SchedulerDelegate) {
        if !self.enabled {
            return;
        }

        for entry in self.schedules.iter_mut().flatten() {
            if !entry.schedule.enabled {
                continue;
            }
            entry.elapsed_ms += u64::from(tick_ms);
            let period = entry.schedule.kind.period_ms();
            if entry.elapsed_ms < period {
                continue;
            }

            match entry.schedule.kind {
                ScheduleKind::Periodic { interval_secs } => {
                    info!(
                        "Scheduler: '{}' periodic fire (every {}s)",
                        entry.schedule.label, interval_secs
                    );
                    delegate.on_schedule_fired(entry.schedule.label, ScheduleFiredKind::Periodic);
                    entry.elapsed_ms = 0;
                }
                ScheduleKind::OneShot { delay_secs } => {
                    if !entry.fired {
                        info!(
                            "Scheduler: '{}' one-shot fired (after {}s)",
                            entry.schedule.label, delay_secs
                        );
                        delegate
                            .on_schedule_fired(entry.schedule.label, ScheduleFiredKind::OneShot);
                        entry.fired = true;
                        entry.schedule.enabled = false; // Auto-disable.
                    }
                }
            }
        }
    }

    /// Number of active (enabled) schedules.
    pub fn active_count(&self) -> usize {
        self.schedules
            .iter()
            .flatten()
            .filter(|e| e.schedule.enabled)
            .count()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
