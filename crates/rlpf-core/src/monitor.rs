// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Reward Monitor (Training Health Gate)
// ─────────────────────────────────────────────────────────────────────
//! Watches per-step mean rewards during training and halts when the
//! policy starts drifting away from the knowledge graph.
//!
//! Three independent triggers, any of which halts:
//! - **hard floor**: a single step reward below `hard_floor`;
//! - **window average**: mean of the last `monitor_window` steps below
//!   `window_floor` (checked once the window is full);
//! - **downward trend**: reward dropped by more than `trend_threshold`
//!   across the last `trend_window` steps.
//!
//! A halt is sticky: later steps are refused until `reactivate()`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use rlpf_types::{MonitorSession, RlpfConfig, StepEvent};

const INACTIVE_REASON: &str = "monitor_inactive";

#[derive(Default)]
struct MonitorState {
    session: MonitorSession,
    window: VecDeque<f64>,
    trend: VecDeque<f64>,
}

impl MonitorState {
    fn window_avg(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    fn record_halt(&mut self, index: u32, reason: String) {
        self.session.halted = true;
        self.session.halt_index = index as i64;
        self.session.halt_reason = reason;
    }
}

pub struct RewardMonitor {
    config: RlpfConfig,
    is_active: AtomicBool,
    state: Mutex<MonitorState>,
}

impl RewardMonitor {
    pub fn new(config: RlpfConfig) -> Self {
        Self {
            config,
            is_active: AtomicBool::new(true),
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Record one training step's reward and run the halt checks.
    pub fn observe(&self, reward: f64) -> StepEvent {
        let mut state = self.state.lock();
        let index = state.session.step_count() as u32;

        if !self.is_active.load(Ordering::SeqCst) {
            if !state.session.halted {
                state.record_halt(index, INACTIVE_REASON.to_string());
            }
            return StepEvent {
                index,
                reward,
                window_avg: state.window_avg(),
                halted: true,
                halt_reason: Some(INACTIVE_REASON.to_string()),
            };
        }

        let reward = if reward.is_finite() {
            reward
        } else {
            log::warn!("Non-finite step reward, treating as {}", -self.config.reward_clip);
            -self.config.reward_clip
        };

        state.window.push_back(reward);
        if state.window.len() > self.config.monitor_window {
            state.window.pop_front();
        }
        state.trend.push_back(reward);
        if state.trend.len() > self.config.trend_window {
            state.trend.pop_front();
        }

        let window_avg = state.window_avg();
        let mut halt_reason = None;

        // Check 1: Hard floor
        if reward < self.config.hard_floor {
            halt_reason = Some(format!(
                "hard_floor ({reward:.4} < {})",
                self.config.hard_floor
            ));
        }

        // Check 2: Sliding window average
        if halt_reason.is_none()
            && state.window.len() >= self.config.monitor_window
            && window_avg < self.config.window_floor
        {
            halt_reason = Some(format!(
                "window_avg ({window_avg:.4} < {})",
                self.config.window_floor
            ));
        }

        // Check 3: Downward trend
        if halt_reason.is_none() && state.trend.len() >= self.config.trend_window {
            let first = state.trend.front().copied().unwrap_or(reward);
            let drop = first - reward;
            if drop > self.config.trend_threshold {
                halt_reason = Some(format!(
                    "downward_trend ({drop:.4} > {})",
                    self.config.trend_threshold
                ));
            }
        }

        if let Some(reason) = &halt_reason {
            log::error!(">>> REWARD MONITOR HALT at step {index}: {reason} <<<");
            self.is_active.store(false, Ordering::SeqCst);
            state.record_halt(index, reason.clone());
        }

        let event = StepEvent {
            index,
            reward,
            window_avg,
            halted: halt_reason.is_some(),
            halt_reason,
        };
        state.session.record(event.clone(), self.config.history_cap);
        event
    }

    /// Snapshot of the monitoring trace (recent history plus run totals).
    pub fn session(&self) -> MonitorSession {
        self.state.lock().session.clone()
    }

    pub fn halted(&self) -> bool {
        self.state.lock().session.halted
    }

    pub fn halt_index(&self) -> i64 {
        self.state.lock().session.halt_index
    }

    pub fn halt_reason(&self) -> String {
        self.state.lock().session.halt_reason.clone()
    }

    pub fn step_count(&self) -> usize {
        self.state.lock().session.step_count()
    }

    pub fn avg_reward(&self) -> f64 {
        self.state.lock().session.avg_reward()
    }

    pub fn min_reward(&self) -> Option<f64> {
        self.state.lock().session.min_reward()
    }

    /// Most recent step rewards, oldest first.
    pub fn reward_history(&self) -> Vec<f64> {
        self.state.lock().session.reward_history.iter().copied().collect()
    }

    /// Halt training from outside (operator stop).
    pub fn halt(&self, reason: &str) {
        log::error!(">>> REWARD MONITOR HALTED: {reason} <<<");
        self.is_active.store(false, Ordering::SeqCst);
        let mut state = self.state.lock();
        let index = state.session.step_count() as u32;
        state.record_halt(index, reason.to_string());
    }

    /// Re-enable after a halt. History is kept; the windows start fresh.
    pub fn reactivate(&self) {
        let mut state = self.state.lock();
        state.session.halted = false;
        state.session.halt_index = -1;
        state.session.halt_reason.clear();
        state.window.clear();
        state.trend.clear();
        self.is_active.store(true, Ordering::SeqCst);
        log::info!("Reward monitor reactivated");
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &RlpfConfig {
        &self.config
    }
}
