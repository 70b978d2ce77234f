//! Resource budgets and cooperative cancellation.
//!
//! Provers never block and never get killed from outside: they call
//! [`Budget::tick`] on every inference step, and the budget answers once
//! every [`CHECK_GRANULARITY`] steps with the exhausted dimension, if any.
//! Cancellation is a shared flag checked at the same points.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::proof::ResourceDimension;

/// How many inference steps between deadline/cancellation checks.
pub const CHECK_GRANULARITY: u32 = 1024;

/// Hard limits for one prover invocation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceLimits {
    /// Wall-clock budget in milliseconds.
    pub time_ms: u64,
    /// Maximum search depth.
    pub depth: u32,
    /// Maximum nodes (clauses, worlds, arguments) created.
    pub nodes: u64,
    /// Soft memory bound in bytes. Checked against tracked allocations
    /// only; provers that do not track memory never trip it.
    pub memory: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            time_ms: 5_000,
            depth: 256,
            nodes: 100_000,
            memory: 256 * 1024 * 1024,
        }
    }
}

/// A cooperative cancellation flag shared with the coordinator.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tracks consumption against a [`ResourceLimits`] during one invocation.
pub struct Budget {
    limits: ResourceLimits,
    started: Instant,
    steps: u64,
    since_check: u32,
    nodes: u64,
    memory: u64,
    cancel: CancelFlag,
}

impl Budget {
    pub fn new(limits: ResourceLimits) -> Self {
        Budget {
            limits,
            started: Instant::now(),
            steps: 0,
            since_check: 0,
            nodes: 0,
            memory: 0,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(limits: ResourceLimits, cancel: CancelFlag) -> Self {
        Budget { cancel, ..Budget::new(limits) }
    }

    /// Counts one inference step. Every [`CHECK_GRANULARITY`] steps the
    /// deadline and the cancellation flag are consulted; an exhausted
    /// dimension is reported, at which point the prover must wind down.
    pub fn tick(&mut self) -> Option<ResourceDimension> {
        self.steps += 1;
        self.since_check += 1;
        if self.since_check < CHECK_GRANULARITY {
            return None;
        }
        self.since_check = 0;
        self.check_deadline()
    }

    /// An immediate deadline/cancellation check, for suspension points
    /// (theory-bridge delegation, worker joins).
    pub fn check_deadline(&self) -> Option<ResourceDimension> {
        if self.cancel.is_cancelled() {
            return Some(ResourceDimension::Time);
        }
        if self.elapsed_ms() >= self.limits.time_ms {
            return Some(ResourceDimension::Time);
        }
        None
    }

    /// Charges `n` created nodes against the budget.
    pub fn charge_nodes(&mut self, n: u64) -> Option<ResourceDimension> {
        self.nodes += n;
        if self.nodes > self.limits.nodes {
            Some(ResourceDimension::Nodes)
        } else {
            None
        }
    }

    /// Charges tracked memory (approximate, in bytes).
    pub fn charge_memory(&mut self, bytes: u64) -> Option<ResourceDimension> {
        self.memory += bytes;
        if self.memory > self.limits.memory {
            Some(ResourceDimension::Memory)
        } else {
            None
        }
    }

    /// Checks a search depth against the depth limit.
    pub fn check_depth(&self, depth: u32) -> Option<ResourceDimension> {
        if depth > self.limits.depth {
            Some(ResourceDimension::Depth)
        } else {
            None
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    /// Remaining wall-clock budget, for fallback decisions.
    pub fn remaining_ms(&self) -> u64 {
        self.limits.time_ms.saturating_sub(self.elapsed_ms())
    }
}
