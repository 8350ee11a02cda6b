//! # Ready Gate
//!
//! The readiness barrier every tracking call passes through.
//!
//! ## Gate Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ready Gate States                                │
//! │                                                                         │
//! │            when_ready(w)                        when_ready(w)           │
//! │          ┌─────────────┐                      ┌─────────────┐           │
//! │          │ pending.push│                      │ dispatch(w) │           │
//! │          ▼             │                      ▼             │           │
//! │  ┌──────────────┐──────┘    mark_ready   ┌──────────────┐───┘           │
//! │  │    CLOSED    │ ─────────────────────► │     OPEN     │               │
//! │  │ ready=false  │   flip ready, hand     │  ready=true  │               │
//! │  │              │   back the FIFO wave   │              │               │
//! │  └──────────────┘ ◄───────────────────── └──────────────┘               │
//! │                         close()                                        │
//! │                  (session re-establishment)                            │
//! │                                                                         │
//! │  Work dispatched before close() is not disturbed; only work scheduled  │
//! │  after close() waits for the next wave.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The gate is a plain data structure. It is owned by a single actor, which
//! is the only place work is ever run, so no locking is involved. Dispatched
//! work goes to the actor's run queue; the gate only decides *when*.

use std::collections::VecDeque;

/// Single-flight readiness barrier with a FIFO of deferred work.
#[derive(Debug)]
pub struct ReadyGate<T> {
    ready: bool,
    pending: VecDeque<T>,
}

impl<T> Default for ReadyGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReadyGate<T> {
    /// Creates a closed gate with no pending work.
    pub fn new() -> Self {
        ReadyGate {
            ready: false,
            pending: VecDeque::new(),
        }
    }

    /// Returns true if work is currently dispatched without waiting.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of deferred items waiting for the next wave.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Offers work to the gate.
    ///
    /// Returns `Some(work)` when the gate is open and the caller should run it
    /// now; otherwise the work is queued and `None` is returned.
    pub fn when_ready(&mut self, work: T) -> Option<T> {
        if self.ready {
            Some(work)
        } else {
            self.pending.push_back(work);
            None
        }
    }

    /// Closes the gate. Pending work stays queued.
    pub fn close(&mut self) {
        self.ready = false;
    }

    /// Opens the gate and hands back the current wave in FIFO order.
    ///
    /// The caller dispatches the returned items before anything offered
    /// afterwards; since the gate is open by then, work scheduled while the
    /// wave runs is dispatched behind it, in the same pass.
    pub fn mark_ready(&mut self) -> VecDeque<T> {
        self.ready = true;
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_gate_is_closed() {
        let mut gate = ReadyGate::new();
        assert!(!gate.is_ready());
        assert_eq!(gate.when_ready(1), None);
        assert_eq!(gate.pending_len(), 1);
    }

    #[test]
    fn test_pending_work_fires_in_registration_order() {
        let mut gate = ReadyGate::new();
        for i in 0..5 {
            assert!(gate.when_ready(i).is_none());
        }

        let wave: Vec<i32> = gate.mark_ready().into_iter().collect();

        assert_eq!(wave, vec![0, 1, 2, 3, 4]);
        assert!(gate.is_ready());
        assert_eq!(gate.pending_len(), 0);
    }

    #[test]
    fn test_wave_fires_exactly_once() {
        let mut gate = ReadyGate::new();
        gate.when_ready("a");
        assert_eq!(gate.mark_ready().len(), 1);
        assert!(gate.mark_ready().is_empty());
    }

    #[test]
    fn test_work_after_readiness_runs_immediately() {
        let mut gate = ReadyGate::new();
        gate.mark_ready();
        assert_eq!(gate.when_ready(7), Some(7));
        assert_eq!(gate.pending_len(), 0);
    }

    #[test]
    fn test_close_keeps_pending_and_defers_new_work() {
        let mut gate = ReadyGate::new();
        gate.mark_ready();
        gate.close();

        assert!(gate.when_ready(3).is_none());
        assert_eq!(gate.pending_len(), 1);
        assert!(!gate.is_ready());

        let wave: Vec<i32> = gate.mark_ready().into_iter().collect();
        assert_eq!(wave, vec![3]);
    }
}
