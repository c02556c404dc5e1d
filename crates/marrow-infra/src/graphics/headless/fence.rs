// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use marrow_core::renderer::{FrameFence, RenderError};
use std::sync::Mutex;

/// A fence call, logged in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceEvent {
    /// `wait(slot)` was called.
    Wait(usize),
    /// `signal(slot)` was called.
    Signal(usize),
}

#[derive(Debug, Default)]
struct FenceState {
    pending: Vec<bool>,
    events: Vec<FenceEvent>,
}

/// A frame fence whose GPU completes instantly.
///
/// `wait` clears the slot and returns; it only fails when asked to wait on a
/// slot that was never configured.
#[derive(Debug)]
pub struct HeadlessFence {
    state: Mutex<FenceState>,
}

impl HeadlessFence {
    /// Creates a fence tracking `slots` frame slots.
    pub fn new(slots: usize) -> Self {
        Self {
            state: Mutex::new(FenceState {
                pending: vec![false; slots],
                events: Vec::new(),
            }),
        }
    }

    /// Every call made on the fence so far.
    pub fn events(&self) -> Vec<FenceEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Whether `slot` was signaled and not waited on since.
    pub fn is_pending(&self, slot: usize) -> bool {
        self.state
            .lock()
            .unwrap()
            .pending
            .get(slot)
            .copied()
            .unwrap_or(false)
    }
}

impl FrameFence for HeadlessFence {
    fn wait(&self, slot: usize) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(FenceEvent::Wait(slot));
        let pending = state
            .pending
            .get_mut(slot)
            .ok_or_else(|| RenderError::Internal(format!("fence has no slot {slot}")))?;
        *pending = false;
        Ok(())
    }

    fn signal(&self, slot: usize) {
        let mut state = self.state.lock().unwrap();
        state.events.push(FenceEvent::Signal(slot));
        match state.pending.get_mut(slot) {
            Some(pending) => *pending = true,
            None => log::error!("HeadlessFence: signal on unknown slot {slot}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_clears_signaled_slot() {
        let fence = HeadlessFence::new(2);
        fence.signal(1);
        assert!(fence.is_pending(1));

        fence.wait(1).unwrap();
        assert!(!fence.is_pending(1));
        assert_eq!(
            fence.events(),
            vec![FenceEvent::Signal(1), FenceEvent::Wait(1)]
        );
    }

    #[test]
    fn wait_on_unknown_slot_fails() {
        let fence = HeadlessFence::new(1);
        assert!(matches!(fence.wait(3), Err(RenderError::Internal(_))));
    }
}
