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

//! Per-resource counter propagating one CPU change into every frame-in-flight copy.

/// Tracks how many frame slots still hold a stale copy of a CPU-side value.
///
/// [`mark`](Self::mark) resets the counter to the frame-in-flight count whenever the
/// source changes; every frame that re-uploads calls [`consume`](Self::consume).
/// Once it reaches zero every slot holds the latest value and uploads stop until the
/// next change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyCounter {
    remaining: usize,
    frames_in_flight: usize,
}

impl DirtyCounter {
    /// Creates a counter that starts dirty, so every slot receives the initial value.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            remaining: frames_in_flight,
            frames_in_flight,
        }
    }

    /// Creates a counter with nothing pending.
    pub fn clean(frames_in_flight: usize) -> Self {
        Self {
            remaining: 0,
            frames_in_flight,
        }
    }

    /// Records a change of the source value.
    #[inline]
    pub fn mark(&mut self) {
        self.remaining = self.frames_in_flight;
    }

    /// Returns `true` if the current frame slot must be re-uploaded, and counts that
    /// upload.
    #[inline]
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Whether some frame slot still holds a stale copy.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.remaining > 0
    }

    /// The number of uploads still pending.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_change_yields_exactly_n_uploads() {
        let mut counter = DirtyCounter::clean(3);
        counter.mark();
        let uploads = (0..10).filter(|_| counter.consume()).count();
        assert_eq!(uploads, 3);
        assert!(!counter.is_dirty());
    }

    #[test]
    fn mark_during_propagation_restarts_the_count() {
        let mut counter = DirtyCounter::clean(2);
        counter.mark();
        assert!(counter.consume());
        counter.mark();
        assert_eq!(counter.remaining(), 2);
        assert!(counter.consume());
        assert!(counter.consume());
        assert!(!counter.consume());
    }

    #[test]
    fn new_counter_starts_dirty() {
        let mut counter = DirtyCounter::new(2);
        assert!(counter.is_dirty());
        assert!(counter.consume());
        assert!(counter.consume());
        assert!(!counter.is_dirty());
    }
}
