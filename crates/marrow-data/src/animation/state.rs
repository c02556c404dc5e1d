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

use thiserror::Error;

/// Selects a clip of an essence either by name or by position in its clip table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSelector {
    /// Look the clip up by name.
    Name(String),
    /// Use the clip at this index.
    Index(usize),
}

impl From<&str> for ClipSelector {
    fn from(name: &str) -> Self {
        ClipSelector::Name(name.to_owned())
    }
}

impl From<String> for ClipSelector {
    fn from(name: String) -> Self {
        ClipSelector::Name(name)
    }
}

impl From<usize> for ClipSelector {
    fn from(index: usize) -> Self {
        ClipSelector::Index(index)
    }
}

/// A rejected animation request. The playback state is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnimationError {
    /// No clip carries this name.
    #[error("Unknown animation clip '{0}'")]
    UnknownClip(String),
    /// The clip index is past the end of the clip table.
    #[error("Animation clip index {index} out of range ({count} clips)")]
    ClipIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of clips in the essence.
        count: usize,
    },
    /// The cross-fade duration is negative or not a number.
    #[error("Invalid cross-fade duration {0}")]
    InvalidTransition(f32),
    /// The start offset into the clip is not a finite number.
    #[error("Invalid clip start offset {0}")]
    InvalidStartOffset(f32),
}

/// Playback state of one variant: the active clip and an optional outgoing clip
/// being cross-faded out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationState {
    /// Index of the active clip, `None` while the rest pose is shown.
    pub active: Option<usize>,
    /// Play time of the active clip, in the clip's own timeline.
    pub active_time: f32,
    /// Whether the active clip wraps around at its end.
    pub looped: bool,
    /// A non-looping active clip reached its end and no longer mutates nodes.
    pub finished: bool,
    /// Index of the clip being faded out.
    pub outgoing: Option<usize>,
    /// Play time of the outgoing clip.
    pub outgoing_time: f32,
    /// Whether the outgoing clip wraps around at its end.
    pub outgoing_looped: bool,
    /// Seconds left in the cross-fade. Never increases while a fade runs.
    pub remaining_fade: f32,
    /// Total length of the current cross-fade.
    pub total_fade: f32,
    /// Clocks advanced while the variant was hidden; the pose must be resampled
    /// once it becomes visible again.
    pub pose_pending: bool,
}

impl AnimationState {
    /// Switches to clip `index` starting at `start_time`.
    ///
    /// With a positive `transition` and a clip already playing, that clip becomes
    /// the outgoing clip and keeps its play time.
    pub fn transition_to(&mut self, index: usize, start_time: f32, looped: bool, transition: f32) {
        match self.active {
            Some(previous) if transition > 0.0 => {
                self.outgoing = Some(previous);
                self.outgoing_time = self.active_time;
                self.outgoing_looped = self.looped;
                self.remaining_fade = transition;
                self.total_fade = transition;
            }
            _ => self.clear_fade(),
        }
        self.active = Some(index);
        self.active_time = start_time;
        self.looped = looped;
        self.finished = false;
        self.pose_pending = true;
    }

    /// Whether a cross-fade is in progress.
    #[inline]
    pub fn is_fading(&self) -> bool {
        self.outgoing.is_some() && self.remaining_fade > 0.0
    }

    /// Weight of the active pose during a cross-fade: `0` shows the outgoing pose,
    /// `1` the active pose. `None` when no fade is running.
    pub fn blend_fraction(&self) -> Option<f32> {
        if !self.is_fading() || self.total_fade <= 0.0 {
            return None;
        }
        Some(((self.total_fade - self.remaining_fade) / self.total_fade).clamp(0.0, 1.0))
    }

    /// Drops the outgoing clip.
    pub fn clear_fade(&mut self) {
        self.outgoing = None;
        self.outgoing_time = 0.0;
        self.outgoing_looped = false;
        self.remaining_fade = 0.0;
        self.total_fade = 0.0;
    }

    /// Whether playback is over. A state without an active clip counts as finished.
    pub fn is_finished(&self) -> bool {
        self.active.is_none() || self.finished
    }
}
