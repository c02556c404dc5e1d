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

use super::transform_propagation::{mark_all_dirty, mark_local_dirty};
use marrow_data::animation::{AnimationClip, AnimationState, Track};
use marrow_data::essence::Essence;
use marrow_data::node::{Node, Trs};

/// Which pose of a node a clip is sampled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseSlot {
    /// The active clip's pose.
    Current,
    /// The outgoing clip's pose during a cross-fade.
    Previous,
}

impl PoseSlot {
    fn of(self, node: &mut Node) -> &mut Trs {
        match self {
            PoseSlot::Current => &mut node.current,
            PoseSlot::Previous => &mut node.previous,
        }
    }
}

/// Advances a clip clock by `dt`.
///
/// Looping clips wrap back into the clip by whole durations; other clips clamp at
/// their end. A non-finite `dt` leaves the clock where it is. Returns `true` when
/// a non-looping clip reached its end.
pub fn advance_clock(time: &mut f32, dt: f32, clip: &AnimationClip, looped: bool) -> bool {
    if dt.is_finite() {
        *time += dt;
    }
    if !(*time > clip.end) {
        return false;
    }
    let duration = clip.duration();
    if looped && duration > 0.0 {
        let laps = ((*time - clip.end) / duration).ceil();
        *time -= duration * laps;
        // f32 rounding on long frames can land a hair outside the clip.
        *time = time.clamp(clip.start, clip.end);
        false
    } else {
        *time = clip.end;
        true
    }
}

/// Samples every channel of `clip` at `time` into the `slot` pose of the targeted
/// nodes and marks them dirty.
///
/// Channels with fewer than two keyframes, or whose keyframes do not cover `time`,
/// leave the node untouched.
pub fn sample_clip(
    clip: &AnimationClip,
    time: f32,
    nodes: &mut [Node],
    parents: &[Option<usize>],
    slot: PoseSlot,
) {
    for channel in &clip.channels {
        let written = {
            let pose = slot.of(&mut nodes[channel.node]);
            match &channel.track {
                Track::Translation(k) => k.bracket(time).map(|(i, f)| {
                    pose.translation = k.values[i].lerp(k.values[i + 1], f);
                }),
                Track::Rotation(k) => k.bracket(time).map(|(i, f)| {
                    pose.rotation = k.values[i].slerp(k.values[i + 1], f);
                }),
                Track::Scale(k) => k.bracket(time).map(|(i, f)| {
                    pose.scale = k.values[i].lerp(k.values[i + 1], f);
                }),
            }
        };
        if written.is_some() {
            mark_local_dirty(nodes, parents, channel.node);
        }
    }
}

/// What one blending step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlendOutcome {
    /// At least one clip was sampled into the nodes.
    pub sampled: bool,
    /// The active clip reached its end during this step.
    pub finished: bool,
    /// The cross-fade completed during this step.
    pub fade_completed: bool,
}

/// Advances the clocks of `state` by `dt` and, when `visible`, samples the active
/// clip (and the outgoing clip during a cross-fade) into the nodes.
///
/// A hidden variant only advances its clocks, including the cross-fade timer; its
/// pose is resampled on the first visible step. A finished non-looping clip is
/// sampled once at its end and then stops mutating the nodes.
pub fn blend_animation(
    essence: &Essence,
    state: &mut AnimationState,
    nodes: &mut [Node],
    dt: f32,
    visible: bool,
) -> BlendOutcome {
    let mut outcome = BlendOutcome::default();
    let parents = essence.parents();

    if let Some(clip) = state.active.and_then(|i| essence.clip(i)) {
        let mut resample = state.pose_pending;
        if !state.finished {
            outcome.finished = advance_clock(&mut state.active_time, dt, clip, state.looped);
            state.finished = outcome.finished;
            resample = true;
        }
        if resample {
            if visible {
                sample_clip(clip, state.active_time, nodes, parents, PoseSlot::Current);
                outcome.sampled = true;
                state.pose_pending = false;
            } else {
                state.pose_pending = true;
            }
        }
    }

    if state.is_fading() {
        if let Some(clip) = state.outgoing.and_then(|i| essence.clip(i)) {
            advance_clock(&mut state.outgoing_time, dt, clip, state.outgoing_looped);
            if visible {
                sample_clip(clip, state.outgoing_time, nodes, parents, PoseSlot::Previous);
                outcome.sampled = true;
            }
        }
        state.remaining_fade = (state.remaining_fade - dt).max(0.0);
        if state.remaining_fade <= 0.0 {
            state.clear_fade();
            outcome.fade_completed = true;
        }
        // The blend weight moved, so every local transform is stale.
        if visible || outcome.fade_completed {
            mark_all_dirty(nodes);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_core::math::{Quat, Vec3};
    use marrow_data::animation::{Channel, Keyframes};

    fn slide(duration: f32) -> AnimationClip {
        AnimationClip::new(
            "slide",
            vec![Channel {
                node: 0,
                track: Track::Translation(Keyframes::new(
                    vec![0.0, duration],
                    vec![Vec3::ZERO, Vec3::new(duration, 0.0, 0.0)],
                )),
            }],
        )
    }

    #[test]
    fn looping_clock_wraps_by_subtracting_duration() {
        let clip = slide(2.0);
        let mut time = 1.5;
        assert!(!advance_clock(&mut time, 4.75, &clip, true));
        assert_eq!(time, 0.25);
    }

    #[test]
    fn huge_step_on_a_short_loop_lands_inside_the_clip() {
        let clip = slide(0.01);
        let mut time = 0.0;

        assert!(!advance_clock(&mut time, 1.0e6, &clip, true));

        assert!((clip.start..=clip.end).contains(&time));
    }

    #[test]
    fn non_finite_step_keeps_the_clock() {
        let clip = slide(1.0);
        let mut time = 0.4;

        assert!(!advance_clock(&mut time, f32::NAN, &clip, true));
        assert!(!advance_clock(&mut time, f32::INFINITY, &clip, false));

        assert_eq!(time, 0.4);
    }

    #[test]
    fn non_looping_clock_clamps_and_reports_end() {
        let clip = slide(1.0);
        let mut time = 0.5;
        assert!(!advance_clock(&mut time, 0.25, &clip, false));
        assert!(advance_clock(&mut time, 1.0, &clip, false));
        assert_eq!(time, 1.0);
    }

    #[test]
    fn sampling_writes_only_the_requested_slot() {
        let clip = slide(1.0);
        let mut nodes = vec![Node::new(Trs::IDENTITY)];
        nodes[0].local_dirty = false;

        sample_clip(&clip, 0.5, &mut nodes, &[None], PoseSlot::Previous);

        assert_eq!(nodes[0].previous.translation, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(nodes[0].current.translation, Vec3::ZERO);
        assert!(nodes[0].local_dirty);
    }

    #[test]
    fn single_keyframe_channel_holds_last_value() {
        let clip = AnimationClip::new(
            "pose",
            vec![Channel {
                node: 0,
                track: Track::Rotation(Keyframes::new(
                    vec![0.0],
                    vec![Quat::from_rotation_x(1.0)],
                )),
            }],
        );
        let mut nodes = vec![Node::new(Trs::IDENTITY)];
        nodes[0].local_dirty = false;

        sample_clip(&clip, 0.0, &mut nodes, &[None], PoseSlot::Current);

        assert_eq!(nodes[0].current.rotation, Quat::IDENTITY);
        assert!(!nodes[0].local_dirty);
    }
}
