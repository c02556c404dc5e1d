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

use marrow_core::math::{Quat, Vec3};

/// Keyframe times (seconds, non-decreasing) and the value at each time.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframes<T> {
    /// Keyframe times in seconds.
    pub times: Vec<f32>,
    /// One value per keyframe time.
    pub values: Vec<T>,
}

impl<T> Keyframes<T> {
    /// Creates a keyframe list.
    pub fn new(times: Vec<f32>, values: Vec<T>) -> Self {
        Self { times, values }
    }

    /// Number of keyframes.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether there are no keyframes.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Finds the keyframe pair bracketing `time` by a linear scan.
    ///
    /// Returns the index of the first keyframe of the pair and the interpolation
    /// fraction in `[0, 1]`, or `None` when fewer than two keyframes exist or `time`
    /// lies outside the keyframe range.
    pub fn bracket(&self, time: f32) -> Option<(usize, f32)> {
        if self.times.len() < 2 {
            return None;
        }
        for i in 0..self.times.len() - 1 {
            let prev = self.times[i];
            let next = self.times[i + 1];
            if time >= prev && time <= next {
                let span = next - prev;
                let fraction = if span > 0.0 {
                    (time - prev) / span
                } else {
                    0.0
                };
                return Some((i, fraction));
            }
        }
        None
    }
}

/// The animated property of a channel together with its keyframes.
#[derive(Debug, Clone, PartialEq)]
pub enum Track {
    /// Node translation keyframes.
    Translation(Keyframes<Vec3>),
    /// Node rotation keyframes.
    Rotation(Keyframes<Quat>),
    /// Node scale keyframes.
    Scale(Keyframes<Vec3>),
}

impl Track {
    /// The keyframe times of this track.
    pub fn times(&self) -> &[f32] {
        match self {
            Track::Translation(k) | Track::Scale(k) => &k.times,
            Track::Rotation(k) => &k.times,
        }
    }

    /// The number of keyframe values of this track.
    pub fn value_count(&self) -> usize {
        match self {
            Track::Translation(k) | Track::Scale(k) => k.values.len(),
            Track::Rotation(k) => k.values.len(),
        }
    }
}

/// Animates one property of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Index of the target node.
    pub node: usize,
    /// The animated property and its keyframes.
    pub track: Track,
}

/// A named animation made of channels sharing one timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    /// The clip name, used for lookups. May be empty.
    pub name: String,
    /// The animated channels.
    pub channels: Vec<Channel>,
    /// Earliest keyframe time over all channels.
    pub start: f32,
    /// Latest keyframe time over all channels.
    pub end: f32,
}

impl AnimationClip {
    /// Creates a clip and derives its time range from the channels' keyframes.
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let mut start = f32::MAX;
        let mut end = f32::MIN;
        for channel in &channels {
            let times = channel.track.times();
            if let (Some(first), Some(last)) = (times.first(), times.last()) {
                start = start.min(*first);
                end = end.max(*last);
            }
        }
        if start > end {
            start = 0.0;
            end = 0.0;
        }
        Self {
            name: name.into(),
            channels,
            start,
            end,
        }
    }

    /// Length of the clip in seconds.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Keyframes<Vec3> {
        Keyframes::new(
            vec![0.0, 1.0, 3.0],
            vec![Vec3::ZERO, Vec3::X, Vec3::new(3.0, 0.0, 0.0)],
        )
    }

    #[test]
    fn bracket_finds_pair_and_fraction() {
        let k = ramp();
        assert_eq!(k.bracket(0.5), Some((0, 0.5)));
        assert_eq!(k.bracket(2.0), Some((1, 0.5)));
        assert_eq!(k.bracket(3.0), Some((1, 1.0)));
        assert_eq!(k.bracket(4.0), None);
    }

    #[test]
    fn single_keyframe_has_no_bracket() {
        let k = Keyframes::new(vec![0.0], vec![Vec3::ONE]);
        assert_eq!(k.bracket(0.0), None);
    }

    #[test]
    fn clip_range_spans_all_channels() {
        let clip = AnimationClip::new(
            "walk",
            vec![
                Channel {
                    node: 0,
                    track: Track::Translation(ramp()),
                },
                Channel {
                    node: 1,
                    track: Track::Rotation(Keyframes::new(
                        vec![0.5, 4.0],
                        vec![Quat::IDENTITY, Quat::IDENTITY],
                    )),
                },
            ],
        );
        assert_eq!(clip.start, 0.0);
        assert_eq!(clip.end, 4.0);
        assert_eq!(clip.duration(), 4.0);
    }

    #[test]
    fn empty_clip_has_zero_duration() {
        let clip = AnimationClip::new("idle", Vec::new());
        assert_eq!(clip.duration(), 0.0);
    }
}
