//! # Animation — Keyframe Channels and Looping Playback
//!
//! An [`Animation`] is a bag of [`Channel`]s. Each channel drives one property
//! (translation, rotation, or scale) of one entity from a list of keyframe
//! times (`input`) and values (`output`):
//!
//! ```text
//!   input:   0.0      0.5      1.0      2.0 = max_input
//!   output:  v0       v1       v2       v3
//!                        ▲
//!                  time 0.7 → lerp(v1, v2, 0.4)
//! ```
//!
//! ## Looping
//!
//! Playback time is `now - start_time`, wrapped **per channel** with
//! `time % channel.max_input`. Channels of different length loop on their own
//! period and drift apart over long playback, the way glTF players loop.
//!
//! ## State Machine
//!
//! ```text
//!   Off ──play()──► Playing ──stop()──► Off
//!    ▲                 │
//!    │              reset()
//!    │                 ▼
//!    └─── update ── Resetting   (samples time 0 once)
//! ```
//!
//! ## Interpolation
//!
//! Vectors lerp and rotations slerp. A channel records the authored
//! [`Interpolation`], but sampling is always linear.

use crate::config::KeyframeLookup;
use crate::ecs::{Entity, EntityStore};
use crate::error::ChannelError;
use crate::math::{Quat, TransformMask, Vec3};

/// Playback state of an [`Animation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Off,
    /// Rewind to time 0 on the next update, then stop.
    Resetting,
    Playing,
}

/// Interpolation mode as authored. Recorded only; sampling is linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    CubicSpline,
}

/// A value that can be stored in a [`Channel`].
pub trait Keyframe: Copy {
    /// Blend from `a` to `b` by `t` in `[0, 1]`.
    fn interpolate(a: Self, b: Self, t: f32) -> Self;

    /// `false` for values a channel must not hold.
    fn is_valid(&self) -> bool {
        true
    }
}

impl Keyframe for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Keyframe for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }

    fn is_valid(&self) -> bool {
        self.is_normalized()
    }
}

/// One animated property of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel<T> {
    pub target: Entity,
    pub interpolation: Interpolation,
    input: Vec<f32>,
    output: Vec<T>,
    max_input: f32,
}

impl<T: Keyframe> Channel<T> {
    /// Build a channel, checking that there is at least one keyframe, that
    /// times and values pair up, that times strictly increase, and that every
    /// value is valid (unit quaternions for rotations).
    pub fn new(
        target: Entity,
        interpolation: Interpolation,
        input: Vec<f32>,
        output: Vec<T>,
    ) -> Result<Self, ChannelError> {
        if input.is_empty() {
            return Err(ChannelError::Empty);
        }
        if input.len() != output.len() {
            return Err(ChannelError::LengthMismatch {
                inputs: input.len(),
                outputs: output.len(),
            });
        }
        for (index, time) in input.iter().enumerate() {
            if !time.is_finite() {
                return Err(ChannelError::NonFiniteTime { index });
            }
        }
        for (index, pair) in input.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ChannelError::NotIncreasing {
                    index: index + 1,
                    previous: pair[0],
                    time: pair[1],
                });
            }
        }
        if let Some(index) = output.iter().position(|value| !value.is_valid()) {
            return Err(ChannelError::NonUnitRotation { index });
        }

        let max_input = input[input.len() - 1];
        Ok(Self {
            target,
            interpolation,
            input,
            output,
            max_input,
        })
    }

    pub fn input(&self) -> &[f32] {
        &self.input
    }

    pub fn output(&self) -> &[T] {
        &self.output
    }

    /// Loop period: the time of the last keyframe.
    pub fn max_input(&self) -> f32 {
        self.max_input
    }

    /// Wrap time since start into this channel's period.
    ///
    /// A channel whose last keyframe is at or before zero has no period and
    /// always samples time 0.
    pub fn local_time(&self, elapsed: f32) -> f32 {
        if self.max_input > 0.0 {
            elapsed % self.max_input
        } else {
            0.0
        }
    }

    /// Indices of the keyframes around `time`, for `time` inside
    /// `(input[0], max_input)`.
    fn bracket(&self, time: f32, lookup: KeyframeLookup) -> Option<(usize, usize)> {
        let count = self.input.len();
        match lookup {
            KeyframeLookup::BinarySearch => {
                let next = self.input.partition_point(|&key| key <= time);
                (next < count).then(|| (next - 1, next))
            }
            KeyframeLookup::UniformEstimate => {
                let step = (self.max_input - self.input[0]) / (count - 1) as f32;
                let previous = ((time / step).floor() as usize).min(count - 2);
                Some((previous, previous + 1))
            }
        }
    }

    /// Value at `time` (already wrapped into the channel's period).
    ///
    /// A non-finite `time` samples the first keyframe.
    pub fn sample(&self, time: f32, lookup: KeyframeLookup) -> T {
        let last = self.output.len() - 1;
        if last == 0 || !time.is_finite() || time <= self.input[0] {
            return self.output[0];
        }
        let Some((previous, next)) = self.bracket(time, lookup) else {
            return self.output[last];
        };

        let previous_time = self.input[previous];
        let next_time = self.input[next];
        let t = ((time - previous_time) / (next_time - previous_time)).clamp(0.0, 1.0);
        T::interpolate(self.output[previous], self.output[next], t)
    }
}

/// A named set of channels played together.
#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: Option<String>,
    pub start_time: f32,
    pub state: PlaybackState,
    pub translation_channels: Vec<Channel<Vec3>>,
    pub rotation_channels: Vec<Channel<Quat>>,
    pub scale_channels: Vec<Channel<Vec3>>,
}

impl Animation {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Start playing from `now`.
    pub fn play(&mut self, now: f32) {
        self.start_time = now;
        self.state = PlaybackState::Playing;
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Off;
    }

    /// Rewind to the first frame on the next update, then stop.
    pub fn reset(&mut self) {
        self.state = PlaybackState::Resetting;
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Length of the longest channel.
    pub fn duration(&self) -> f32 {
        let translations = self.translation_channels.iter().map(Channel::max_input);
        let rotations = self.rotation_channels.iter().map(Channel::max_input);
        let scales = self.scale_channels.iter().map(Channel::max_input);
        translations
            .chain(rotations)
            .chain(scales)
            .fold(0.0, f32::max)
    }

    pub fn channel_count(&self) -> usize {
        self.translation_channels.len() + self.rotation_channels.len() + self.scale_channels.len()
    }

    /// Sample every channel at `now` and write the results into the target
    /// transforms. A no-op while off.
    ///
    /// Must run before the transform pass of the same frame.
    pub fn update(&mut self, store: &mut EntityStore, now: f32, lookup: KeyframeLookup) {
        match self.state {
            PlaybackState::Off => return,
            PlaybackState::Resetting => {
                self.state = PlaybackState::Off;
                self.start_time = now;
            }
            PlaybackState::Playing => {}
        }

        let elapsed = now - self.start_time;
        for channel in &self.rotation_channels {
            let value = channel.sample(channel.local_time(elapsed), lookup);
            let transform = store.animated_transform(channel.target);
            transform.rotation = value;
            transform.mask |= TransformMask::ROTATION;
        }
        for channel in &self.translation_channels {
            let value = channel.sample(channel.local_time(elapsed), lookup);
            let transform = store.animated_transform(channel.target);
            transform.translation = value;
            transform.mask |= TransformMask::TRANSLATION;
        }
        for channel in &self.scale_channels {
            let value = channel.sample(channel.local_time(elapsed), lookup);
            let transform = store.animated_transform(channel.target);
            transform.scale = value;
            transform.mask |= TransformMask::SCALE;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Transform;

    const LOOKUPS: [KeyframeLookup; 2] = [
        KeyframeLookup::BinarySearch,
        KeyframeLookup::UniformEstimate,
    ];

    fn target() -> (EntityStore, Entity) {
        let mut store = EntityStore::new();
        let e = store.create_entity();
        store.set_transform(e, Transform::IDENTITY);
        (store, e)
    }

    fn vec3_channel(target: Entity, input: Vec<f32>, xs: &[f32]) -> Channel<Vec3> {
        let output = xs.iter().map(|&x| Vec3::new(x, 0.0, 0.0)).collect();
        Channel::new(target, Interpolation::Linear, input, output).unwrap()
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn loop_wraparound() {
        let (mut store, e) = target();
        let channel = vec3_channel(e, vec![0.0, 1.0, 2.0], &[0.0, 10.0, 30.0]);
        assert_eq!(channel.max_input(), 2.0);

        let mut anim = Animation::new(Some("walk".into()));
        anim.translation_channels.push(channel);
        anim.play(0.0);

        for lookup in LOOKUPS {
            anim.update(&mut store, 2.5, lookup);
            let wrapped = store.transform(e).unwrap().translation;
            anim.update(&mut store, 0.5, lookup);
            let direct = store.transform(e).unwrap().translation;
            assert_eq!(wrapped, direct);
            assert_close(direct.x, 5.0);
        }
    }

    #[test]
    fn slerp_halfway_about_y() {
        let (mut store, e) = target();
        let quarter = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let channel = Channel::new(
            e,
            Interpolation::Linear,
            vec![0.0, 1.0],
            vec![Quat::IDENTITY, quarter],
        )
        .unwrap();
        let mut anim = Animation::new(None);
        anim.rotation_channels.push(channel);
        anim.play(0.0);

        anim.update(&mut store, 0.5, KeyframeLookup::BinarySearch);

        let rotation = store.transform(e).unwrap().rotation;
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(
            rotation.abs_diff_eq(expected, 1e-5),
            "expected {expected:?}, got {rotation:?}"
        );
        let (axis, angle) = rotation.to_axis_angle();
        assert!(axis.abs_diff_eq(Vec3::Y, 1e-4));
        assert_close(angle, std::f32::consts::FRAC_PI_4);
    }

    #[test]
    fn binary_search_handles_uneven_spacing() {
        let (_, e) = target();
        let channel = vec3_channel(e, vec![0.0, 0.1, 2.0], &[0.0, 1.0, 20.0]);

        // 1.05 is halfway between the second and third keyframe.
        let value = channel.sample(1.05, KeyframeLookup::BinarySearch);
        assert_close(value.x, 10.5);
    }

    #[test]
    fn uniform_estimate_matches_search_on_even_spacing() {
        let (_, e) = target();
        let channel = vec3_channel(e, vec![0.0, 0.5, 1.0, 1.5], &[0.0, 2.0, 3.0, 7.0]);
        for time in [0.1, 0.5, 0.74, 1.2, 1.49] {
            let searched = channel.sample(time, KeyframeLookup::BinarySearch);
            let estimated = channel.sample(time, KeyframeLookup::UniformEstimate);
            assert!(searched.abs_diff_eq(estimated, 1e-5), "at {time}");
        }
    }

    #[test]
    fn single_keyframe_holds() {
        let (_, e) = target();
        let channel = vec3_channel(e, vec![0.3], &[4.0]);
        for lookup in LOOKUPS {
            assert_close(channel.sample(0.0, lookup).x, 4.0);
            assert_close(channel.sample(channel.local_time(9.0), lookup).x, 4.0);
        }
    }

    #[test]
    fn non_finite_time_samples_first_keyframe() {
        let (_, e) = target();
        let channel = vec3_channel(e, vec![0.5, 1.0, 2.0], &[1.0, 2.0, 3.0]);
        for lookup in LOOKUPS {
            assert_close(channel.sample(f32::NAN, lookup).x, 1.0);
            assert_close(channel.sample(f32::INFINITY, lookup).x, 1.0);
            assert_close(channel.sample(channel.local_time(f32::INFINITY), lookup).x, 1.0);
        }
    }

    #[test]
    fn before_first_keyframe_clamps() {
        let (_, e) = target();
        let channel = vec3_channel(e, vec![0.5, 1.0], &[1.0, 2.0]);
        assert_close(channel.sample(0.2, KeyframeLookup::BinarySearch).x, 1.0);
    }

    #[test]
    fn zero_period_samples_time_zero() {
        let (_, e) = target();
        let channel = vec3_channel(e, vec![-1.0, 0.0], &[1.0, 2.0]);
        assert_eq!(channel.local_time(5.0), 0.0);
        assert_close(channel.sample(channel.local_time(5.0), KeyframeLookup::BinarySearch).x, 2.0);
    }

    #[test]
    fn off_is_a_no_op() {
        let (mut store, e) = target();
        let mut anim = Animation::new(None);
        anim.translation_channels
            .push(vec3_channel(e, vec![0.0, 1.0], &[5.0, 6.0]));

        anim.update(&mut store, 0.5, KeyframeLookup::BinarySearch);
        assert_eq!(store.transform(e).unwrap().translation, Vec3::ZERO);
    }

    #[test]
    fn reset_samples_first_frame_once_then_stops() {
        let (mut store, e) = target();
        let mut anim = Animation::new(None);
        anim.translation_channels
            .push(vec3_channel(e, vec![0.0, 1.0], &[5.0, 6.0]));
        anim.play(0.0);
        anim.update(&mut store, 0.5, KeyframeLookup::BinarySearch);
        assert_close(store.transform(e).unwrap().translation.x, 5.5);

        anim.reset();
        anim.update(&mut store, 3.75, KeyframeLookup::BinarySearch);
        assert_eq!(anim.state, PlaybackState::Off);
        assert_eq!(anim.start_time, 3.75);
        assert_close(store.transform(e).unwrap().translation.x, 5.0);

        anim.update(&mut store, 4.5, KeyframeLookup::BinarySearch);
        assert_close(store.transform(e).unwrap().translation.x, 5.0);
    }

    #[test]
    fn channels_loop_independently() {
        let (mut store, e) = target();
        let mut anim = Animation::new(None);
        anim.translation_channels
            .push(vec3_channel(e, vec![0.0, 1.0], &[0.0, 1.0]));
        anim.scale_channels
            .push(vec3_channel(e, vec![0.0, 3.0], &[0.0, 3.0]));
        anim.play(0.0);

        anim.update(&mut store, 2.5, KeyframeLookup::BinarySearch);

        let transform = store.transform(e).unwrap();
        assert_close(transform.translation.x, 0.5);
        assert_close(transform.scale.x, 2.5);
        assert!(transform.mask.contains(TransformMask::TRANSLATION | TransformMask::SCALE));
        assert_eq!(anim.duration(), 3.0);
        assert_eq!(anim.channel_count(), 2);
    }

    #[test]
    fn channel_validation() {
        let (_, e) = target();
        assert_eq!(
            Channel::<Vec3>::new(e, Interpolation::Linear, vec![], vec![]).unwrap_err(),
            ChannelError::Empty
        );
        assert!(matches!(
            Channel::new(e, Interpolation::Step, vec![0.0, 1.0], vec![Vec3::ZERO]),
            Err(ChannelError::LengthMismatch { inputs: 2, outputs: 1 })
        ));
        assert!(matches!(
            Channel::new(e, Interpolation::Linear, vec![0.0, 0.0], vec![Vec3::ZERO; 2]),
            Err(ChannelError::NotIncreasing { index: 1, .. })
        ));
        assert!(matches!(
            Channel::new(e, Interpolation::Linear, vec![0.0, f32::NAN], vec![Vec3::ZERO; 2]),
            Err(ChannelError::NonFiniteTime { index: 1 })
        ));
        assert!(matches!(
            Channel::new(
                e,
                Interpolation::Linear,
                vec![0.0, 1.0],
                vec![Quat::IDENTITY, Quat::from_xyzw(0.0, 0.0, 0.0, 2.0)]
            ),
            Err(ChannelError::NonUnitRotation { index: 1 })
        ));
    }
}
