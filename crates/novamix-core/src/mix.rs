//! Mix dial model and the game/chat crossfade.

use serde::{Deserialize, Serialize};

/// Normalized ChatMix dial position.
///
/// `0.0` means the dial is turned fully toward game audio, `1.0` fully
/// toward chat. The value is always clamped to `[0.0, 1.0]` and is never
/// NaN; a NaN input collapses to the centered position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MixState(f32);

impl MixState {
    /// Centered dial - both streams at equal gain.
    pub const CENTER: Self = Self(0.5);

    /// Create a mix state, clamping to `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::CENTER;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// The dial position as a float in `[0.0, 1.0]`.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for MixState {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Gain levels for the two controlled sinks, each in `[0.0, 1.0]`.
///
/// The pair does not need to sum to 1.0; each value is clamped
/// independently to the range PipeWire accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainPair {
    /// Gain for the game sink
    pub game: f32,
    /// Gain for the chat sink
    pub chat: f32,
}

impl GainPair {
    /// Create a gain pair, clamping both values to `[0.0, 1.0]`.
    #[must_use]
    pub fn new(game: f32, chat: f32) -> Self {
        Self { game: game.clamp(0.0, 1.0), chat: chat.clamp(0.0, 1.0) }
    }

    /// Linear crossfade from a dial position.
    ///
    /// `mix = 0.0` yields `(game = 1.0, chat = 0.0)`, `mix = 1.0` the
    /// inverse, with game strictly non-increasing and chat strictly
    /// non-decreasing in between.
    #[must_use]
    pub fn from_mix(mix: MixState) -> Self {
        let m = mix.value();
        Self::new(1.0 - m, m)
    }
}

impl From<MixState> for GainPair {
    fn from(mix: MixState) -> Self {
        Self::from_mix(mix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mix_state_clamps() {
        assert_eq!(MixState::new(-0.5).value(), 0.0);
        assert_eq!(MixState::new(1.5).value(), 1.0);
        assert_eq!(MixState::new(0.25).value(), 0.25);
    }

    #[test]
    fn test_mix_state_nan_collapses_to_center() {
        assert_eq!(MixState::new(f32::NAN), MixState::CENTER);
    }

    #[test]
    fn test_crossfade_endpoints_exact() {
        let full_game = GainPair::from_mix(MixState::new(0.0));
        assert_eq!(full_game, GainPair { game: 1.0, chat: 0.0 });

        let full_chat = GainPair::from_mix(MixState::new(1.0));
        assert_eq!(full_chat, GainPair { game: 0.0, chat: 1.0 });
    }

    #[test]
    fn test_crossfade_center() {
        let center = GainPair::from_mix(MixState::CENTER);
        assert_eq!(center, GainPair { game: 0.5, chat: 0.5 });
    }

    #[test]
    fn test_gain_pair_clamps() {
        let g = GainPair::new(1.7, -0.3);
        assert_eq!(g, GainPair { game: 1.0, chat: 0.0 });
    }

    proptest! {
        #[test]
        fn test_crossfade_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let g_lo = GainPair::from_mix(MixState::new(lo));
            let g_hi = GainPair::from_mix(MixState::new(hi));
            prop_assert!(g_hi.game <= g_lo.game);
            prop_assert!(g_hi.chat >= g_lo.chat);
        }

        #[test]
        fn test_crossfade_gains_in_range(m in proptest::num::f32::ANY) {
            let g = GainPair::from_mix(MixState::new(m));
            prop_assert!((0.0..=1.0).contains(&g.game));
            prop_assert!((0.0..=1.0).contains(&g.chat));
        }
    }
}
