//! Base-station input report decoding.
//!
//! The Arctis Nova base station sends 64-byte vendor reports on its control
//! interface. Byte 0 selects the message kind; only ChatMix messages carry
//! dial data. Decoding is pure - the same raw bytes always produce the same
//! report, and a bad report never touches any state.

use thiserror::Error;

use crate::mix::MixState;

/// Fixed size of a base-station input report (`wMaxPacketSize`).
pub const REPORT_LEN: usize = 64;

/// Native range of the dial level bytes.
pub const DIAL_RANGE: u8 = 100;

/// ChatMix dial position, two complementary 0-100 level bytes.
pub const OPCODE_CHATMIX: u8 = 0x45;
/// Master volume, one attenuation byte.
pub const OPCODE_VOLUME: u8 = 0x25;
/// EQ band level.
pub const OPCODE_EQ_BAND: u8 = 0x31;
/// Active EQ preset.
pub const OPCODE_EQ_PRESET: u8 = 0x2E;
/// Headset power event (Nova 5X).
pub const OPCODE_POWER: u8 = 0xB9;

/// Decoding failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed report: expected {REPORT_LEN} bytes, got {0}")]
    MalformedReport(usize),
}

/// Headset power event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    On,
    Unknown(u8),
}

/// A decoded base-station message.
///
/// The control loop only acts on [`Report::ChatMix`] and [`Report::Power`];
/// the remaining variants exist so that known traffic is named in trace
/// logs instead of showing up as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Report {
    /// Dial moved; carries the normalized position.
    ChatMix(MixState),
    /// Master volume changed; value is the attenuation step.
    Volume(u8),
    /// An EQ band was adjusted.
    EqBand { band: u8, value: u8 },
    /// The EQ preset changed.
    EqPreset(u8),
    /// The headset powered on or off.
    Power(PowerState),
    /// Any other opcode.
    Unknown(u8),
}

impl Report {
    /// Decode one raw input report.
    ///
    /// # Errors
    /// Returns [`DecodeError::MalformedReport`] when the buffer is not
    /// exactly [`REPORT_LEN`] bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() != REPORT_LEN {
            return Err(DecodeError::MalformedReport(raw.len()));
        }

        Ok(match raw[0] {
            OPCODE_CHATMIX => Self::ChatMix(decode_dial(raw[1], raw[2])),
            OPCODE_VOLUME => Self::Volume(raw[1]),
            OPCODE_EQ_BAND => Self::EqBand { band: raw[1], value: raw[2] },
            OPCODE_EQ_PRESET => Self::EqPreset(raw[1]),
            OPCODE_POWER => Self::Power(match raw[1] {
                2 => PowerState::Off,
                3 => PowerState::On,
                other => PowerState::Unknown(other),
            }),
            other => Self::Unknown(other),
        })
    }
}

/// Collapse the two complementary level bytes into a dial position.
///
/// The dial reports game and chat levels in 0-100: the full-game stop is
/// `(100, 0)`, full-chat `(0, 100)` and the detent in the middle
/// `(100, 100)`. Out-of-range bytes are clamped, not rejected - the
/// hardware legitimately reports boundary values.
fn decode_dial(game: u8, chat: u8) -> MixState {
    let game = f32::from(game.min(DIAL_RANGE));
    let chat = f32::from(chat.min(DIAL_RANGE));
    let range = f32::from(DIAL_RANGE);
    MixState::new((range - game + chat) / (2.0 * range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn chatmix_report(game: u8, chat: u8) -> [u8; REPORT_LEN] {
        let mut raw = [0u8; REPORT_LEN];
        raw[0] = OPCODE_CHATMIX;
        raw[1] = game;
        raw[2] = chat;
        raw
    }

    #[test]
    fn test_decode_full_game() {
        let report = Report::decode(&chatmix_report(100, 0)).unwrap();
        assert_eq!(report, Report::ChatMix(MixState::new(0.0)));
    }

    #[test]
    fn test_decode_full_chat() {
        let report = Report::decode(&chatmix_report(0, 100)).unwrap();
        assert_eq!(report, Report::ChatMix(MixState::new(1.0)));
    }

    #[test]
    fn test_decode_center_positions() {
        // The center detent reports both levels at full; a plain midpoint
        // pair decodes the same way.
        for raw in [chatmix_report(100, 100), chatmix_report(50, 50)] {
            let report = Report::decode(&raw).unwrap();
            assert_eq!(report, Report::ChatMix(MixState::CENTER));
        }
    }

    #[test]
    fn test_decode_clamps_out_of_range_levels() {
        let report = Report::decode(&chatmix_report(255, 0)).unwrap();
        assert_eq!(report, Report::ChatMix(MixState::new(0.0)));
    }

    #[test]
    fn test_decode_wrong_length_is_malformed() {
        assert_matches!(Report::decode(&[]), Err(DecodeError::MalformedReport(0)));
        assert_matches!(
            Report::decode(&[OPCODE_CHATMIX, 50, 50]),
            Err(DecodeError::MalformedReport(3))
        );
        assert_matches!(
            Report::decode(&[0u8; REPORT_LEN + 1]),
            Err(DecodeError::MalformedReport(65))
        );
    }

    #[test]
    fn test_decode_power_events() {
        let mut raw = [0u8; REPORT_LEN];
        raw[0] = OPCODE_POWER;
        raw[1] = 2;
        assert_eq!(Report::decode(&raw).unwrap(), Report::Power(PowerState::Off));
        raw[1] = 3;
        assert_eq!(Report::decode(&raw).unwrap(), Report::Power(PowerState::On));
        raw[1] = 9;
        assert_eq!(Report::decode(&raw).unwrap(), Report::Power(PowerState::Unknown(9)));
    }

    #[test]
    fn test_decode_other_opcodes() {
        let mut raw = [0u8; REPORT_LEN];
        raw[0] = OPCODE_VOLUME;
        raw[1] = 12;
        assert_eq!(Report::decode(&raw).unwrap(), Report::Volume(12));

        raw[0] = 0x99;
        assert_eq!(Report::decode(&raw).unwrap(), Report::Unknown(0x99));
    }

    proptest! {
        #[test]
        fn test_decode_is_pure(game: u8, chat: u8) {
            let raw = chatmix_report(game, chat);
            prop_assert_eq!(Report::decode(&raw), Report::decode(&raw));
        }

        #[test]
        fn test_decoded_mix_always_in_range(game: u8, chat: u8) {
            let Report::ChatMix(mix) = Report::decode(&chatmix_report(game, chat)).unwrap() else {
                panic!("expected a ChatMix report");
            };
            prop_assert!((0.0..=1.0).contains(&mix.value()));
        }
    }
}
