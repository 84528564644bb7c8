//! SPA `Props` pod construction for volume updates.

use std::io::Cursor;

use libspa::pod::serialize::PodSerializer;
use libspa::pod::{Object, Property, PropertyFlags, Value, ValueArray};

use crate::error::{PwError, PwResult};

/// Convert a linear gain into a `channelVolumes` value.
///
/// PipeWire stores per-channel volumes with a cubic taper; `wpctl` and the
/// desktop volume controls present the cube root of the stored value.
/// Applying the same curve here keeps "50%" on the dial equal to "50%" in
/// the mixer UI.
#[must_use]
pub fn gain_to_channel_volume(gain: f32) -> f32 {
    gain.clamp(0.0, 1.0).powi(3)
}

/// Serialize a `Props` object setting all channel volumes to `gain`.
///
/// # Errors
/// Returns [`PwError::VolumeControlFailed`] when serialization fails.
pub fn volume_props_pod(gain: f32, channels: usize) -> PwResult<Vec<u8>> {
    let volume = gain_to_channel_volume(gain);

    let object = Object {
        type_: libspa::sys::SPA_TYPE_OBJECT_Props,
        id: libspa::sys::SPA_PARAM_Props,
        properties: vec![Property {
            key: libspa::sys::SPA_PROP_channelVolumes,
            flags: PropertyFlags::empty(),
            value: Value::ValueArray(ValueArray::Float(vec![volume; channels])),
        }],
    };

    PodSerializer::serialize(Cursor::new(Vec::new()), &Value::Object(object))
        .map(|(cursor, _len)| cursor.into_inner())
        .map_err(|e| PwError::VolumeControlFailed(format!("pod serialization failed: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_taper_endpoints() {
        assert_eq!(gain_to_channel_volume(0.0), 0.0);
        assert_eq!(gain_to_channel_volume(1.0), 1.0);
    }

    #[test]
    fn test_cubic_taper_clamps() {
        assert_eq!(gain_to_channel_volume(-1.0), 0.0);
        assert_eq!(gain_to_channel_volume(2.0), 1.0);
    }

    #[test]
    fn test_cubic_taper_midpoint() {
        let v = gain_to_channel_volume(0.5);
        assert!((v - 0.125).abs() < f32::EPSILON);
    }

    #[test]
    fn test_volume_pod_serializes() {
        let pod = volume_props_pod(0.5, 2).unwrap();
        assert!(!pod.is_empty());
        // A serialized pod is 8-byte aligned.
        assert_eq!(pod.len() % 8, 0);
    }
}
