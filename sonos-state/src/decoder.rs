//! Event decoder - converts cloud status objects to capability updates
//!
//! All functions here are pure. Fields absent from the input produce no
//! update, so applying the result is always a partial update. The one
//! exception is a metadata status without a current item, which clears the
//! track fields.

use sonos_api::{Item, MetadataStatus, PlayModes, PlaybackState, PlaybackStatus, PlayerVolume, WebhookBody};

use crate::capability::{Artwork, Capability, CapabilityValue, RepeatMode};

/// A single update to apply to a sink
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityUpdate {
    Set(Capability, CapabilityValue),
    Art(Artwork),
}

impl CapabilityUpdate {
    fn set(capability: Capability, value: impl Into<CapabilityValue>) -> Self {
        CapabilityUpdate::Set(capability, value.into())
    }
}

/// `PLAYING`/`BUFFERING` play, `IDLE`/`PAUSED` do not, anything else is unknown
pub fn playing(state: PlaybackState) -> CapabilityValue {
    match state {
        PlaybackState::Playing | PlaybackState::Buffering => CapabilityValue::Bool(true),
        PlaybackState::Idle | PlaybackState::Paused => CapabilityValue::Bool(false),
        PlaybackState::Unknown => CapabilityValue::Null,
    }
}

pub fn repeat_mode(modes: &PlayModes) -> RepeatMode {
    if modes.repeat_one == Some(true) {
        RepeatMode::Track
    } else if modes.repeat == Some(true) {
        RepeatMode::Playlist
    } else {
        RepeatMode::None
    }
}

/// Inverse of [`repeat_mode`], as sent with `setPlayModes`
pub fn play_modes_for_repeat(mode: RepeatMode) -> PlayModes {
    PlayModes {
        repeat: Some(mode == RepeatMode::Playlist),
        repeat_one: Some(mode == RepeatMode::Track),
        ..Default::default()
    }
}

pub fn millis_to_seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Cloud volume (0..=100) to a fraction
pub fn volume_fraction(volume: u8) -> f64 {
    f64::from(volume.min(100)) / 100.0
}

/// Fraction to cloud volume, clamped to 0..=100
pub fn volume_percent(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn decode_play_modes(modes: &PlayModes, updates: &mut Vec<CapabilityUpdate>) {
    if modes.repeat.is_some() || modes.repeat_one.is_some() {
        updates.push(CapabilityUpdate::set(
            Capability::SpeakerRepeat,
            repeat_mode(modes).as_str(),
        ));
    }
    if let Some(shuffle) = modes.shuffle {
        updates.push(CapabilityUpdate::set(Capability::SpeakerShuffle, shuffle));
    }
}

fn decode_item(item: &Item, updates: &mut Vec<CapabilityUpdate>) {
    let Some(track) = &item.track else {
        updates.push(CapabilityUpdate::Art(Artwork::None));
        return;
    };

    if let Some(name) = &track.name {
        updates.push(CapabilityUpdate::set(Capability::SpeakerTrack, name.as_str()));
    }
    if let Some(artist) = track.artist.as_ref().and_then(|a| a.name.as_deref()) {
        updates.push(CapabilityUpdate::set(Capability::SpeakerArtist, artist));
    }
    if let Some(album) = track.album.as_ref().and_then(|a| a.name.as_deref()) {
        updates.push(CapabilityUpdate::set(Capability::SpeakerAlbum, album));
    }
    if let Some(duration) = track.duration_millis {
        updates.push(CapabilityUpdate::set(
            Capability::SpeakerDuration,
            millis_to_seconds(duration),
        ));
    }
    updates.push(CapabilityUpdate::Art(Artwork::from_url(
        track.image_url.as_deref(),
    )));
}

pub fn decode_playback(status: &PlaybackStatus) -> Vec<CapabilityUpdate> {
    let mut updates = Vec::new();
    if let Some(state) = status.playback_state {
        updates.push(CapabilityUpdate::Set(Capability::SpeakerPlaying, playing(state)));
    }
    if let Some(modes) = &status.play_modes {
        decode_play_modes(modes, &mut updates);
    }
    if let Some(position) = status.position_millis {
        updates.push(CapabilityUpdate::set(
            Capability::SpeakerPosition,
            millis_to_seconds(position),
        ));
    }
    updates
}

pub fn decode_metadata(status: &MetadataStatus) -> Vec<CapabilityUpdate> {
    match &status.current_item {
        Some(item) => {
            let mut updates = Vec::new();
            decode_item(item, &mut updates);
            updates
        }
        None => vec![
            CapabilityUpdate::Set(Capability::SpeakerTrack, CapabilityValue::Null),
            CapabilityUpdate::Set(Capability::SpeakerArtist, CapabilityValue::Null),
            CapabilityUpdate::Set(Capability::SpeakerAlbum, CapabilityValue::Null),
            CapabilityUpdate::Set(Capability::SpeakerDuration, CapabilityValue::Null),
            CapabilityUpdate::Set(Capability::SpeakerPosition, CapabilityValue::Null),
            CapabilityUpdate::Art(Artwork::None),
        ],
    }
}

pub fn decode_volume(volume: &PlayerVolume) -> Vec<CapabilityUpdate> {
    let mut updates = Vec::new();
    if let Some(v) = volume.volume {
        updates.push(CapabilityUpdate::set(Capability::VolumeSet, volume_fraction(v)));
    }
    if let Some(muted) = volume.muted {
        updates.push(CapabilityUpdate::set(Capability::VolumeMute, muted));
    }
    updates
}

/// Decode a webhook push; unlike a metadata fetch, a missing current item
/// leaves the track untouched
pub fn decode_webhook(body: &WebhookBody) -> Vec<CapabilityUpdate> {
    let mut updates = decode_playback(&PlaybackStatus {
        playback_state: body.playback_state,
        play_modes: body.play_modes.clone(),
        position_millis: body.position_millis,
    });
    if let Some(item) = &body.current_item {
        decode_item(item, &mut updates);
    }
    updates.extend(decode_volume(&PlayerVolume {
        volume: body.volume,
        muted: body.muted,
        fixed: None,
    }));
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(PlaybackState::Playing, CapabilityValue::Bool(true))]
    #[case(PlaybackState::Buffering, CapabilityValue::Bool(true))]
    #[case(PlaybackState::Paused, CapabilityValue::Bool(false))]
    #[case(PlaybackState::Idle, CapabilityValue::Bool(false))]
    #[case(PlaybackState::Unknown, CapabilityValue::Null)]
    fn test_playing(#[case] state: PlaybackState, #[case] expected: CapabilityValue) {
        assert_eq!(playing(state), expected);
    }

    #[rstest]
    #[case(Some(true), Some(true), RepeatMode::Track)]
    #[case(Some(true), Some(false), RepeatMode::Playlist)]
    #[case(Some(false), None, RepeatMode::None)]
    #[case(None, None, RepeatMode::None)]
    fn test_repeat_mode(
        #[case] repeat: Option<bool>,
        #[case] repeat_one: Option<bool>,
        #[case] expected: RepeatMode,
    ) {
        let modes = PlayModes {
            repeat,
            repeat_one,
            ..Default::default()
        };
        assert_eq!(repeat_mode(&modes), expected);
    }

    #[test]
    fn test_repeat_mode_inverse() {
        for mode in [RepeatMode::None, RepeatMode::Track, RepeatMode::Playlist] {
            assert_eq!(repeat_mode(&play_modes_for_repeat(mode)), mode);
        }
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(0.42, 42)]
    #[case(1.0, 100)]
    #[case(1.7, 100)]
    #[case(-0.3, 0)]
    fn test_volume_percent(#[case] fraction: f64, #[case] expected: u8) {
        assert_eq!(volume_percent(fraction), expected);
    }

    #[test]
    fn test_volume_and_mute() {
        let updates = decode_volume(&PlayerVolume {
            volume: Some(42),
            muted: Some(true),
            fixed: None,
        });
        assert_eq!(
            updates,
            vec![
                CapabilityUpdate::Set(Capability::VolumeSet, CapabilityValue::Number(0.42)),
                CapabilityUpdate::Set(Capability::VolumeMute, CapabilityValue::Bool(true)),
            ]
        );
    }

    #[test]
    fn test_playback_is_partial() {
        let status: PlaybackStatus =
            serde_json::from_value(json!({ "positionMillis": 61500 })).unwrap();
        assert_eq!(
            decode_playback(&status),
            vec![CapabilityUpdate::Set(
                Capability::SpeakerPosition,
                CapabilityValue::Number(61.5)
            )]
        );
    }

    #[test]
    fn test_play_modes() {
        let status: PlaybackStatus = serde_json::from_value(json!({
            "playbackState": "PLAYBACK_STATE_PAUSED",
            "playModes": { "repeat": true, "repeatOne": false, "shuffle": true }
        }))
        .unwrap();
        assert_eq!(
            decode_playback(&status),
            vec![
                CapabilityUpdate::Set(Capability::SpeakerPlaying, CapabilityValue::Bool(false)),
                CapabilityUpdate::Set(Capability::SpeakerRepeat, "playlist".into()),
                CapabilityUpdate::Set(Capability::SpeakerShuffle, CapabilityValue::Bool(true)),
            ]
        );
    }

    #[test]
    fn test_metadata_with_track() {
        let status: MetadataStatus = serde_json::from_value(json!({
            "currentItem": { "track": {
                "name": "Song",
                "artist": { "name": "Band" },
                "album": { "name": "Record" },
                "durationMillis": 200000,
                "imageUrl": "https://img/1.jpg"
            }}
        }))
        .unwrap();

        assert_eq!(
            decode_metadata(&status),
            vec![
                CapabilityUpdate::Set(Capability::SpeakerTrack, "Song".into()),
                CapabilityUpdate::Set(Capability::SpeakerArtist, "Band".into()),
                CapabilityUpdate::Set(Capability::SpeakerAlbum, "Record".into()),
                CapabilityUpdate::Set(Capability::SpeakerDuration, CapabilityValue::Number(200.0)),
                CapabilityUpdate::Art(Artwork::Url("https://img/1.jpg".into())),
            ]
        );
    }

    #[test]
    fn test_metadata_without_current_item_clears() {
        let updates = decode_metadata(&MetadataStatus::default());
        for capability in [
            Capability::SpeakerTrack,
            Capability::SpeakerArtist,
            Capability::SpeakerAlbum,
            Capability::SpeakerDuration,
            Capability::SpeakerPosition,
        ] {
            assert!(updates.contains(&CapabilityUpdate::Set(capability, CapabilityValue::Null)));
        }
        assert!(updates.contains(&CapabilityUpdate::Art(Artwork::None)));
    }

    #[test]
    fn test_webhook_without_item_keeps_track() {
        let body: WebhookBody = serde_json::from_value(json!({
            "playbackState": "PLAYBACK_STATE_BUFFERING",
            "volume": 10
        }))
        .unwrap();
        assert_eq!(
            decode_webhook(&body),
            vec![
                CapabilityUpdate::Set(Capability::SpeakerPlaying, CapabilityValue::Bool(true)),
                CapabilityUpdate::Set(Capability::VolumeSet, CapabilityValue::Number(0.1)),
            ]
        );
    }
}
