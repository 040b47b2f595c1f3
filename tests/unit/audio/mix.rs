use super::*;
use crate::audio::playlist::AudioTrack;

fn track(name: &str, samples: &[f32], rate: u32) -> AudioTrack {
    AudioTrack::new(
        name,
        AudioPcm {
            sample_rate: rate,
            channels: 2,
            interleaved_f32: samples.to_vec(),
        },
    )
}

#[test]
fn timeline_repeats_playlist_per_loop() {
    let pl = Playlist::new(
        vec![track("a", &[1.0, 1.0], 48_000), track("b", &[2.0, 2.0, 3.0, 3.0], 48_000)],
        2,
    )
    .unwrap();
    let pcm = render_timeline_pcm(&pl).unwrap();
    assert_eq!(
        pcm.interleaved_f32,
        vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0]
    );
    assert_eq!(pcm.frames(), 6);
}

#[test]
fn mixed_rates_are_rejected() {
    let pl = Playlist::new(
        vec![track("a", &[0.0, 0.0], 48_000), track("b", &[0.0, 0.0], 44_100)],
        1,
    )
    .unwrap();
    assert!(render_timeline_pcm(&pl).is_err());
    assert!(render_timeline_pcm(&Playlist::new(vec![], 1).unwrap()).is_err());
}

#[test]
fn temp_file_holds_le_bytes_and_is_removed() {
    let pcm = AudioPcm {
        sample_rate: 48_000,
        channels: 2,
        interleaved_f32: vec![0.5, -0.25],
    };
    let path = {
        let tmp = TempPcmFile::create(&pcm).unwrap();
        let bytes = std::fs::read(tmp.path()).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &0.5f32.to_le_bytes());
        tmp.path().to_path_buf()
    };
    assert!(!path.exists());
}
