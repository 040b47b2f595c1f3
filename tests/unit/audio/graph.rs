use super::*;
use crate::audio::analyzer::BIN_COUNT;
use crate::audio::playlist::AudioTrack;

fn tone_playlist(secs: f64) -> Arc<Playlist> {
    let rate = 48_000u32;
    let frames = (secs * f64::from(rate)) as usize;
    let mut interleaved = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let s = (2.0 * std::f32::consts::PI * 937.5 * i as f32 / rate as f32).sin() * 0.5;
        interleaved.push(s);
        interleaved.push(s);
    }
    let track = AudioTrack::new(
        "tone",
        AudioPcm {
            sample_rate: rate,
            channels: 2,
            interleaved_f32: interleaved,
        },
    );
    Arc::new(Playlist::new(vec![track], 2).unwrap())
}

#[test]
fn gain_is_shared_between_clones() {
    let g = MonitorGain::default();
    let other = g.clone();
    other.set(0.0);
    assert_eq!(g.get(), 0.0);
    g.set(0.75);
    assert_eq!(other.get(), 0.75);
}

#[test]
fn analyser_sees_playing_audio() {
    let pl = tone_playlist(0.5);
    let mut graph = AudioGraph::new(pl.clone(), MonitorGain::default());
    let mut player = Player::new(pl);
    player.play().unwrap();
    player.advance(0.1);
    graph.process(&player);

    let mut bins = vec![0u8; BIN_COUNT];
    graph.analyser().magnitude_snapshot(&mut bins);
    assert!(bins[40] > 0);
    assert!(graph.monitor().level() > 0.4);
    assert!(graph.monitor().frames_out() > 0);
}

#[test]
fn muted_monitor_reports_silence() {
    let pl = tone_playlist(0.5);
    let gain = MonitorGain::default();
    let mut graph = AudioGraph::new(pl.clone(), gain.clone());
    let mut player = Player::new(pl);
    player.play().unwrap();
    gain.set(0.0);
    player.advance(0.1);
    graph.process(&player);
    assert_eq!(graph.monitor().level(), 0.0);
}

#[test]
fn capture_tap_renders_every_loop_at_unity_gain() {
    let pl = tone_playlist(0.25);
    let gain = MonitorGain::new(0.0);
    let mut graph = AudioGraph::new(pl.clone(), gain);
    let pcm = graph.render_capture_pcm().unwrap();
    assert_eq!(pcm.frames(), 12_000 * 2);
    assert!(pcm.interleaved_f32.iter().any(|s| s.abs() > 0.4));
    assert_eq!(graph.capture().renders(), 1);
}
