use super::*;

fn sine(freq: f32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 48_000.0).sin())
        .collect()
}

#[test]
fn silence_maps_to_zero() {
    let mut a = FftAnalyzer::new();
    let mut out = vec![255u8; BIN_COUNT];
    a.set_input(&[0.0; FFT_SIZE]);
    a.magnitude_snapshot(&mut out);
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn sine_peaks_at_its_bin() {
    let mut a = FftAnalyzer::new();
    // Bin width is 48000 / 2048 = 23.4375 Hz; bin 40 is 937.5 Hz.
    a.set_input(&sine(937.5, FFT_SIZE));
    let mut out = vec![0u8; BIN_COUNT];
    for _ in 0..20 {
        a.magnitude_snapshot(&mut out);
    }
    let (peak, _) = out
        .iter()
        .enumerate()
        .max_by_key(|(_, v)| **v)
        .unwrap();
    assert!((39..=41).contains(&peak), "peak at {peak}");
    assert!(out[40] > 200);
    assert!(out[400] < out[40]);
}

#[test]
fn smoothing_rises_gradually() {
    let mut a = FftAnalyzer::new();
    let quiet: Vec<f32> = sine(937.5, FFT_SIZE).iter().map(|s| s * 0.001).collect();
    a.set_input(&quiet);
    let mut first = vec![0u8; BIN_COUNT];
    a.magnitude_snapshot(&mut first);
    let mut later = vec![0u8; BIN_COUNT];
    for _ in 0..10 {
        a.magnitude_snapshot(&mut later);
    }
    assert!(later[40] > first[40]);
}

#[test]
fn short_input_is_padded_and_extra_output_zeroed() {
    let mut a = FftAnalyzer::new();
    a.set_input(&sine(937.5, 100));
    let mut out = vec![7u8; BIN_COUNT + 8];
    a.magnitude_snapshot(&mut out);
    assert!(out[BIN_COUNT..].iter().all(|&b| b == 0));
    assert_eq!(a.bin_count(), 1024);
}

#[test]
fn static_analyzer_repeats_bins() {
    let mut a = StaticAnalyzer::new(vec![1, 2, 3]);
    let mut out = [9u8; 5];
    a.magnitude_snapshot(&mut out);
    assert_eq!(out, [1, 2, 3, 0, 0]);
}
