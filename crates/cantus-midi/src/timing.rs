//! Tempo and rhythm arithmetic.

/// Duration of one beat at `bpm`, in seconds.
#[inline]
pub fn bpm_to_secs(bpm: f64) -> f64 {
    60.0 / bpm
}

/// Metronome mark at which one beat lasts `secs`.
#[inline]
pub fn secs_to_bpm(secs: f64) -> f64 {
    60.0 / secs
}

/// Duration in seconds of a rhythmic value given as a fraction of a whole
/// note (`0.25` is a quarter) at `bpm` quarter notes per minute.
#[inline]
pub fn rhythm_to_secs(rhythm: f64, bpm: f64) -> f64 {
    rhythm * 4.0 * bpm_to_secs(bpm)
}

/// Lays durations end to end starting at `start`, returning `(onset, duration)` pairs.
pub fn onsets_from_durations(durations: &[f64], start: f64) -> Vec<(f64, f64)> {
    let mut onset = start;
    durations
        .iter()
        .map(|&duration| {
            let pair = (onset, duration);
            onset += duration;
            pair
        })
        .collect()
}

/// Distances between consecutive onsets.
pub fn durations_from_onsets(onsets: &[f64]) -> Vec<f64> {
    onsets.windows(2).map(|w| w[1] - w[0]).collect()
}
