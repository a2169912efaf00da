//! Linear interval remapping
//!
//! Maps a value on one linear range onto another. Used to turn a continuous
//! coordinate in scanner space into a slice index of the volume.

/// Remap `input` from `input_range` onto `output_range`.
///
/// Values outside `input_range` extrapolate linearly; nothing is clamped.
///
/// Precondition: `input_range.0 != input_range.1`.
pub fn map_interval(input: f64, input_range: (f64, f64), output_range: (f64, f64)) -> f64 {
    let (input_start, input_end) = input_range;
    let (output_start, output_end) = output_range;
    debug_assert!(input_end != input_start, "empty input range");
    output_start + ((output_end - output_start) / (input_end - input_start)) * (input - input_start)
}

/// Round to the nearest integer, halves towards positive infinity
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
