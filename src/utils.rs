//! # Utility Functions Module
//!
//! Small helpers shared by the ffmpeg/ffprobe argument builders.

/// Converts an iterable of string-like items to `Vec<String>`.
///
/// ```rust
/// use media_normalizer::utils::to_string_vec;
///
/// let crf = 28;
/// let args = to_string_vec(["-crf", &crf.to_string(), "-preset", "medium"]);
/// assert_eq!(args[1], "28");
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Builds an argument vector from mixed `Display` values.
///
/// ```rust
/// use media_normalizer::args;
///
/// let cap = 59;
/// let args = args!["-t", cap, "-c:v", "libx264"];
/// assert_eq!(args, vec!["-t", "59", "-c:v", "libx264"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(($item).to_string()),*]
    };
}

/// Round to the nearest even number, minimum 2 (x264 with yuv420p rejects odd sizes)
pub fn even(value: f64) -> u32 {
    // clamp the half so doubling can neither overflow nor turn odd
    let half = (value / 2.0).round().min((u32::MAX / 2) as f64) as u32;
    (half * 2).max(2)
}

/// Last `max_lines` lines of a tool's stderr, enough to diagnose without flooding logs
pub fn diagnostic_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Format seconds the way ffmpeg expects them for `-t`
pub fn seconds_arg(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as u64)
    } else {
        format!("{:.3}", seconds)
    }
}
