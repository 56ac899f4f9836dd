// Time labels
use chrono::NaiveTime;

const MS_PER_DAY: i64 = 86_400_000;

/// Sample index as `HH h MM m SS.mmm s`, wrapping at 24 h
pub fn format_sample_time(sample: usize, sample_rate: f64) -> String {
    let ms = ((sample as f64 * 1000.0) / sample_rate) as i64;
    format_millis(ms)
}

pub fn format_millis(ms: i64) -> String {
    let ms = ms.rem_euclid(MS_PER_DAY);
    let secs = (ms / 1000) as u32;
    let nanos = ((ms % 1000) * 1_000_000) as u32;

    match NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) {
        Some(time) => time.format("%H h %M m %S%.3f s").to_string(),
        None => "00 h 00 m 00.000 s".to_string(),
    }
}

/// Label shown for the current estimate
pub fn arrival_label(sample: usize, sample_rate: f64) -> String {
    format!("Estimated Arrival Time: {}", format_sample_time(sample, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_format() {
        assert_eq!(
            arrival_label(500, 100.0),
            "Estimated Arrival Time: 00 h 00 m 05.000 s"
        );
        assert_eq!(
            format_sample_time(3_723_456, 1000.0),
            "01 h 02 m 03.456 s"
        );
    }

    #[test]
    fn test_milliseconds_truncate() {
        // 1 sample at 3 Hz is 333.33 ms
        assert_eq!(format_sample_time(1, 3.0), "00 h 00 m 00.333 s");
        assert_eq!(format_sample_time(2, 3.0), "00 h 00 m 00.666 s");
    }

    #[test]
    fn test_wraps_at_one_day() {
        assert_eq!(format_millis(MS_PER_DAY + 1_500), "00 h 00 m 01.500 s");
        assert_eq!(format_millis(-1), "23 h 59 m 59.999 s");
    }
}
