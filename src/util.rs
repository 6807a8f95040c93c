/// Arithmetic mean, `None` for an empty slice
pub fn mean(data: &[f64]) -> Option<f64> {
    match data.len() {
        0 => None,
        count => Some(data.iter().sum::<f64>() / count as f64),
    }
}

/// Population standard deviation, `None` for an empty slice
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    let variance = data
        .iter()
        .map(|value| (value - data_mean).powi(2))
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Whole seconds as `H:MM:SS`, or `M:SS` under an hour
pub fn format_clock(total_seconds: u64) -> String {
    let (h, m, s) = (total_seconds / 3600, (total_seconds % 3600) / 60, total_seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[4.0, 6.0]), Some(5.0));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[4.0, 6.0]), Some(1.0));
        assert_eq!(std_dev(&[42.0]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_std_dev_spread() {
        let result = std_dev(&[-10.0, -5.0, -15.0]).unwrap();
        assert!((result - 4.08248290463863).abs() < 1e-10);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(3599), "59:59");
        assert_eq!(format_clock(3661), "1:01:01");
    }
}
