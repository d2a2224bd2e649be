// Size and percentage token conversion (binary multiples for every byte prefix)

use regex::Regex;
use std::sync::LazyLock;

const KIB: f64 = 1024.0;

static SIZE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]*\.?[0-9]+)\s*([A-Za-z]*)$").expect("size token regex"));

/// Multiplier for a byte unit, or `None` if the unit is not recognized.
/// `KB/MB/GB/TB` are treated as binary multiples, matching what `docker stats` actually reports.
fn unit_multiplier(unit: &str) -> Option<f64> {
    match unit.to_ascii_uppercase().as_str() {
        "B" => Some(1.0),
        "KIB" | "KB" => Some(KIB),
        "MIB" | "MB" => Some(KIB * KIB),
        "GIB" | "GB" => Some(KIB * KIB * KIB),
        "TIB" | "TB" => Some(KIB * KIB * KIB * KIB),
        _ => None,
    }
}

/// Convert `value` expressed in `unit` to bytes. Unknown units leave the value unchanged.
pub fn bytes_from_size_token(value: f64, unit: &str) -> f64 {
    match unit_multiplier(unit.trim()) {
        Some(m) => value * m,
        None => value,
    }
}

/// Parse a token such as `"1.2MiB"` or `"512 kB"` to bytes. Returns `None` when there is no number.
pub fn parse_size(token: &str) -> Option<f64> {
    let caps = SIZE_TOKEN.captures(token.trim())?;
    let value = caps[1].parse::<f64>().ok()?;
    Some(bytes_from_size_token(value, &caps[2]))
}

/// Parse `"45.3%"` to `45.3`; anything unparseable is `0.0`.
pub fn parse_percent(token: &str) -> f64 {
    token
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Mebibytes (as reported by `free -m` and Netdata's RAM chart) to bytes.
pub fn mib_to_bytes(mib: f64) -> f64 {
    bytes_from_size_token(mib, "MiB")
}

/// Gibibytes (as reported by `df -BG` and Netdata's disk chart) to bytes.
pub fn gib_to_bytes(gib: f64) -> f64 {
    bytes_from_size_token(gib, "GiB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gib_of_one_is_exactly_two_to_the_thirtieth() {
        assert_eq!(bytes_from_size_token(1.0, "GiB"), 1024.0 * 1024.0 * 1024.0);
        assert_eq!(bytes_from_size_token(1.0, "GB"), 1024.0 * 1024.0 * 1024.0);
    }

    #[test]
    fn si_suffixes_are_binary_multiples() {
        for (si, iec) in [("KB", "KiB"), ("MB", "MiB"), ("GB", "GiB"), ("TB", "TiB")] {
            assert_eq!(bytes_from_size_token(3.5, si), bytes_from_size_token(3.5, iec));
        }
        assert_eq!(bytes_from_size_token(2.0, "kB"), 2048.0);
    }

    #[test]
    fn conversion_is_monotonic_in_value() {
        for unit in ["B", "KiB", "KB", "MiB", "MB", "GiB", "GB", "TiB", "TB"] {
            let mut prev = bytes_from_size_token(0.0, unit);
            for v in [0.1, 1.0, 1.5, 10.0, 1000.0] {
                let next = bytes_from_size_token(v, unit);
                assert!(next > prev, "{unit} not monotonic at {v}");
                prev = next;
            }
        }
    }

    #[test]
    fn unknown_unit_returns_value_unchanged() {
        assert_eq!(bytes_from_size_token(42.0, "PiB"), 42.0);
        assert_eq!(bytes_from_size_token(42.0, ""), 42.0);
    }

    #[test]
    fn parse_size_splits_number_and_unit() {
        assert_eq!(parse_size("1.5MiB"), Some(1.5 * 1024.0 * 1024.0));
        assert_eq!(parse_size(" 512 kB "), Some(512.0 * 1024.0));
        assert_eq!(parse_size("0B"), Some(0.0));
        assert_eq!(parse_size("--"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn parse_percent_defaults_to_zero() {
        assert_eq!(parse_percent("45.3%"), 45.3);
        assert_eq!(parse_percent(" 0.00% "), 0.0);
        assert_eq!(parse_percent("--"), 0.0);
        assert_eq!(parse_percent(""), 0.0);
    }
}
