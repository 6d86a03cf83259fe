/// Human-readable byte count: `0B`, `100B`, `1.5KB`, `2MB`, ...
///
/// Units step at powers of 1024 and the value is rounded to two decimals
/// with trailing zeros dropped. Anything past the PB threshold is still
/// expressed in PB.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut exponent = 0;
    while exponent + 1 < UNITS.len() && bytes >= 1u64 << (10 * (exponent + 1)) {
        exponent += 1;
    }

    if exponent == 0 {
        return format!("{}B", bytes);
    }

    let value = bytes as f64 / (1u64 << (10 * exponent)) as f64;
    let rounded = (value * 100.0).round() / 100.0;
    format!("{}{}", rounded, UNITS[exponent])
}
