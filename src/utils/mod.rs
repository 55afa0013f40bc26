//! Utility functions for formatting and common operations
//!
//! This module provides centralized formatting utilities for consistent
//! display of yen amounts, counts and sizes throughout the application.

use rust_decimal::Decimal;

/// Insert `,` thousands separators into a string of ASCII digits.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format an integer with thousands separators: `1234567` → `"1,234,567"`.
///
/// # Examples
/// ```
/// use ecops::utils::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(-1000), "-1,000");
/// ```
pub fn format_count(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    format!("{}{}", sign, group_thousands(&value.unsigned_abs().to_string()))
}

/// Format a yen amount, truncated to whole yen: "¥1,234,567".
///
/// # Examples
/// ```
/// use ecops::utils::format_yen;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_yen(dec!(120000)), "¥120,000");
/// assert_eq!(format_yen(dec!(-500.9)), "¥-500");
/// ```
pub fn format_yen(value: Decimal) -> String {
    let whole = value.trunc();
    let sign = if whole < Decimal::ZERO { "-" } else { "" };
    format!("¥{}{}", sign, group_thousands(&whole.abs().to_string()))
}

/// Bytes to mebibytes, the unit the inventory artifact records sizes in.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
