//! Display formatting for large amounts: two decimals, thousands
//! separators, and M/B/T suffixes.

use rust_decimal::Decimal;

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_amount(amount: Decimal) -> String {
    let units = [
        (Decimal::new(1_000_000_000_000, 0), " T"),
        (Decimal::new(1_000_000_000, 0), " B"),
        (Decimal::new(1_000_000, 0), " M"),
    ];
    let abs = amount.abs();
    let (scaled, suffix) = units
        .iter()
        .find(|(threshold, _)| abs >= *threshold)
        .map(|(threshold, suffix)| (abs / *threshold, *suffix))
        .unwrap_or((abs, ""));
    let text = format!("{:.2}", scaled.round_dp(2));
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if amount < Decimal::ZERO { "-" } else { "" };
    format!("{sign}{}.{frac_part}{suffix}", group_thousands(int_part))
}
