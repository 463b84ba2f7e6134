//! Fixed-point rendering of raw token amounts.
//!
//! Rounding is round-half-away-from-zero at the requested fractional digit,
//! computed on exact decimal digits so balances of any size format correctly.

use alloy_primitives::U256;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayAmount {
    /// Rounded value with exactly `precision` fractional digits. Authoritative for display.
    pub text: String,
    /// Parse of `text`, only good enough for threshold comparison.
    pub approx: f64,
}

/// Splits `raw / 10^decimals` into its exact integer and zero-padded fractional digits.
fn split_digits(raw: U256, decimals: u8) -> (String, String) {
    let decimals = decimals as usize;
    match U256::from(10u64).checked_pow(U256::from(decimals)) {
        Some(divisor) => {
            let whole = raw / divisor;
            let remainder = raw % divisor;
            let fraction = if decimals == 0 {
                String::new()
            } else {
                format!("{:0>decimals$}", remainder.to_string())
            };
            (whole.to_string(), fraction)
        }
        // 10^decimals exceeds U256::MAX, so raw is below it
        None => ("0".to_string(), format!("{:0>decimals$}", raw.to_string())),
    }
}

/// Adds one unit in the last place to a string of ASCII digits.
fn increment_digits(digits: &mut Vec<u8>) {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

pub fn format_amount(raw: U256, decimals: u8, precision: usize) -> DisplayAmount {
    let (whole, mut fraction) = split_digits(raw, decimals);

    let round_up = fraction
        .as_bytes()
        .get(precision)
        .is_some_and(|d| *d >= b'5');
    if fraction.len() > precision {
        fraction.truncate(precision);
    } else {
        fraction.extend(std::iter::repeat_n('0', precision - fraction.len()));
    }

    let mut digits = format!("{whole}{fraction}").into_bytes();
    if round_up {
        increment_digits(&mut digits);
    }

    let split = digits.len() - precision;
    let (int_part, frac_part) = digits.split_at(split);
    let int_part = String::from_utf8_lossy(int_part);
    let text = if precision == 0 {
        int_part.into_owned()
    } else {
        format!("{}.{}", int_part, String::from_utf8_lossy(frac_part))
    };

    let approx = text.parse::<f64>().unwrap_or(f64::NAN);
    DisplayAmount { text, approx }
}
