// utils/money.rs
use bigdecimal::rounding::RoundingMode;
use bigdecimal::BigDecimal;
use num_traits::Zero;

/// Monetary amounts are fixed-point decimals with two fractional digits.
/// Rounding rule: half-even, applied once when the commission is computed.
/// The net is the exact remainder, so gross == commission + net always holds.
pub const MONEY_SCALE: i64 = 2;

pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(MONEY_SCALE, RoundingMode::HalfEven)
}

/// Split a gross amount into (commission, net) for the given rate in [0, 1].
pub fn split_commission(gross: &BigDecimal, rate: &BigDecimal) -> (BigDecimal, BigDecimal) {
    let commission = round_money(&(gross * rate));
    let net = round_money(&(gross - &commission));
    (commission, net)
}

pub fn is_positive_amount(amount: &BigDecimal) -> bool {
    !amount.is_zero() && amount > &BigDecimal::zero()
}

/// Percentage (0-100) of an amount, rounded to money scale.
pub fn percentage_of(amount: &BigDecimal, percent: &BigDecimal) -> BigDecimal {
    round_money(&(amount * percent / BigDecimal::from(100)))
}

/// Parse a user-supplied amount string into a non-negative money value.
pub fn parse_amount(amount_str: &str) -> Result<BigDecimal, String> {
    use std::str::FromStr;

    BigDecimal::from_str(amount_str.trim())
        .map_err(|_| "Invalid amount format".to_string())
        .and_then(|amount| {
            if amount < BigDecimal::zero() {
                Err("Amount cannot be negative".to_string())
            } else {
                Ok(round_money(&amount))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_split_commission_reassembles_gross() {
        let cases = [
            ("400.00", "0.15"),
            ("1000.00", "0.15"),
            ("0.01", "0.15"),
            ("333.33", "0.1"),
            ("99.99", "0.0725"),
        ];
        for (gross, rate) in cases {
            let gross = dec(gross);
            let (commission, net) = split_commission(&gross, &dec(rate));
            assert_eq!(commission + net, round_money(&gross));
        }
    }

    #[test]
    fn test_split_commission_fifteen_percent() {
        let (commission, net) = split_commission(&dec("400.00"), &dec("0.15"));
        assert_eq!(commission, dec("60.00"));
        assert_eq!(net, dec("340.00"));
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_money(&dec("1.005")), dec("1.00"));
        assert_eq!(round_money(&dec("1.015")), dec("1.02"));
        assert_eq!(round_money(&dec("1.025")), dec("1.02"));
        assert_eq!(round_money(&dec("2.675")), dec("2.68"));
    }

    #[test]
    fn test_is_positive_amount() {
        assert!(is_positive_amount(&dec("0.01")));
        assert!(!is_positive_amount(&dec("0.00")));
        assert!(!is_positive_amount(&dec("-5.00")));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100.00"), Ok(dec("100.00")));
        assert_eq!(parse_amount(" 0.5 "), Ok(dec("0.50")));
        assert!(parse_amount("-100").is_err());
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_percentage_of() {
        assert_eq!(percentage_of(&dec("600.00"), &dec("50")), dec("300.00"));
        assert_eq!(percentage_of(&dec("100.00"), &dec("0")), dec("0.00"));
        assert_eq!(percentage_of(&dec("100.00"), &dec("100")), dec("100.00"));
        assert_eq!(percentage_of(&dec("99.99"), &dec("33")), dec("33.00"));
    }
}
