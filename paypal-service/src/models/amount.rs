use crate::error::GatewayError;
use rust_decimal::prelude::*;
use serde::{Deserialize, Deserializer};
use std::fmt;

/// A checkout amount.
///
/// PayPal takes totals as strings; sending a binary float invites rounding
/// drift, so every amount is rendered with exactly two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount(Decimal);

impl Amount {
    /// Rounds to cents first; anything that rounds to zero is rejected.
    pub fn new(value: Decimal) -> Result<Self, GatewayError> {
        let cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if cents <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount(format!(
                "{} is not a positive amount",
                value
            )));
        }
        Ok(Self(cents))
    }

    pub fn from_f64(value: f64) -> Result<Self, GatewayError> {
        let decimal = Decimal::from_f64_retain(value)
            .ok_or_else(|| GatewayError::InvalidAmount(value.to_string()))?;
        Self::new(decimal)
    }

    /// The value PayPal sees in `transactions[].amount.total`.
    pub fn to_total(&self) -> String {
        format!("{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| GatewayError::InvalidAmount(format!("{:?}: {}", s, e)))?;
        Self::new(decimal)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_total())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Amount::from_f64(n),
            Raw::Text(s) => s.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_numbers_gain_two_decimals() {
        assert_eq!(Amount::from_f64(10.0).unwrap().to_total(), "10.00");
        assert_eq!("5".parse::<Amount>().unwrap().to_total(), "5.00");
    }

    #[test]
    fn extra_precision_is_rounded_to_cents() {
        assert_eq!(Amount::from_f64(10.004).unwrap().to_total(), "10.00");
        assert_eq!("10.004".parse::<Amount>().unwrap().to_total(), "10.00");
        assert_eq!("10.005".parse::<Amount>().unwrap().to_total(), "10.01");
    }

    #[test]
    fn binary_float_inputs_do_not_drift() {
        assert_eq!(Amount::from_f64(19.9).unwrap().to_total(), "19.90");
        assert_eq!(Amount::from_f64(0.1 + 0.2).unwrap().to_total(), "0.30");
    }

    #[test]
    fn deserializes_numbers_and_strings_alike() {
        let from_number: Amount = serde_json::from_str("19.9").unwrap();
        let from_string: Amount = serde_json::from_str("\"19.9\"").unwrap();
        assert_eq!(from_number.to_total(), from_string.to_total());
    }

    #[test]
    fn rejects_non_positive_and_garbage() {
        assert!(matches!(
            Amount::from_f64(0.0),
            Err(GatewayError::InvalidAmount(_))
        ));
        assert!("-3.50".parse::<Amount>().is_err());
        assert!("ten".parse::<Amount>().is_err());
        assert!(Amount::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn sub_cent_amounts_are_rejected() {
        assert!(matches!(
            "0.001".parse::<Amount>(),
            Err(GatewayError::InvalidAmount(_))
        ));
        assert!(Amount::from_f64(0.004).is_err());
        assert_eq!("0.005".parse::<Amount>().unwrap().to_total(), "0.01");
    }
}
