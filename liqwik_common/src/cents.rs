use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_SYMBOL: &str = "€";

//--------------------------------------        Cents        ---------------------------------------------------------
/// A monetary amount in the smallest currency unit. All amounts are stored and compared as integer cents; floating
/// point only appears at the API boundary, where user input in currency units is converted exactly once.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, AddAssign, add_assign);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Cents {
    type Error = CentsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(CentsConversionError(format!("Value {value} is too large to convert to Cents")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{CURRENCY_SYMBOL}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Converts an amount expressed in whole currency units (e.g. `50.5` euros) into cents, rounding to the nearest
    /// cent. This is the only place where a float is turned into money.
    pub fn from_currency_units(amount: f64) -> Result<Self, CentsConversionError> {
        if !amount.is_finite() {
            return Err(CentsConversionError(format!("{amount} is not a finite number")));
        }
        let cents = (amount * 100.0).round();
        // i64::MAX rounds up to 2^63 as a float, so that bound is exclusive
        if cents >= i64::MAX as f64 || cents < i64::MIN as f64 {
            return Err(CentsConversionError(format!("{amount} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }

    /// The amount in whole currency units, for display and API responses.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_currency_units(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Formats the amount with two decimals and no currency symbol, e.g. `1234.50`.
    pub fn to_decimal_string(&self) -> String {
        format!("{:.2}", self.as_currency_units())
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn currency_units_round_to_nearest_cent() {
        assert_eq!(Cents::from_currency_units(50.5).unwrap(), Cents::from(5050));
        assert_eq!(Cents::from_currency_units(1000.0).unwrap(), Cents::from(100_000));
        assert_eq!(Cents::from_currency_units(0.126).unwrap(), Cents::from(13));
        assert_eq!(Cents::from_currency_units(19.999).unwrap(), Cents::from(2000));
        assert_eq!(Cents::from_currency_units(-3.456).unwrap(), Cents::from(-346));
    }

    #[test]
    fn non_finite_amounts_are_rejected() {
        assert!(Cents::from_currency_units(f64::NAN).is_err());
        assert!(Cents::from_currency_units(f64::INFINITY).is_err());
        assert!(Cents::from_currency_units(1e300).is_err());
    }

    #[test]
    fn amounts_at_the_edge_of_the_range() {
        let edge = 2f64.powi(63) / 100.0;
        assert!(Cents::from_currency_units(edge).is_err());
        assert_eq!(Cents::from_currency_units(-edge).unwrap(), Cents::from(i64::MIN));
        assert_eq!(Cents::from_currency_units(1e16).unwrap(), Cents::from(1_000_000_000_000_000_000));
    }

    #[test]
    fn display() {
        assert_eq!(Cents::from(5050).to_string(), "€50.50");
        assert_eq!(Cents::from(7).to_string(), "€0.07");
        assert_eq!(Cents::from(-125).to_string(), "-€1.25");
        assert_eq!(Cents::from(100_000).to_decimal_string(), "1000.00");
    }

    #[test]
    fn arithmetic() {
        let mut a = Cents::from(250);
        a += Cents::from(50);
        assert_eq!(a, Cents::from(300));
        a -= Cents::from(100);
        assert_eq!(a - Cents::from(200), Cents::default());
        assert_eq!(Cents::from(120) * 3, Cents::from(360));
        let total: Cents = vec![Cents::from(1), Cents::from(2), Cents::from(3)].into_iter().sum();
        assert_eq!(total, Cents::from(6));
        assert_eq!(-Cents::from(5), Cents::from(-5));
    }
}
