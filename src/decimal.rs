use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Money in integer minor currency units (e.g. rupiah, cents)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// largest amount accepted on input; sums of a few of these stay inside i64
    pub const MAX_AMOUNT: Money = Money(1_000_000_000_000_000);

    /// create from minor units
    pub const fn from_minor(amount: i64) -> Self {
        Money(amount)
    }

    /// get minor units
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// exact decimal view, used for intermediate rate products
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// floor a decimal amount into minor units
    pub fn from_decimal_floor(d: Decimal) -> Option<Self> {
        use rust_decimal::prelude::ToPrimitive;
        d.floor().to_i64().map(Money)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// subtract, clamping at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        Money((self.0 - other.0).max(0))
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// true when within `0..=MAX_AMOUNT`
    pub fn is_within_bounds(&self) -> bool {
        self.0 >= 0 && *self <= Self::MAX_AMOUNT
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Money {
    fn from(i: i64) -> Self {
        Money(i)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

/// interest rate in basis points per billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    pub const ZERO: Rate = Rate(0);

    /// create from basis points (e.g., 300 for 3% per period)
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// create from whole percent per period
    pub const fn from_percentage(p: u32) -> Self {
        Rate(p * 100)
    }

    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// as a fraction (300 bps -> 0.03)
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(10_000)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}
