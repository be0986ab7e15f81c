//! # Money Module
//!
//! Provides [`Currency`], [`CurrencyAmount`] and [`ExchangeRate`] for
//! handling multi-currency monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                         │
//! │                                                                     │
//! │  In floating point:                                                 │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                       │
//! │                                                                     │
//! │  In a dual-currency drawer, float drift compounds per currency      │
//! │  and the closing reconciliation can never balance exactly.          │
//! │                                                                     │
//! │  OUR SOLUTION: Integer Minor Units, Tagged With Their Currency      │
//! │    $10.99  → CurrencyAmount { minor_units: 1099, currency: USD }    │
//! │    Bs 50,00 → CurrencyAmount { minor_units: 5000, currency: VES }   │
//! │    Adding the two is an error: mixing currencies requires an        │
//! │    explicit, timestamped exchange rate, never implicit coercion.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::{Currency, CurrencyAmount};
//!
//! let a = CurrencyAmount::new(1099, Currency::USD); // $10.99
//! let b = CurrencyAmount::new(500, Currency::USD);  // $5.00
//!
//! let total = a.try_add(b).unwrap();
//! assert_eq!(total.minor_units(), 1599);
//!
//! // Mixing currencies is always an error:
//! let bs = CurrencyAmount::new(5000, Currency::VES);
//! assert!(a.try_add(bs).is_err());
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Currency
// =============================================================================

/// A currency: ISO 4217 code plus the number of decimal places of its
/// minor unit.
///
/// ## Design Decisions
/// - **Copy**: three bytes of code + one exponent byte, cheap to pass by
///   value everywhere an amount goes
/// - **Closed set**: currencies come from the built-in table via
///   [`Currency::from_code`]; an unknown code is a deserialization error,
///   not a guess
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency {
    code: [u8; 3],
    exponent: u8,
}

impl Currency {
    /// United States dollar, 2 decimal places.
    pub const USD: Currency = Currency::from_parts(*b"USD", 2);
    /// Venezuelan bolívar, 2 decimal places.
    pub const VES: Currency = Currency::from_parts(*b"VES", 2);
    /// Euro, 2 decimal places.
    pub const EUR: Currency = Currency::from_parts(*b"EUR", 2);
    /// Colombian peso, 2 decimal places.
    pub const COP: Currency = Currency::from_parts(*b"COP", 2);
    /// Chilean peso, 0 decimal places (whole-unit currency).
    pub const CLP: Currency = Currency::from_parts(*b"CLP", 0);

    const KNOWN: [Currency; 5] = [
        Currency::USD,
        Currency::VES,
        Currency::EUR,
        Currency::COP,
        Currency::CLP,
    ];

    const fn from_parts(code: [u8; 3], exponent: u8) -> Self {
        Currency { code, exponent }
    }

    /// Looks up a currency by its ISO code.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Currency;
    ///
    /// assert_eq!(Currency::from_code("USD"), Some(Currency::USD));
    /// assert_eq!(Currency::from_code("XXX"), None);
    /// ```
    pub fn from_code(code: &str) -> Option<Currency> {
        Currency::KNOWN
            .iter()
            .copied()
            .find(|c| c.code() == code)
    }

    /// Returns the ISO code as a string slice.
    #[inline]
    pub fn code(&self) -> &str {
        // Codes come from the const table above and are always ASCII.
        std::str::from_utf8(&self.code).unwrap_or("???")
    }

    /// Returns the number of decimal places of the minor unit.
    #[inline]
    pub const fn decimal_places(&self) -> u8 {
        self.exponent
    }

    /// Minor units per whole unit (100 for USD, 1 for CLP).
    #[inline]
    pub const fn unit_scale(&self) -> i64 {
        // 10^exponent, exponents are 0..=4 in practice
        let mut scale = 1i64;
        let mut e = self.exponent;
        while e > 0 {
            scale *= 10;
            e -= 1;
        }
        scale
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Serializes as the bare ISO code ("USD").
impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Deserializes from an ISO code; unknown codes are an error, never a
/// zero-decimal guess.
impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Currency::from_code(&code)
            .ok_or_else(|| D::Error::custom(format!("unknown currency code '{code}'")))
    }
}

// =============================================================================
// CurrencyAmount
// =============================================================================

/// A monetary value in integer minor units, tagged with its currency.
///
/// ## Design Decisions
/// - **i64 minor units (signed)**: allows negative values for differences
///   and shortages
/// - **Currency tag travels with the value**: every arithmetic operation
///   checks the tag; cross-currency math without an explicit rate is a
///   [`CoreError::CurrencyMismatch`]
///
/// ## User Workflow Context
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────┐
/// │                  Where CurrencyAmount is Used                       │
/// │                                                                     │
/// │  cost ──► PricingEngine ──► sale price ──► document subtotal        │
/// │                                                                     │
/// │  subtotal ──► DocumentTaxCalculator ──► total ──► PaymentRecord     │
/// │                                                                     │
/// │  payments ──► CashSessionLedger ──► expected cash ──► closing       │
/// │                                                                     │
/// │  EVERY monetary value in the system flows through this type         │
/// └─────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyAmount {
    minor_units: i64,
    currency: Currency,
}

impl CurrencyAmount {
    /// Creates an amount from minor units (cents for USD).
    #[inline]
    pub const fn new(minor_units: i64, currency: Currency) -> Self {
        CurrencyAmount {
            minor_units,
            currency,
        }
    }

    /// Creates an amount from major and minor parts.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::{Currency, CurrencyAmount};
    ///
    /// let price = CurrencyAmount::from_major_minor(10, 99, Currency::USD);
    /// assert_eq!(price.minor_units(), 1099);
    /// ```
    pub const fn from_major_minor(major: i64, minor: i64, currency: Currency) -> Self {
        let scale = currency.unit_scale();
        let units = if major < 0 {
            major * scale - minor
        } else {
            major * scale + minor
        };
        CurrencyAmount::new(units, currency)
    }

    /// Zero in the given currency.
    #[inline]
    pub const fn zero(currency: Currency) -> Self {
        CurrencyAmount::new(0, currency)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        self.minor_units
    }

    /// Returns the currency tag.
    #[inline]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.minor_units > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        CurrencyAmount::new(self.minor_units.abs(), self.currency)
    }

    /// Errors unless `other` carries the same currency tag.
    fn require_same_currency(&self, other: &CurrencyAmount) -> CoreResult<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(CoreError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                found: other.currency.code().to_string(),
            })
        }
    }

    /// Checked same-currency addition.
    pub fn try_add(self, other: CurrencyAmount) -> CoreResult<CurrencyAmount> {
        self.require_same_currency(&other)?;
        let units = self
            .minor_units
            .checked_add(other.minor_units)
            .ok_or(CoreError::AmountOverflow)?;
        Ok(CurrencyAmount::new(units, self.currency))
    }

    /// Checked same-currency subtraction.
    pub fn try_sub(self, other: CurrencyAmount) -> CoreResult<CurrencyAmount> {
        self.require_same_currency(&other)?;
        let units = self
            .minor_units
            .checked_sub(other.minor_units)
            .ok_or(CoreError::AmountOverflow)?;
        Ok(CurrencyAmount::new(units, self.currency))
    }

    /// Multiplies by an integer quantity.
    pub fn multiply_quantity(self, qty: i64) -> CoreResult<CurrencyAmount> {
        let units = self
            .minor_units
            .checked_mul(qty)
            .ok_or(CoreError::AmountOverflow)?;
        Ok(CurrencyAmount::new(units, self.currency))
    }

    /// Applies a rate in basis points with half-up rounding.
    ///
    /// ## Implementation
    /// Integer math in i128: `(minor_units × bps + 5000) / 10000`.
    /// The +5000 rounds the half-minor-unit case up, matching how
    /// receipts are expected to round.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::{Currency, CurrencyAmount};
    ///
    /// let subtotal = CurrencyAmount::new(10_000, Currency::USD); // $100.00
    /// let tax = subtotal.apply_bps(1600);                        // 16%
    /// assert_eq!(tax.minor_units(), 1600);                       // $16.00
    /// ```
    pub fn apply_bps(&self, rate_bps: u32) -> CurrencyAmount {
        let units = (self.minor_units as i128 * rate_bps as i128 + 5000) / 10_000;
        CurrencyAmount::new(units as i64, self.currency)
    }

    /// Converts this amount through an explicit exchange rate.
    ///
    /// The only cross-currency path in the system. The rate's base must
    /// match this amount's currency.
    pub fn convert(&self, rate: &ExchangeRate) -> CoreResult<CurrencyAmount> {
        rate.apply(*self)
    }
}

/// Display shows `CODE major.minor` with the currency's own exponent.
///
/// This is for logs and debugging; UI formatting is a frontend concern.
impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = self.currency.unit_scale();
        if scale == 1 {
            return write!(f, "{} {}", self.currency.code(), self.minor_units);
        }
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.abs();
        write!(
            f,
            "{} {}{}.{:0width$}",
            self.currency.code(),
            sign,
            abs / scale,
            abs % scale,
            width = self.currency.decimal_places() as usize
        )
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// An explicit, timestamped exchange rate between two currencies.
///
/// ## Why Timestamped?
/// Parallel-market rates move intraday. Every stored conversion must be
/// auditable back to the rate that produced it, so the rate carries its
/// own `as_of` moment and the caller persists it alongside the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    base: Currency,
    quote: Currency,
    /// Quote units per base unit, in millionths (1_000_000 = 1.0).
    rate_micros: i64,
    as_of: DateTime<Utc>,
}

impl ExchangeRate {
    /// Creates a rate of `rate_micros / 1_000_000` quote units per base
    /// unit, observed at `as_of`.
    pub const fn new(
        base: Currency,
        quote: Currency,
        rate_micros: i64,
        as_of: DateTime<Utc>,
    ) -> Self {
        ExchangeRate {
            base,
            quote,
            rate_micros,
            as_of,
        }
    }

    #[inline]
    pub const fn base(&self) -> Currency {
        self.base
    }

    #[inline]
    pub const fn quote(&self) -> Currency {
        self.quote
    }

    #[inline]
    pub const fn rate_micros(&self) -> i64 {
        self.rate_micros
    }

    #[inline]
    pub const fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// Converts a base-currency amount into the quote currency, half-up.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::Utc;
    /// use till_core::money::{Currency, CurrencyAmount, ExchangeRate};
    ///
    /// // 36.50 VES per USD
    /// let rate = ExchangeRate::new(Currency::USD, Currency::VES, 36_500_000, Utc::now());
    /// let usd = CurrencyAmount::new(1000, Currency::USD); // $10.00
    ///
    /// let ves = rate.apply(usd).unwrap();
    /// assert_eq!(ves.minor_units(), 36_500); // Bs 365.00
    /// ```
    pub fn apply(&self, amount: CurrencyAmount) -> CoreResult<CurrencyAmount> {
        if amount.currency() != self.base {
            return Err(CoreError::RateMismatch {
                base: self.base.code().to_string(),
                quote: self.quote.code().to_string(),
                found: amount.currency().code().to_string(),
            });
        }

        // minor_base / scale_base * rate * scale_quote, all in i128
        let scale_base = self.base.unit_scale() as i128;
        let scale_quote = self.quote.unit_scale() as i128;
        let numerator = amount.minor_units() as i128 * self.rate_micros as i128 * scale_quote;
        let denominator = 1_000_000i128 * scale_base;
        let half = denominator / 2;
        let rounded = if numerator >= 0 {
            (numerator + half) / denominator
        } else {
            (numerator - half) / denominator
        };

        if rounded > i64::MAX as i128 || rounded < i64::MIN as i128 {
            return Err(CoreError::AmountOverflow);
        }
        Ok(CurrencyAmount::new(rounded as i64, self.quote))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
