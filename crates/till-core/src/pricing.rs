//! # Pricing Engine
//!
//! Derives a sale price from a cost and a pricing strategy, computes
//! profitability metrics, and validates margin policy.
//!
//! ## The Two Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  MARKUP vs MARGIN                                                   │
//! │                                                                     │
//! │  Markup: percentage added ON TOP of cost                            │
//! │    price = cost × (1 + markup/100)                                  │
//! │    Cost $100 + 30% markup → $130.00                                 │
//! │                                                                     │
//! │  Margin: percentage of the SALE PRICE that is profit                │
//! │    price = cost / (1 − margin/100)                                  │
//! │    Cost $100 at 25% margin → $133.33                                │
//! │                                                                     │
//! │  Margin ≥ 100% divides by zero. That input is REJECTED with a       │
//! │  guard error, never clamped to 99.99%.                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All percentages travel as basis points (1 bps = 0.01%), so the whole
//! engine stays in integer arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::CurrencyAmount;
use crate::{EXCELLENT_MARGIN_BPS, MAX_MARGIN_BPS, MAX_MARKUP_BPS};

// =============================================================================
// Strategy Types
// =============================================================================

/// How a catalog entry derives its sale price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Price is set by hand; the engine never overrides it.
    Manual,
    /// Price = cost plus a percentage of cost.
    Markup,
    /// Price = cost divided so that a percentage of price is profit.
    Margin,
}

/// Psychological price-ending adjustment applied after the base formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsychologicalRounding {
    /// Keep the computed minor-unit value.
    None,
    /// Replace the fractional part with .99, keeping the integer part.
    P99,
    /// Replace the fractional part with .95.
    P95,
    /// Replace the fractional part with .90.
    P90,
    /// Round up to the next whole unit.
    RoundUp,
    /// Round down to the previous whole unit.
    RoundDown,
}

/// The pricing strategy owned by a catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingStrategy {
    pub mode: PricingMode,
    /// Markup percentage in basis points (3000 = 30%). Valid in
    /// `[0, 100_000]` (0% to 1000%).
    pub markup_bps: u32,
    /// Margin percentage in basis points (2500 = 25%). Valid in
    /// `[0, 10_000)`, strictly below 100%.
    pub margin_bps: u32,
    /// When false, the engine returns the manual price even in Markup
    /// or Margin mode.
    pub auto_calculate: bool,
    pub rounding: PsychologicalRounding,
    /// Last price entered by hand, used as the Manual-mode fallback.
    pub last_manual_price: Option<CurrencyAmount>,
}

impl PricingStrategy {
    /// A manual strategy with no automatic calculation.
    pub fn manual() -> Self {
        PricingStrategy {
            mode: PricingMode::Manual,
            markup_bps: 3000,
            margin_bps: 2500,
            auto_calculate: false,
            rounding: PsychologicalRounding::None,
            last_manual_price: None,
        }
    }

    /// An auto-calculating markup strategy.
    pub fn markup(markup_bps: u32) -> Self {
        PricingStrategy {
            mode: PricingMode::Markup,
            markup_bps,
            margin_bps: 2500,
            auto_calculate: true,
            rounding: PsychologicalRounding::None,
            last_manual_price: None,
        }
    }

    /// An auto-calculating margin strategy.
    pub fn margin(margin_bps: u32) -> Self {
        PricingStrategy {
            mode: PricingMode::Margin,
            markup_bps: 3000,
            margin_bps,
            auto_calculate: true,
            rounding: PsychologicalRounding::None,
            last_manual_price: None,
        }
    }
}

// =============================================================================
// Price Calculation
// =============================================================================

fn require_non_negative_cost(cost: CurrencyAmount) -> CoreResult<()> {
    if cost.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "cost".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Computes `cost × (1 + markup)`, rounded half-up to the minor unit.
///
/// ## Invariants
/// - `cost ≥ 0`
/// - `markup_bps ∈ [0, 100_000]` (0% to 1000%)
///
/// Out-of-range input is a validation failure, not a clamp.
///
/// ## Example
/// ```rust
/// use till_core::money::{Currency, CurrencyAmount};
/// use till_core::pricing::calculate_markup_price;
///
/// let cost = CurrencyAmount::new(10_000, Currency::USD); // $100.00
/// let price = calculate_markup_price(cost, 3000).unwrap(); // +30%
/// assert_eq!(price.minor_units(), 13_000); // $130.00
/// ```
pub fn calculate_markup_price(cost: CurrencyAmount, markup_bps: u32) -> CoreResult<CurrencyAmount> {
    require_non_negative_cost(cost)?;
    if markup_bps > MAX_MARKUP_BPS {
        return Err(ValidationError::OutOfRange {
            field: "markup percentage".to_string(),
            min: 0,
            max: MAX_MARKUP_BPS as i64,
        }
        .into());
    }

    let units = (cost.minor_units() as i128 * (10_000 + markup_bps as i128) + 5000) / 10_000;
    Ok(CurrencyAmount::new(units as i64, cost.currency()))
}

/// Computes `cost / (1 − margin)`, rounded half-up to the minor unit.
///
/// ## Invariants
/// - `cost ≥ 0`
/// - `margin_bps ∈ [0, 10_000)`: a margin of 100% or more would divide
///   by zero and is rejected with [`CoreError::MarginTooHigh`]
///
/// ## Example
/// ```rust
/// use till_core::money::{Currency, CurrencyAmount};
/// use till_core::pricing::calculate_margin_price;
///
/// let cost = CurrencyAmount::new(10_000, Currency::USD);
/// let price = calculate_margin_price(cost, 2500).unwrap(); // 25% margin
/// assert_eq!(price.minor_units(), 13_333); // $133.33
/// ```
pub fn calculate_margin_price(cost: CurrencyAmount, margin_bps: u32) -> CoreResult<CurrencyAmount> {
    require_non_negative_cost(cost)?;
    if margin_bps >= MAX_MARGIN_BPS {
        return Err(CoreError::MarginTooHigh { margin_bps });
    }

    let denominator = (MAX_MARGIN_BPS - margin_bps) as i128;
    let units = (cost.minor_units() as i128 * 10_000 + denominator / 2) / denominator;
    Ok(CurrencyAmount::new(units as i64, cost.currency()))
}

/// Dispatches on the strategy mode.
///
/// Manual mode (or `auto_calculate = false`) returns the manual price,
/// falling back to the strategy's last manual price, falling back to
/// cost itself. Markup/Margin modes delegate to the formulas above.
pub fn calculate_price(
    cost: CurrencyAmount,
    strategy: &PricingStrategy,
    manual_price: Option<CurrencyAmount>,
) -> CoreResult<CurrencyAmount> {
    validate_pricing_strategy(strategy)?;

    if strategy.mode == PricingMode::Manual || !strategy.auto_calculate {
        let price = manual_price.or(strategy.last_manual_price).unwrap_or(cost);
        if price.currency() != cost.currency() {
            return Err(CoreError::CurrencyMismatch {
                expected: cost.currency().code().to_string(),
                found: price.currency().code().to_string(),
            });
        }
        return Ok(price);
    }

    match strategy.mode {
        PricingMode::Markup => calculate_markup_price(cost, strategy.markup_bps),
        PricingMode::Margin => calculate_margin_price(cost, strategy.margin_bps),
        // Unreachable: Manual handled above, kept for exhaustiveness
        PricingMode::Manual => Ok(manual_price.unwrap_or(cost)),
    }
}

/// [`calculate_price`] followed by the strategy's psychological rounding.
pub fn calculate_price_with_rounding(
    cost: CurrencyAmount,
    strategy: &PricingStrategy,
    manual_price: Option<CurrencyAmount>,
) -> CoreResult<CurrencyAmount> {
    let base = calculate_price(cost, strategy, manual_price)?;
    Ok(apply_psychological_rounding(base, strategy.rounding))
}

/// Applies a price-ending adjustment.
///
/// `P99`/`P95`/`P90` preserve the integer part and pin the fractional
/// part; for a whole-unit currency (scale 1) they are a no-op because
/// there is no fractional part to pin. `RoundUp`/`RoundDown` snap to
/// whole units.
pub fn apply_psychological_rounding(
    price: CurrencyAmount,
    mode: PsychologicalRounding,
) -> CurrencyAmount {
    let scale = price.currency().unit_scale();
    let units = price.minor_units();

    let adjusted = match mode {
        PsychologicalRounding::None => units,
        PsychologicalRounding::RoundUp => units.div_euclid(scale) * scale
            + if units.rem_euclid(scale) > 0 { scale } else { 0 },
        PsychologicalRounding::RoundDown => units.div_euclid(scale) * scale,
        PsychologicalRounding::P99 => units.div_euclid(scale) * scale + scale * 99 / 100,
        PsychologicalRounding::P95 => units.div_euclid(scale) * scale + scale * 95 / 100,
        PsychologicalRounding::P90 => units.div_euclid(scale) * scale + scale * 90 / 100,
    };

    CurrencyAmount::new(adjusted, price.currency())
}

// =============================================================================
// Profitability Metrics
// =============================================================================

/// Profit and percentage metrics for a cost/price pair.
///
/// The percentages are display metrics (f64); all stored money stays in
/// integer minor units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitMetrics {
    pub profit: CurrencyAmount,
    /// `profit / cost × 100`; zero when cost is zero.
    pub markup_pct: f64,
    /// `profit / price × 100`; zero when price is zero.
    pub margin_pct: f64,
}

/// Computes profit, markup % and margin % for a cost/price pair.
pub fn profit_metrics(cost: CurrencyAmount, price: CurrencyAmount) -> CoreResult<ProfitMetrics> {
    let profit = price.try_sub(cost)?;

    let markup_pct = if cost.is_zero() {
        0.0
    } else {
        profit.minor_units() as f64 / cost.minor_units() as f64 * 100.0
    };
    let margin_pct = if price.is_zero() {
        0.0
    } else {
        profit.minor_units() as f64 / price.minor_units() as f64 * 100.0
    };

    Ok(ProfitMetrics {
        profit,
        markup_pct,
        margin_pct,
    })
}

// =============================================================================
// Strategy & Margin Validation
// =============================================================================

/// Validates the percentage ranges of a pricing strategy.
///
/// The same ranges the calculation functions enforce, checked up front so
/// a stored strategy fails loudly on save rather than on first use.
pub fn validate_pricing_strategy(strategy: &PricingStrategy) -> CoreResult<()> {
    if strategy.markup_bps > MAX_MARKUP_BPS {
        return Err(ValidationError::OutOfRange {
            field: "markup percentage".to_string(),
            min: 0,
            max: MAX_MARKUP_BPS as i64,
        }
        .into());
    }
    if strategy.mode == PricingMode::Margin && strategy.margin_bps >= MAX_MARGIN_BPS {
        return Err(CoreError::MarginTooHigh {
            margin_bps: strategy.margin_bps,
        });
    }
    Ok(())
}

/// Margin policy thresholds, threaded explicitly into each validation
/// call; there is no module-level mutable default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginPolicy {
    /// Margins below this are Critical.
    pub minimum_margin_bps: u32,
    /// Margins below this (but at or above the minimum) are Warning.
    pub warn_threshold_bps: u32,
    /// When true, a Critical margin should block the save.
    pub enforce: bool,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        MarginPolicy {
            minimum_margin_bps: 2000, // 20%
            warn_threshold_bps: 3000, // 30%
            enforce: false,
        }
    }
}

/// Qualitative band for a computed margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginLevel {
    /// Below the policy minimum.
    Critical,
    /// Above the minimum but below the warning threshold.
    Warning,
    /// Healthy margin.
    Good,
    /// At or above [`EXCELLENT_MARGIN_BPS`].
    Excellent,
}

/// Result of checking a cost/price pair against a margin policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginAssessment {
    pub is_valid: bool,
    pub margin_pct: f64,
    pub level: MarginLevel,
    /// True only when the policy enforces and the margin is Critical.
    pub should_block: bool,
}

/// Checks a cost/price pair against an explicit margin policy.
pub fn validate_profit_margin(
    cost: CurrencyAmount,
    price: CurrencyAmount,
    policy: &MarginPolicy,
) -> CoreResult<MarginAssessment> {
    let metrics = profit_metrics(cost, price)?;
    let margin_bps = (metrics.margin_pct * 100.0).round() as i64;

    let level = if margin_bps < policy.minimum_margin_bps as i64 {
        MarginLevel::Critical
    } else if margin_bps < policy.warn_threshold_bps as i64 {
        MarginLevel::Warning
    } else if margin_bps < EXCELLENT_MARGIN_BPS as i64 {
        MarginLevel::Good
    } else {
        MarginLevel::Excellent
    };

    let is_valid = level != MarginLevel::Critical;
    Ok(MarginAssessment {
        is_valid,
        margin_pct: metrics.margin_pct,
        level,
        should_block: policy.enforce && !is_valid,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn usd(minor: i64) -> CurrencyAmount {
        CurrencyAmount::new(minor, Currency::USD)
    }

    #[test]
    fn test_markup_price_formula() {
        // $100.00 + 30% = $130.00
        assert_eq!(
            calculate_markup_price(usd(10_000), 3000).unwrap().minor_units(),
            13_000
        );
        // Zero markup is identity
        assert_eq!(
            calculate_markup_price(usd(10_000), 0).unwrap().minor_units(),
            10_000
        );
        // 1000% is the inclusive maximum
        assert_eq!(
            calculate_markup_price(usd(100), 100_000).unwrap().minor_units(),
            1100
        );
    }

    #[test]
    fn test_markup_rejects_out_of_range() {
        assert!(calculate_markup_price(usd(10_000), 100_001).is_err());
        assert!(calculate_markup_price(usd(-1), 3000).is_err());
    }

    #[test]
    fn test_margin_price_formula() {
        // $100.00 at 25% margin = $133.33
        assert_eq!(
            calculate_margin_price(usd(10_000), 2500).unwrap().minor_units(),
            13_333
        );
        // 50% margin doubles the cost
        assert_eq!(
            calculate_margin_price(usd(10_000), 5000).unwrap().minor_units(),
            20_000
        );
    }

    #[test]
    fn test_margin_at_or_above_100_rejected_not_clamped() {
        let err = calculate_margin_price(usd(10_000), 10_000).unwrap_err();
        assert!(matches!(err, CoreError::MarginTooHigh { .. }));
        assert!(err.to_string().contains("must be below 100"));

        assert!(calculate_margin_price(usd(10_000), 15_000).is_err());
        // 99.99% is still legal
        assert!(calculate_margin_price(usd(10_000), 9999).is_ok());
    }

    #[test]
    fn test_calculate_price_dispatch() {
        let cost = usd(10_000);

        let manual = PricingStrategy::manual();
        assert_eq!(
            calculate_price(cost, &manual, Some(usd(12_500))).unwrap(),
            usd(12_500)
        );
        // Falls back to cost when no manual price exists
        assert_eq!(calculate_price(cost, &manual, None).unwrap(), cost);

        let markup = PricingStrategy::markup(3000);
        assert_eq!(calculate_price(cost, &markup, None).unwrap(), usd(13_000));

        // auto_calculate=false wins over the mode
        let mut frozen = PricingStrategy::markup(3000);
        frozen.auto_calculate = false;
        frozen.last_manual_price = Some(usd(11_111));
        assert_eq!(calculate_price(cost, &frozen, None).unwrap(), usd(11_111));
    }

    #[test]
    fn test_psychological_rounding() {
        let price = usd(12_743); // $127.43

        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::P99).minor_units(),
            12_799
        );
        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::P95).minor_units(),
            12_795
        );
        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::P90).minor_units(),
            12_790
        );
        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::RoundUp).minor_units(),
            12_800
        );
        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::RoundDown).minor_units(),
            12_700
        );
        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::None).minor_units(),
            12_743
        );
    }

    #[test]
    fn test_psychological_rounding_whole_unit_currency() {
        // CLP has no fractional part; P99 has nothing to pin
        let price = CurrencyAmount::new(1425, Currency::CLP);
        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::P99),
            price
        );
        assert_eq!(
            apply_psychological_rounding(price, PsychologicalRounding::RoundUp),
            price
        );
    }

    #[test]
    fn test_profit_metrics_and_zero_guards() {
        let metrics = profit_metrics(usd(10_000), usd(13_000)).unwrap();
        assert_eq!(metrics.profit.minor_units(), 3000);
        assert!((metrics.markup_pct - 30.0).abs() < 1e-9);
        assert!((metrics.margin_pct - 23.076923).abs() < 1e-3);

        // cost = 0 → markup 0, price = 0 → margin 0
        assert_eq!(profit_metrics(usd(0), usd(1000)).unwrap().markup_pct, 0.0);
        assert_eq!(profit_metrics(usd(1000), usd(0)).unwrap().margin_pct, 0.0);
    }

    #[test]
    fn test_markup_round_trips_through_metrics() {
        // Property from the engine contract: deriving a price from a
        // markup and reading the markup back agrees within 0.01.
        for markup_bps in [500u32, 1500, 3000, 7500, 20_000] {
            let cost = usd(12_345);
            let price = calculate_markup_price(cost, markup_bps).unwrap();
            let metrics = profit_metrics(cost, price).unwrap();
            let expected = markup_bps as f64 / 100.0;
            assert!(
                (metrics.markup_pct - expected).abs() < 0.01,
                "markup {markup_bps} bps round-tripped to {}",
                metrics.markup_pct
            );
        }
    }

    #[test]
    fn test_validate_profit_margin_levels() {
        let policy = MarginPolicy {
            minimum_margin_bps: 2000,
            warn_threshold_bps: 3000,
            enforce: true,
        };

        // 13% margin → Critical, blocked under enforce
        let critical = validate_profit_margin(usd(10_000), usd(11_500), &policy).unwrap();
        assert_eq!(critical.level, MarginLevel::Critical);
        assert!(!critical.is_valid);
        assert!(critical.should_block);

        // 25% margin → Warning
        let warning = validate_profit_margin(usd(10_000), usd(13_333), &policy).unwrap();
        assert_eq!(warning.level, MarginLevel::Warning);
        assert!(warning.is_valid);
        assert!(!warning.should_block);

        // 33% margin → Good
        let good = validate_profit_margin(usd(10_000), usd(15_000), &policy).unwrap();
        assert_eq!(good.level, MarginLevel::Good);

        // 50% margin → Excellent
        let excellent = validate_profit_margin(usd(10_000), usd(20_000), &policy).unwrap();
        assert_eq!(excellent.level, MarginLevel::Excellent);
    }

    #[test]
    fn test_validate_strategy_rejects_bad_ranges() {
        let mut strategy = PricingStrategy::markup(100_001);
        assert!(validate_pricing_strategy(&strategy).is_err());

        strategy = PricingStrategy::margin(10_000);
        assert!(validate_pricing_strategy(&strategy).is_err());

        strategy = PricingStrategy::margin(9999);
        assert!(validate_pricing_strategy(&strategy).is_ok());
    }
}
