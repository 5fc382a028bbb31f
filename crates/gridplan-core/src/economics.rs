//! Investment economics shared by the master formulation
//!
//! Investment costs are annualized with the capital recovery factor over the
//! asset lifetime and then discounted to present value year by year for every
//! year a stage covers.

/// Capital Recovery Factor for annualizing investment costs
///
/// CRF = r(1+r)^n / ((1+r)^n - 1)
///
/// where r = interest rate, n = asset lifetime in years
pub fn capital_recovery_factor(rate: f64, life_years: usize) -> f64 {
    let n = life_years.max(1) as f64;
    if rate < 1e-10 {
        // No discounting
        1.0 / n
    } else {
        rate * (1.0 + rate).powf(n) / ((1.0 + rate).powf(n) - 1.0)
    }
}

/// Present-worth factor of one stage
///
/// Sum of the discount factors `(1+r)^-(t·Y + y + 1)` for every year `y` of
/// stage `t`, where `Y` is the number of years per stage. Multiplying an
/// annual cost by this factor gives its present value over the stage.
pub fn stage_present_worth(rate: f64, stage: usize, years_per_stage: usize) -> f64 {
    (0..years_per_stage)
        .map(|y| (1.0 + rate).powi(-((stage * years_per_stage + y + 1) as i32)))
        .sum()
}
