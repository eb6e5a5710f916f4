use crate::domain::EnergyFlow;

/// Penalty on grid-charged energy: it is discharged later at a round-trip
/// loss, so buying it must be cheaper than this factor before it pays off.
pub const EFFICIENCY_FACTOR: f64 = 1.17;

/// Monetary cost of one period [price in currency/MWh].
///
/// Net export or a balanced grid costs nothing; export revenue is
/// deliberately not modelled as negative cost. Negative prices are floored to
/// zero: buying at a negative price is not rewarded, only not penalized.
pub fn cost(flow: &EnergyFlow, price: f64) -> f64 {
    if flow.grid <= 0 {
        return 0.0;
    }
    let price = price.max(0.0);
    flow.grid_to_consumption as f64 * price + flow.grid_to_ess as f64 * price * EFFICIENCY_FACTOR
}
