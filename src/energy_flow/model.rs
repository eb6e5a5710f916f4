use crate::domain::{ControlMode, EnergyFlow};
use crate::optimizer::params::{Params, Period};

/// Computes the physically consistent energy flow of one period for the given
/// control mode and the stored energy at the start of the period.
///
/// All arithmetic is in integer [Wh]. The function never fails; the result
/// always satisfies the conservation equations:
///
/// ```text
/// grid + production_to_grid - grid_to_consumption - grid_to_ess       == 0
/// ess + production_to_ess - ess_to_consumption + grid_to_ess          == 0
/// production  == production_to_consumption + production_to_ess + production_to_grid
/// consumption == ess_to_consumption + grid_to_consumption + production_to_consumption
/// grid + ess + production - consumption                               == 0
/// ```
pub fn compute_flow(
    params: &Params,
    period: &Period,
    mode: ControlMode,
    ess_initial_energy: i64,
) -> EnergyFlow {
    let production = period.production;
    let consumption = period.consumption;
    let ess_initial = ess_initial_energy.max(0);

    // Per-mode ceiling on stored energy and target net ESS energy change.
    // CHARGE_GRID stops below full capacity and adds a grid-charge budget on
    // top of the delay-discharge behaviour.
    let surplus = consumption - production;
    let (ceiling, target) = match mode {
        ControlMode::Balancing => (params.ess_total_energy, surplus),
        ControlMode::DelayDischarge => (params.ess_total_energy, surplus.min(0)),
        ControlMode::ChargeGrid => (
            params.ess_max_soc_energy,
            surplus.min(0) - period.ess_charge_in_charge_grid,
        ),
    };

    let ess_max_discharge = (ess_initial - params.ess_min_soc_energy).max(0);
    let ess_max_charge = (ceiling - ess_initial).max(0);

    // Clamp order matters. The grid-import cap outranks the mode's own
    // charge/discharge intent and can force additional discharge; SoC bounds
    // apply before the hardware/regulatory rate bounds.
    let ess = target
        .max(consumption - production - period.max_buy_from_grid)
        .clamp(-ess_max_charge, ess_max_discharge)
        .clamp(-period.ess_max_charge_energy, period.ess_max_discharge_energy);

    let grid = consumption - production - ess;

    // Flow decomposition in fixed priority order; each line consumes what the
    // previous lines left over.
    let production_to_consumption = production.min(consumption);
    let production_to_ess = (-ess).min(production - production_to_consumption).max(0);
    let production_to_grid = (production - production_to_consumption - production_to_ess).max(0);
    let ess_to_consumption = (consumption - production_to_consumption)
        .min(ess - production_to_grid)
        .max(0);
    let grid_to_consumption =
        (consumption - ess_to_consumption - production_to_consumption).max(0);
    let grid_to_ess = grid - grid_to_consumption + production_to_grid;

    EnergyFlow {
        production,
        consumption,
        ess,
        grid,
        production_to_consumption,
        production_to_grid,
        production_to_ess,
        grid_to_consumption,
        ess_to_consumption,
        grid_to_ess,
    }
}
