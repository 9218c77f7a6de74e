//! Power-dependent efficiency model shared by the planner, the simulator, and
//! the rating search, so all three agree on the physics.

use crate::{
    error::Error,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

/// Efficiencies are meaningless outside this band; everything is clamped into it.
const EFFICIENCY_BAND: (f64, f64) = (0.5, 0.999);

/// Battery round-trip slope against the summed C-rates, percent per unit.
const RTE_SLOPE: f64 = -2.0;

/// Inverter hardware presets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum InverterPreset {
    /// Three-phase unit, 11 kW charge / 15 kW discharge.
    ThreePhase,

    /// Single-phase unit, 3.7 kW charge / 5 kW discharge, with inverter
    /// losses three times those of the three-phase unit.
    SinglePhase,
}

impl InverterPreset {
    pub const fn max_charge_power(self) -> Kilowatts {
        match self {
            Self::ThreePhase => Kilowatts(11.0),
            Self::SinglePhase => Kilowatts(3.7),
        }
    }

    pub const fn max_discharge_power(self) -> Kilowatts {
        match self {
            Self::ThreePhase => Kilowatts(15.0),
            Self::SinglePhase => Kilowatts(5.0),
        }
    }

    /// Inverter efficiency loss per DC watt.
    const fn loss_slope(self) -> f64 {
        match self {
            Self::ThreePhase => 8.0e-7,
            Self::SinglePhase => 2.4e-6,
        }
    }

    const CHARGE_BASE: f64 = 0.975;
    const DISCHARGE_BASE: f64 = 0.97;

    fn inverter_charge_efficiency(self, power: Kilowatts) -> f64 {
        clamp_efficiency(Self::CHARGE_BASE - self.loss_slope() * power.0 * 1000.0)
    }

    fn inverter_discharge_efficiency(self, power: Kilowatts) -> f64 {
        clamp_efficiency(Self::DISCHARGE_BASE - self.loss_slope() * power.0 * 1000.0)
    }
}

fn clamp_efficiency(value: f64) -> f64 {
    value.clamp(EFFICIENCY_BAND.0, EFFICIENCY_BAND.1)
}

/// The efficiency figures for one choice of power ratings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EfficiencyBundle {
    pub inverter_charge: f64,
    pub inverter_discharge: f64,
    pub battery_round_trip: f64,
    pub battery_one_way: f64,
    pub c_rate_charge: f64,
    pub c_rate_discharge: f64,
}

impl EfficiencyBundle {
    pub fn derive(
        preset: InverterPreset,
        charge_power: Kilowatts,
        discharge_power: Kilowatts,
        capacity: KilowattHours,
    ) -> Result<Self, Error> {
        if capacity <= KilowattHours::ZERO {
            return Err(Error::invalid(format!("non-positive capacity {capacity}")));
        }
        if charge_power < Kilowatts::ZERO || discharge_power < Kilowatts::ZERO {
            return Err(Error::invalid(format!(
                "negative power rating ({charge_power}, {discharge_power})"
            )));
        }
        let c_rate_charge = charge_power.0 / capacity.0;
        let c_rate_discharge = discharge_power.0 / capacity.0;
        let battery_round_trip =
            clamp_efficiency(1.0 + RTE_SLOPE * (c_rate_charge + c_rate_discharge) / 100.0);
        Ok(Self {
            inverter_charge: preset.inverter_charge_efficiency(charge_power),
            inverter_discharge: preset.inverter_discharge_efficiency(discharge_power),
            battery_round_trip,
            battery_one_way: clamp_efficiency(battery_round_trip.sqrt()),
            c_rate_charge,
            c_rate_discharge,
        })
    }

    /// AC-to-DC efficiency of a complete charge path.
    pub fn charge_total(&self) -> f64 {
        self.inverter_charge * self.battery_one_way
    }

    /// DC-to-AC efficiency of a complete discharge path.
    pub fn discharge_total(&self) -> f64 {
        self.inverter_discharge * self.battery_one_way
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let derive = || {
            EfficiencyBundle::derive(
                InverterPreset::ThreePhase,
                Kilowatts(5.0),
                Kilowatts(5.0),
                KilowattHours(10.0),
            )
            .unwrap()
        };
        assert_eq!(derive(), derive());
    }

    #[test]
    fn round_trip_falls_with_c_rate() {
        let capacity = KilowattHours(10.0);
        let slow = EfficiencyBundle::derive(
            InverterPreset::ThreePhase,
            Kilowatts(2.0),
            Kilowatts(2.0),
            capacity,
        )
        .unwrap();
        let fast = EfficiencyBundle::derive(
            InverterPreset::ThreePhase,
            Kilowatts(10.0),
            Kilowatts(10.0),
            capacity,
        )
        .unwrap();
        assert!(fast.battery_round_trip < slow.battery_round_trip);
        assert_abs_diff_eq!(slow.battery_one_way, slow.battery_round_trip.sqrt());
    }

    #[test]
    fn single_phase_loses_three_times_as_much() {
        let power = Kilowatts(3.0);
        let capacity = KilowattHours(10.0);
        let three =
            EfficiencyBundle::derive(InverterPreset::ThreePhase, power, power, capacity).unwrap();
        let single =
            EfficiencyBundle::derive(InverterPreset::SinglePhase, power, power, capacity).unwrap();
        let three_loss = InverterPreset::CHARGE_BASE - three.inverter_charge;
        let single_loss = InverterPreset::CHARGE_BASE - single.inverter_charge;
        assert_abs_diff_eq!(single_loss, 3.0 * three_loss, epsilon = 1e-12);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(
            EfficiencyBundle::derive(
                InverterPreset::ThreePhase,
                Kilowatts(1.0),
                Kilowatts(1.0),
                KilowattHours::ZERO,
            )
            .is_err()
        );
        assert!(
            EfficiencyBundle::derive(
                InverterPreset::ThreePhase,
                Kilowatts(-1.0),
                Kilowatts(1.0),
                KilowattHours(10.0),
            )
            .is_err()
        );
    }

    #[test]
    fn efficiencies_stay_in_band() {
        let bundle = EfficiencyBundle::derive(
            InverterPreset::SinglePhase,
            Kilowatts(3.7),
            Kilowatts(5.0),
            KilowattHours(0.5),
        )
        .unwrap();
        for value in [
            bundle.inverter_charge,
            bundle.inverter_discharge,
            bundle.battery_round_trip,
            bundle.battery_one_way,
        ] {
            assert!((0.5..=0.999).contains(&value), "{value} out of band");
        }
    }
}
