//! Physical battery model: state of charge plus the charge/discharge
//! primitives that enforce power, capacity, and SoC-window limits.

use chrono::TimeDelta;

use crate::{
    error::Error,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

#[derive(Copy, Clone, Debug)]
pub struct BatteryConfig {
    pub capacity: KilowattHours,

    /// Maximum DC charging power.
    pub charge_power: Kilowatts,

    /// Maximum DC discharging power.
    pub discharge_power: Kilowatts,

    /// One-way AC→DC efficiency of the complete charge path.
    pub charge_efficiency: f64,

    /// One-way DC→AC efficiency of the complete discharge path.
    pub discharge_efficiency: f64,

    /// SoC window as fractions of the capacity.
    pub min_soc: f64,
    pub max_soc: f64,
}

impl BatteryConfig {
    pub fn try_new(
        capacity: KilowattHours,
        charge_power: Kilowatts,
        discharge_power: Kilowatts,
        charge_efficiency: f64,
        discharge_efficiency: f64,
        min_soc: f64,
        max_soc: f64,
    ) -> Result<Self, Error> {
        if !capacity.0.is_finite() || capacity < KilowattHours::ZERO {
            return Err(Error::invalid(format!("capacity {capacity} must be finite and ≥ 0")));
        }
        if charge_power < Kilowatts::ZERO || discharge_power < Kilowatts::ZERO {
            return Err(Error::invalid(format!(
                "power ratings ({charge_power}, {discharge_power}) must be ≥ 0"
            )));
        }
        for (name, efficiency) in
            [("charge", charge_efficiency), ("discharge", discharge_efficiency)]
        {
            if !(efficiency > 0.5 && efficiency <= 1.0) {
                return Err(Error::invalid(format!(
                    "{name} efficiency {efficiency} must be in (0.5, 1]"
                )));
            }
        }
        if !(0.0..=1.0).contains(&min_soc) || !(0.0..=1.0).contains(&max_soc) || min_soc >= max_soc
        {
            return Err(Error::invalid(format!(
                "SoC window [{min_soc}, {max_soc}] must satisfy 0 ≤ min < max ≤ 1"
            )));
        }
        Ok(Self {
            capacity,
            charge_power,
            discharge_power,
            charge_efficiency,
            discharge_efficiency,
            min_soc,
            max_soc,
        })
    }

    pub fn min_energy(&self) -> KilowattHours {
        self.capacity * self.min_soc
    }

    pub fn max_energy(&self) -> KilowattHours {
        self.capacity * self.max_soc
    }
}

/// The DC energy moved through the battery and the AC energy exchanged with
/// the grid by one primitive operation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Exchange {
    pub dc: KilowattHours,
    pub ac: KilowattHours,
}

impl Default for Exchange {
    fn default() -> Self {
        Self { dc: KilowattHours::ZERO, ac: KilowattHours::ZERO }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct BatteryState {
    config: BatteryConfig,
    soc: KilowattHours,
}

impl BatteryState {
    /// The initial SoC may start outside the window; the first operation that
    /// can move it toward the window does so without fault.
    pub const fn new(config: BatteryConfig, initial_soc: KilowattHours) -> Self {
        Self { config, soc: initial_soc }
    }

    pub const fn soc(&self) -> KilowattHours {
        self.soc
    }

    pub const fn config(&self) -> &BatteryConfig {
        &self.config
    }

    /// Move up to `requested_dc` into the battery, clipped by the power
    /// rating and the SoC ceiling. Returns the DC moved and the AC drawn.
    pub fn charge(&mut self, requested_dc: KilowattHours, duration: TimeDelta) -> Exchange {
        let headroom = self.config.max_energy() - self.soc;
        let dc = requested_dc
            .min(self.config.charge_power * duration)
            .min(headroom)
            .max(KilowattHours::ZERO);
        self.soc += dc;
        Exchange { dc, ac: dc / self.config.charge_efficiency }
    }

    /// Move up to `requested_dc` out of the battery, clipped by the power
    /// rating and the SoC floor. Returns the DC moved and the AC delivered.
    pub fn discharge(&mut self, requested_dc: KilowattHours, duration: TimeDelta) -> Exchange {
        let available = self.soc - self.config.min_energy();
        let dc = requested_dc
            .min(self.config.discharge_power * duration)
            .min(available)
            .max(KilowattHours::ZERO);
        self.soc -= dc;
        Exchange { dc, ac: dc * self.config.discharge_efficiency }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn config() -> BatteryConfig {
        BatteryConfig::try_new(
            KilowattHours(10.0),
            Kilowatts(5.0),
            Kilowatts(5.0),
            0.9,
            0.9,
            0.1,
            0.9,
        )
        .unwrap()
    }

    #[test]
    fn rejects_inverted_soc_window() {
        let result = BatteryConfig::try_new(
            KilowattHours(10.0),
            Kilowatts(5.0),
            Kilowatts(5.0),
            0.9,
            0.9,
            0.9,
            0.1,
        );
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn charge_is_limited_by_power() {
        let mut battery = BatteryState::new(config(), KilowattHours(1.0));
        let exchange = battery.charge(KilowattHours(100.0), TimeDelta::hours(1));
        assert_eq!(exchange.dc, KilowattHours(5.0));
        assert_abs_diff_eq!(exchange.ac.0, 5.0 / 0.9);
        assert_eq!(battery.soc(), KilowattHours(6.0));
    }

    #[test]
    fn charge_is_limited_by_the_soc_ceiling() {
        let mut battery = BatteryState::new(config(), KilowattHours(8.0));
        let exchange = battery.charge(KilowattHours(5.0), TimeDelta::hours(1));
        assert_eq!(exchange.dc, KilowattHours(1.0));
        assert_eq!(battery.soc(), KilowattHours(9.0));
    }

    #[test]
    fn discharge_is_limited_by_the_soc_floor() {
        let mut battery = BatteryState::new(config(), KilowattHours(2.0));
        let exchange = battery.discharge(KilowattHours(5.0), TimeDelta::hours(1));
        assert_eq!(exchange.dc, KilowattHours(1.0));
        assert_abs_diff_eq!(exchange.ac.0, 0.9);
        assert_eq!(battery.soc(), KilowattHours(1.0));
    }

    #[test]
    fn quarter_hour_scales_the_power_limit() {
        let mut battery = BatteryState::new(config(), KilowattHours(1.0));
        let exchange = battery.charge(KilowattHours(100.0), TimeDelta::minutes(15));
        assert_eq!(exchange.dc, KilowattHours(1.25));
    }

    #[test]
    fn zero_request_is_idempotent() {
        let mut battery = BatteryState::new(config(), KilowattHours(5.0));
        let exchange = battery.charge(KilowattHours::ZERO, TimeDelta::hours(1));
        assert_eq!(exchange, Exchange::default());
        assert_eq!(battery.soc(), KilowattHours(5.0));
    }

    #[test]
    fn charge_is_monotone_in_the_request() {
        let base = BatteryState::new(config(), KilowattHours(3.0));
        let mut previous = KilowattHours::ZERO;
        for request in [0.0, 1.0, 2.0, 4.0, 8.0, 16.0] {
            let mut battery = base;
            let exchange = battery.charge(KilowattHours(request), TimeDelta::hours(1));
            assert!(exchange.dc >= previous);
            previous = exchange.dc;
        }
    }

    #[test]
    fn initial_soc_above_the_window_discharges_toward_it() {
        let mut battery = BatteryState::new(config(), KilowattHours(9.5));
        let charge = battery.charge(KilowattHours(1.0), TimeDelta::hours(1));
        assert_eq!(charge.dc, KilowattHours::ZERO);
        let discharge = battery.discharge(KilowattHours(5.0), TimeDelta::hours(1));
        assert_eq!(discharge.dc, KilowattHours(5.0));
        assert_eq!(battery.soc(), KilowattHours(4.5));
    }

    #[test]
    fn soc_stays_inside_the_window() {
        let mut battery = BatteryState::new(config(), KilowattHours(5.0));
        for step in 0..100 {
            if step % 3 == 0 {
                battery.charge(KilowattHours(7.0), TimeDelta::hours(1));
            } else {
                battery.discharge(KilowattHours(4.0), TimeDelta::hours(1));
            }
            assert!(battery.soc() >= battery.config().min_energy());
            assert!(battery.soc() <= battery.config().max_energy());
        }
    }
}
