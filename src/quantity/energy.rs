use std::ops::{Div, Mul};

use chrono::TimeDelta;

use crate::quantity::{cost::Cost, power::Kilowatts, rate::KilowattHourRate};

quantity!(KilowattHours, suffix: "kWh", precision: 2);

impl Mul<KilowattHourRate> for KilowattHours {
    type Output = Cost;

    fn mul(self, rhs: KilowattHourRate) -> Self::Output {
        Cost(self.0 * rhs.0)
    }
}

impl Div<TimeDelta> for KilowattHours {
    type Output = Kilowatts;

    fn div(self, rhs: TimeDelta) -> Self::Output {
        let hours = rhs.as_seconds_f64() / 3600.0;
        Kilowatts(self.0 / hours)
    }
}
