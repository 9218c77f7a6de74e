quantity!(KilowattHourRate, suffix: "€/kWh", precision: 4);
quantity!(MegawattHourRate, suffix: "€/MWh", precision: 2);

impl MegawattHourRate {
    /// The same rate per kilowatt-hour.
    pub const fn per_kilowatt_hour(self) -> KilowattHourRate {
        KilowattHourRate(self.0 / 1000.0)
    }
}
