// Reading domain model - raw device record and its normalized reading set
use super::sensor::SensorKey;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One decoded monitoring frame, still in integer-scaled device units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawReading {
    /// Device uptime in hundredths of a second.
    pub timestamp: u32,
    pub is_firing: bool,
    pub is_charging: bool,
    pub is_celsius: bool,
    pub battery1: u8,
    pub battery2: u8,
    pub battery3: u8,
    /// Tenths of a watt.
    pub power_set: u16,
    pub temperature_set: u16,
    pub temperature: u16,
    /// Hundredths of a volt.
    pub output_voltage: u16,
    /// Hundredths of an ampere.
    pub output_current: u16,
    /// Thousandths of an ohm.
    pub resistance: u16,
    pub real_resistance: u16,
    pub board_temperature: u8,
}

/// Complete set of sensor values for one tick. Every key is always present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingSet {
    values: [f64; SensorKey::ALL.len()],
}

impl ReadingSet {
    pub fn get(&self, key: SensorKey) -> f64 {
        self.values[key as usize]
    }

    pub fn is_celsius(&self) -> bool {
        self.get(SensorKey::IsCelcius) > 0.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorKey, f64)> + '_ {
        SensorKey::ALL.iter().map(move |key| (*key, self.get(*key)))
    }

    fn set(&mut self, key: SensorKey, value: f64) {
        self.values[key as usize] = value;
    }
}

impl Default for ReadingSet {
    fn default() -> Self {
        Self {
            values: [0.0; SensorKey::ALL.len()],
        }
    }
}

impl Serialize for ReadingSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key.as_str(), &value)?;
        }
        map.end()
    }
}

/// Cell voltage in volts; a zero code means the cell slot is empty.
pub fn cell_voltage(raw: u8) -> f64 {
    if raw == 0 {
        0.0
    } else {
        (raw as f64 + 275.0) / 100.0
    }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

pub fn normalize(raw: &RawReading) -> ReadingSet {
    let battery1 = cell_voltage(raw.battery1);
    let battery2 = cell_voltage(raw.battery2);
    let battery3 = cell_voltage(raw.battery3);

    let output_voltage = raw.output_voltage as f64 / 100.0;
    let output_current = raw.output_current as f64 / 100.0;

    let mut set = ReadingSet::default();
    set.set(SensorKey::Timestamp, raw.timestamp as f64 / 100.0);
    set.set(SensorKey::IsFiring, flag(raw.is_firing));
    set.set(SensorKey::IsCharging, flag(raw.is_charging));
    set.set(SensorKey::IsCelcius, flag(raw.is_celsius));
    set.set(SensorKey::Battery1, battery1);
    set.set(SensorKey::Battery2, battery2);
    set.set(SensorKey::Battery3, battery3);
    set.set(SensorKey::BatteryPack, battery1 + battery2 + battery3);
    set.set(SensorKey::Power, output_voltage * output_current);
    set.set(SensorKey::PowerSet, raw.power_set as f64 / 10.0);
    set.set(SensorKey::TemperatureSet, raw.temperature_set as f64);
    set.set(SensorKey::Temperature, raw.temperature as f64);
    set.set(SensorKey::OutputVoltage, output_voltage);
    set.set(SensorKey::OutputCurrent, output_current);
    set.set(SensorKey::Resistance, raw.resistance as f64 / 1000.0);
    set.set(SensorKey::RealResistance, raw.real_resistance as f64 / 1000.0);
    set.set(SensorKey::BoardTemperature, raw.board_temperature as f64);
    set
}
