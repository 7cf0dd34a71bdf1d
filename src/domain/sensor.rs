// Sensor catalogue - fixed key set and per-sensor display profile
use super::interpolation::{InterpolationLimits, ValueLimit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every key a reading set carries, in the order the device monitor presents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensorKey {
    Timestamp,
    IsFiring,
    IsCharging,
    IsCelcius,
    #[serde(rename = "Battery1Voltage")]
    Battery1,
    #[serde(rename = "Battery2Voltage")]
    Battery2,
    #[serde(rename = "Battery3Voltage")]
    Battery3,
    BatteryPack,
    Power,
    PowerSet,
    TemperatureSet,
    Temperature,
    #[serde(rename = "OutputVolts")]
    OutputVoltage,
    OutputCurrent,
    Resistance,
    RealResistance,
    BoardTemperature,
}

impl SensorKey {
    pub const ALL: [SensorKey; 17] = [
        SensorKey::Timestamp,
        SensorKey::IsFiring,
        SensorKey::IsCharging,
        SensorKey::IsCelcius,
        SensorKey::Battery1,
        SensorKey::Battery2,
        SensorKey::Battery3,
        SensorKey::BatteryPack,
        SensorKey::Power,
        SensorKey::PowerSet,
        SensorKey::TemperatureSet,
        SensorKey::Temperature,
        SensorKey::OutputVoltage,
        SensorKey::OutputCurrent,
        SensorKey::Resistance,
        SensorKey::RealResistance,
        SensorKey::BoardTemperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKey::Timestamp => "Timestamp",
            SensorKey::IsFiring => "IsFiring",
            SensorKey::IsCharging => "IsCharging",
            SensorKey::IsCelcius => "IsCelcius",
            SensorKey::Battery1 => "Battery1Voltage",
            SensorKey::Battery2 => "Battery2Voltage",
            SensorKey::Battery3 => "Battery3Voltage",
            SensorKey::BatteryPack => "BatteryPack",
            SensorKey::Power => "Power",
            SensorKey::PowerSet => "PowerSet",
            SensorKey::TemperatureSet => "TemperatureSet",
            SensorKey::Temperature => "Temperature",
            SensorKey::OutputVoltage => "OutputVolts",
            SensorKey::OutputCurrent => "OutputCurrent",
            SensorKey::Resistance => "Resistance",
            SensorKey::RealResistance => "RealResistance",
            SensorKey::BoardTemperature => "BoardTemperature",
        }
    }

    /// Plotted sensors own a series; the timestamp and flags do not.
    pub fn is_plotted(&self) -> bool {
        profile(*self).is_some()
    }
}

impl fmt::Display for SensorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown sensor key: {0}")]
pub struct UnknownSensor(pub String);

impl FromStr for SensorKey {
    type Err = UnknownSensor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownSensor(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Volt,
    Watt,
    Ampere,
    Ohm,
    /// Celsius or Fahrenheit depending on the device setting of the current tick.
    DeviceTemperature,
    Celsius,
}

impl Unit {
    pub fn symbol(&self, celsius: bool) -> &'static str {
        match self {
            Unit::Volt => "V",
            Unit::Watt => "W",
            Unit::Ampere => "A",
            Unit::Ohm => "Ω",
            Unit::DeviceTemperature if celsius => "°C",
            Unit::DeviceTemperature => "°F",
            Unit::Celsius => "°C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorProfile {
    pub key: SensorKey,
    pub color: &'static str,
    pub limits: InterpolationLimits,
    pub unit: Unit,
}

impl SensorProfile {
    /// Text of the last-value label next to the series toggle.
    pub fn format_last_value(&self, value: Option<f64>, active: bool, celsius: bool) -> String {
        match value {
            Some(value) if active => format!("{} {}", value, self.unit.symbol(celsius)),
            _ => "?".to_string(),
        }
    }
}

const fn limits(v0: f64, d0: f64, v1: f64, d1: f64) -> InterpolationLimits {
    InterpolationLimits::new(ValueLimit::new(v0, d0), ValueLimit::new(v1, d1))
}

const BATTERY: InterpolationLimits = limits(2.75, 80.0, 4.2, 95.0);
const BATTERY_PACK: InterpolationLimits = limits(2.75, 80.0, 12.6, 95.0);
const POWER: InterpolationLimits = limits(1.0, 50.0, 75.0, 80.0);
const TEMPERATURE: InterpolationLimits = limits(100.0, 50.0, 600.0, 80.0);
const RESISTANCE: InterpolationLimits = limits(0.05, 30.0, 3.0, 50.0);
const OUTPUT_VOLTAGE: InterpolationLimits = limits(1.0, 10.0, 9.0, 30.0);
const OUTPUT_CURRENT: InterpolationLimits = limits(1.0, 10.0, 50.0, 30.0);
const BOARD_TEMPERATURE: InterpolationLimits = limits(0.0, 1.0, 99.0, 10.0);

pub const PLOTTED: [SensorProfile; 13] = [
    SensorProfile { key: SensorKey::Battery1, color: "DarkSlateGray", limits: BATTERY, unit: Unit::Volt },
    SensorProfile { key: SensorKey::Battery2, color: "DarkSlateGray", limits: BATTERY, unit: Unit::Volt },
    SensorProfile { key: SensorKey::Battery3, color: "DarkSlateGray", limits: BATTERY, unit: Unit::Volt },
    SensorProfile { key: SensorKey::BatteryPack, color: "DarkSlateGray", limits: BATTERY_PACK, unit: Unit::Volt },
    SensorProfile { key: SensorKey::Power, color: "LimeGreen", limits: POWER, unit: Unit::Watt },
    SensorProfile { key: SensorKey::PowerSet, color: "Green", limits: POWER, unit: Unit::Watt },
    SensorProfile { key: SensorKey::Temperature, color: "Red", limits: TEMPERATURE, unit: Unit::DeviceTemperature },
    SensorProfile { key: SensorKey::TemperatureSet, color: "DarkRed", limits: TEMPERATURE, unit: Unit::DeviceTemperature },
    SensorProfile { key: SensorKey::OutputCurrent, color: "Orange", limits: OUTPUT_CURRENT, unit: Unit::Ampere },
    SensorProfile { key: SensorKey::OutputVoltage, color: "LightSkyBlue", limits: OUTPUT_VOLTAGE, unit: Unit::Volt },
    SensorProfile { key: SensorKey::Resistance, color: "Violet", limits: RESISTANCE, unit: Unit::Ohm },
    SensorProfile { key: SensorKey::RealResistance, color: "BlueViolet", limits: RESISTANCE, unit: Unit::Ohm },
    SensorProfile { key: SensorKey::BoardTemperature, color: "SaddleBrown", limits: BOARD_TEMPERATURE, unit: Unit::Celsius },
];

pub fn profile(key: SensorKey) -> Option<&'static SensorProfile> {
    PLOTTED.iter().find(|p| p.key == key)
}
