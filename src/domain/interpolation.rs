// Two-point piecewise-linear scale used to place sensors on a shared plot axis

/// A raw sensor value paired with the display coordinate it maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueLimit {
    pub value: f64,
    pub display: f64,
}

impl ValueLimit {
    pub const fn new(value: f64, display: f64) -> Self {
        Self { value, display }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationLimits {
    pub low: ValueLimit,
    pub high: ValueLimit,
}

impl InterpolationLimits {
    pub const fn new(low: ValueLimit, high: ValueLimit) -> Self {
        Self { low, high }
    }

    pub fn map(&self, value: f64) -> f64 {
        map(value, self.low, self.high)
    }
}

/// Values outside `[low.value, high.value]` clamp to the matching display bound.
pub fn map(value: f64, low: ValueLimit, high: ValueLimit) -> f64 {
    if value > high.value {
        return high.display;
    }
    if value < low.value {
        return low.display;
    }
    low.display + (value - low.value) / (high.value - low.value) * (high.display - low.display)
}
