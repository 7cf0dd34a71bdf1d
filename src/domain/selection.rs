// Series selection - which plotted sensors are shown and recorded
use super::sensor::{SensorKey, PLOTTED};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    active: BTreeMap<SensorKey, bool>,
}

impl Selection {
    /// Every plotted sensor starts active unless `stored` says otherwise.
    pub fn from_stored(stored: &BTreeMap<String, bool>) -> Self {
        let active = PLOTTED
            .iter()
            .map(|profile| {
                let flag = stored.get(profile.key.as_str()).copied().unwrap_or(true);
                (profile.key, flag)
            })
            .collect();
        Self { active }
    }

    pub fn is_active(&self, key: SensorKey) -> bool {
        self.active.get(&key).copied().unwrap_or(false)
    }

    /// Returns false when `key` has no series.
    pub fn set(&mut self, key: SensorKey, active: bool) -> bool {
        match self.active.get_mut(&key) {
            Some(flag) => {
                *flag = active;
                true
            }
            None => false,
        }
    }

    /// Active sensors in sensor-table order.
    pub fn active_keys(&self) -> Vec<SensorKey> {
        PLOTTED
            .iter()
            .map(|profile| profile.key)
            .filter(|key| self.is_active(*key))
            .collect()
    }

    pub fn to_stored(&self) -> BTreeMap<String, bool> {
        self.active
            .iter()
            .map(|(key, flag)| (key.as_str().to_string(), *flag))
            .collect()
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::from_stored(&BTreeMap::new())
    }
}
