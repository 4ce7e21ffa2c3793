pub mod analysis;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use crate::types::AgentId;

pub use analysis::analyze;

pub const NEUTRAL_INTENSITY: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionDimension {
    Joy,
    Confidence,
    Calmness,
    Satisfaction,
    Energy,
    Curiosity,
}

impl EmotionDimension {
    pub const ALL: [EmotionDimension; 6] = [
        Self::Joy,
        Self::Confidence,
        Self::Calmness,
        Self::Satisfaction,
        Self::Energy,
        Self::Curiosity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Confidence => "confidence",
            Self::Calmness => "calmness",
            Self::Satisfaction => "satisfaction",
            Self::Energy => "energy",
            Self::Curiosity => "curiosity",
        }
    }
}

/// Per-agent intensities, every dimension always present and within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionVector {
    values: BTreeMap<EmotionDimension, f32>,
}

impl EmotionVector {
    pub fn neutral() -> Self {
        Self {
            values: EmotionDimension::ALL
                .iter()
                .map(|d| (*d, NEUTRAL_INTENSITY))
                .collect(),
        }
    }

    pub fn get(&self, dimension: EmotionDimension) -> f32 {
        self.values
            .get(&dimension)
            .copied()
            .unwrap_or(NEUTRAL_INTENSITY)
    }

    pub fn apply(&mut self, delta: &EmotionDelta) {
        for (dimension, change) in delta.iter() {
            let current = self.get(dimension);
            self.values
                .insert(dimension, (current + change).clamp(0.0, 1.0));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionDimension, f32)> + '_ {
        EmotionDimension::ALL.iter().map(move |d| (*d, self.get(*d)))
    }

    /// Strongest dimension; the first in declaration order wins ties.
    pub fn dominant(&self) -> (EmotionDimension, f32) {
        self.iter()
            .fold((EmotionDimension::Joy, f32::MIN), |best, (d, v)| {
                if v > best.1 {
                    (d, v)
                } else {
                    best
                }
            })
    }

    pub fn is_neutral(&self) -> bool {
        self.iter()
            .all(|(_, v)| (v - NEUTRAL_INTENSITY).abs() < f32::EPSILON)
    }

    // Deserialized vectors may carry out-of-range or missing values
    fn sanitize(&mut self) {
        for d in EmotionDimension::ALL {
            let v = self.get(d);
            let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { NEUTRAL_INTENSITY };
            self.values.insert(d, v);
        }
    }
}

impl Default for EmotionVector {
    fn default() -> Self {
        Self::neutral()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionDelta {
    changes: BTreeMap<EmotionDimension, f32>,
}

impl EmotionDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates onto any change already recorded for `dimension`.
    pub fn with(mut self, dimension: EmotionDimension, change: f32) -> Self {
        self.add(dimension, change);
        self
    }

    pub fn add(&mut self, dimension: EmotionDimension, change: f32) {
        if change == 0.0 || !change.is_finite() {
            return;
        }
        *self.changes.entry(dimension).or_insert(0.0) += change;
    }

    pub fn get(&self, dimension: EmotionDimension) -> f32 {
        self.changes.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionDimension, f32)> + '_ {
        self.changes.iter().map(|(d, v)| (*d, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

type Slot = Arc<Mutex<EmotionVector>>;

/// Emotion vectors for every agent.
///
/// Each agent has its own lock, so deltas for one agent accumulate in order
/// while different agents never block each other.
#[derive(Debug, Default)]
pub struct EmotionStore {
    slots: RwLock<HashMap<AgentId, Slot>>,
}

impl EmotionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, agent_id: &AgentId) -> Slot {
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get(agent_id) {
                return slot.clone();
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(agent_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(EmotionVector::neutral())))
            .clone()
    }

    pub fn get(&self, agent_id: &AgentId) -> EmotionVector {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        match slots.get(agent_id) {
            Some(slot) => slot.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            None => EmotionVector::neutral(),
        }
    }

    pub fn apply_delta(&self, agent_id: &AgentId, delta: &EmotionDelta, source: &str) -> EmotionVector {
        let slot = self.slot(agent_id);
        let mut vector = slot.lock().unwrap_or_else(|e| e.into_inner());
        vector.apply(delta);
        log::debug!(
            "emotion update for {} from {}: {:?}",
            agent_id,
            source,
            delta
        );
        vector.clone()
    }

    /// Derive a delta from a response text and apply it.
    pub fn analyze_response(&self, agent_id: &AgentId, text: &str) -> EmotionDelta {
        let delta = analyze(text);
        if !delta.is_empty() {
            self.apply_delta(agent_id, &delta, "response_analysis");
        }
        delta
    }

    pub fn reset(&self, agent_id: &AgentId) {
        let slot = self.slot(agent_id);
        *slot.lock().unwrap_or_else(|e| e.into_inner()) = EmotionVector::neutral();
        log::info!("emotion state reset for {}", agent_id);
    }

    pub fn reset_all(&self) {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        for slot in slots.values() {
            *slot.lock().unwrap_or_else(|e| e.into_inner()) = EmotionVector::neutral();
        }
    }

    pub fn snapshot(&self) -> BTreeMap<AgentId, EmotionVector> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .map(|(id, slot)| {
                let vector = slot.lock().unwrap_or_else(|e| e.into_inner()).clone();
                (id.clone(), vector)
            })
            .collect()
    }

    pub fn restore_snapshot(&self, snapshot: BTreeMap<AgentId, EmotionVector>) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        for (id, mut vector) in snapshot {
            vector.sanitize();
            slots.insert(id, Arc::new(Mutex::new(vector)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lumina() -> AgentId {
        AgentId::from("lumina")
    }

    #[test]
    fn test_get_unknown_agent_is_neutral() {
        let store = EmotionStore::new();
        assert!(store.get(&AgentId::from("nobody")).is_neutral());
    }

    #[test]
    fn test_deltas_accumulate() {
        let store = EmotionStore::new();
        let delta = EmotionDelta::new().with(EmotionDimension::Joy, 0.1);
        store.apply_delta(&lumina(), &delta, "test");
        store.apply_delta(&lumina(), &delta, "test");

        let joy = store.get(&lumina()).get(EmotionDimension::Joy);
        assert!((joy - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_values_clamped() {
        let store = EmotionStore::new();
        let up = EmotionDelta::new().with(EmotionDimension::Energy, 5.0);
        let down = EmotionDelta::new().with(EmotionDimension::Calmness, -3.0);
        store.apply_delta(&lumina(), &up, "test");
        store.apply_delta(&lumina(), &down, "test");

        let vector = store.get(&lumina());
        assert_eq!(vector.get(EmotionDimension::Energy), 1.0);
        assert_eq!(vector.get(EmotionDimension::Calmness), 0.0);
        for (_, value) in vector.iter() {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_any_delta_sequence_stays_in_range() {
        let store = EmotionStore::new();
        let changes = [0.9, -1.7, 0.33, 2.5, -0.01, -8.0, 0.4, f32::NAN, 0.6];
        for (i, change) in changes.iter().enumerate() {
            let dim = EmotionDimension::ALL[i % EmotionDimension::ALL.len()];
            store.apply_delta(&lumina(), &EmotionDelta::new().with(dim, *change), "fuzz");
            for (_, value) in store.get(&lumina()).iter() {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_reset_restores_neutral() {
        let store = EmotionStore::new();
        store.apply_delta(
            &lumina(),
            &EmotionDelta::new().with(EmotionDimension::Joy, 0.3),
            "test",
        );
        assert!(!store.get(&lumina()).is_neutral());

        store.reset(&lumina());
        assert!(store.get(&lumina()).is_neutral());
    }

    #[test]
    fn test_dominant_dimension() {
        let mut vector = EmotionVector::neutral();
        vector.apply(&EmotionDelta::new().with(EmotionDimension::Curiosity, 0.2));
        assert_eq!(vector.dominant().0, EmotionDimension::Curiosity);
    }

    #[test]
    fn test_restore_snapshot_sanitizes() {
        let json = r#"{"lumina": {"values": {"joy": 3.5, "energy": -1.0}}}"#;
        let restored = EmotionStore::new();
        restored.restore_snapshot(serde_json::from_str(json).unwrap());

        let vector = restored.get(&lumina());
        assert_eq!(vector.get(EmotionDimension::Joy), 1.0);
        assert_eq!(vector.get(EmotionDimension::Energy), 0.0);
        assert_eq!(vector.get(EmotionDimension::Curiosity), NEUTRAL_INTENSITY);
    }

    #[test]
    fn test_concurrent_updates_on_one_agent_accumulate() {
        let store = Arc::new(EmotionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        let delta = EmotionDelta::new().with(EmotionDimension::Energy, -0.01);
                        store.apply_delta(&AgentId::from("nova"), &delta, "thread");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let energy = store.get(&AgentId::from("nova")).get(EmotionDimension::Energy);
        assert!((energy - 0.1).abs() < 1e-4);
    }
}
