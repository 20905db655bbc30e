//! Saved GPS landmarks, keyed by case-insensitive trimmed name. The store
//! returns typed outcomes instead of errors so the command layer can speak
//! them back to the user verbatim.

use crate::geo::{distance_m, GeoPoint};
use std::collections::HashMap;

/// A named place the user asked us to remember.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    /// Display name as the user spoke it, trimmed.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f32,
    pub created_at_ms: u64,
}

impl Landmark {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    AlreadyExists,
    InvalidName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgetOutcome {
    Removed,
    NotFound,
    InvalidName,
}

/// In-memory landmark store. Persistence lives outside the core; this is
/// the shape the pipeline shares with the command layer.
#[derive(Debug, Default)]
pub struct LandmarkStore {
    by_key: HashMap<String, Landmark>,
}

impl LandmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn save(
        &mut self,
        name: &str,
        position: GeoPoint,
        accuracy_m: f32,
        now_ms: u64,
    ) -> SaveOutcome {
        let key = match Self::key_for(name) {
            Some(key) => key,
            None => return SaveOutcome::InvalidName,
        };
        if self.by_key.contains_key(&key) {
            return SaveOutcome::AlreadyExists;
        }
        self.by_key.insert(
            key,
            Landmark {
                name: name.trim().to_string(),
                latitude: position.latitude,
                longitude: position.longitude,
                accuracy_m,
                created_at_ms: now_ms,
            },
        );
        SaveOutcome::Created
    }

    pub fn forget(&mut self, name: &str) -> ForgetOutcome {
        let key = match Self::key_for(name) {
            Some(key) => key,
            None => return ForgetOutcome::InvalidName,
        };
        match self.by_key.remove(&key) {
            Some(_) => ForgetOutcome::Removed,
            None => ForgetOutcome::NotFound,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Landmark> {
        let key = Self::key_for(name)?;
        self.by_key.get(&key)
    }

    /// The saved landmark closest to `from`, with its distance in meters.
    pub fn nearest(&self, from: &GeoPoint) -> Option<(&Landmark, f64)> {
        self.by_key
            .values()
            .map(|l| (l, distance_m(from, &l.position())))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn key_for(name: &str) -> Option<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_ascii_lowercase())
        }
    }
}
