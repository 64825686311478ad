use ao_storage::{KeyValueStore, keys};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

use crate::GalleryError;

/// Per-owner edits layered over fetched items. Ids in `order` that the
/// latest fetch no longer returns are kept but not shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationOverlay {
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub hidden: BTreeSet<String>,
}

impl CustomizationOverlay {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.hidden.is_empty()
    }

    fn dedupe_order(&mut self) {
        let mut seen = HashSet::new();
        self.order.retain(|id| seen.insert(id.clone()));
    }
}

#[derive(Debug, Deserialize)]
struct LegacySnapshotEntry {
    id: String,
}

/// Owns overlay, limit and background persistence. Every value read is
/// cached, and the cache is updated before the durable write, so a failed
/// write still leaves the running session consistent.
pub struct CustomizationStore {
    store: Arc<dyn KeyValueStore>,
    default_limit: u32,
    overlays: HashMap<String, CustomizationOverlay>,
    limits: HashMap<String, Option<u32>>,
    background: Option<Option<String>>,
    write_warning: Option<String>,
}

impl CustomizationStore {
    pub fn new(store: Arc<dyn KeyValueStore>, default_limit: u32) -> Self {
        Self {
            store,
            default_limit,
            overlays: HashMap::new(),
            limits: HashMap::new(),
            background: None,
            write_warning: None,
        }
    }

    /// Last durable write failure, cleared by the next successful write.
    pub fn write_warning(&self) -> Option<&str> {
        self.write_warning.as_deref()
    }

    pub fn load_overlay(&mut self, owner: &str) -> CustomizationOverlay {
        self.overlay_mut(owner).clone()
    }

    /// Appends ids the overlay has never seen, in the given order. Memory
    /// only: the grown order is written by the next edit.
    pub fn discover(&mut self, owner: &str, ids: &[String]) -> bool {
        let overlay = self.overlay_mut(owner);
        let mut known: HashSet<String> = overlay.order.iter().cloned().collect();
        let before = overlay.order.len();
        for id in ids {
            if known.insert(id.clone()) {
                overlay.order.push(id.clone());
            }
        }
        overlay.order.len() != before
    }

    pub fn reorder(&mut self, owner: &str, from: usize, to: usize) -> Result<CustomizationOverlay, GalleryError> {
        let overlay = self.overlay_mut(owner);
        let len = overlay.order.len();
        if from >= len || to >= len {
            return Err(GalleryError::InvalidArgument(format!(
                "reorder {from} -> {to} is out of range for {len} items"
            )));
        }

        let moved = overlay.order.remove(from);
        let to = to.min(overlay.order.len());
        overlay.order.insert(to, moved);

        self.persist_overlay(owner);
        Ok(self.load_overlay(owner))
    }

    pub fn hide(&mut self, owner: &str, id: &str) -> CustomizationOverlay {
        if self.overlay_mut(owner).hidden.insert(id.to_owned()) {
            self.persist_overlay(owner);
        }
        self.load_overlay(owner)
    }

    pub fn unhide(&mut self, owner: &str, id: &str) -> CustomizationOverlay {
        if self.overlay_mut(owner).hidden.remove(id) {
            self.persist_overlay(owner);
        }
        self.load_overlay(owner)
    }

    pub fn reset_overlay(&mut self, owner: &str) {
        self.overlays
            .insert(owner.to_owned(), CustomizationOverlay::default());
        self.limits.insert(owner.to_owned(), None);
        self.write(&keys::owner_overlay(owner), None);
        self.write(&keys::legacy_snapshot(owner), None);
        self.write(&keys::owner_limit(owner), None);
    }

    pub fn owner_limit(&mut self, owner: &str) -> u32 {
        if let Some(cached) = self.limits.get(owner) {
            return cached.unwrap_or(self.default_limit);
        }

        let stored = match self.store.get(&keys::owner_limit(owner)) {
            Ok(Some(raw)) => match raw.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => Some(limit),
                _ => {
                    warn!("ignoring invalid stored limit '{raw}' for {owner}");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("failed to read limit for {owner}: {err:#}");
                None
            }
        };
        self.limits.insert(owner.to_owned(), stored);
        stored.unwrap_or(self.default_limit)
    }

    pub fn set_owner_limit(&mut self, owner: &str, limit: u32) -> Result<(), GalleryError> {
        if limit == 0 {
            return Err(GalleryError::InvalidArgument("limit must be positive".to_owned()));
        }
        self.limits.insert(owner.to_owned(), Some(limit));
        self.write(&keys::owner_limit(owner), Some(&limit.to_string()));
        Ok(())
    }

    pub fn background_override(&mut self) -> Option<String> {
        if let Some(cached) = &self.background {
            return cached.clone();
        }

        let stored = match self.store.get(keys::BACKGROUND_IMAGE) {
            Ok(value) => value.filter(|url| !url.trim().is_empty()),
            Err(err) => {
                warn!("failed to read background override: {err:#}");
                None
            }
        };
        self.background = Some(stored.clone());
        stored
    }

    pub fn set_background_override(&mut self, url: &str) -> Result<(), GalleryError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(GalleryError::InvalidArgument("background url is required".to_owned()));
        }
        self.background = Some(Some(url.to_owned()));
        self.write(keys::BACKGROUND_IMAGE, Some(url));
        Ok(())
    }

    pub fn clear_background_override(&mut self) {
        self.background = Some(None);
        self.write(keys::BACKGROUND_IMAGE, None);
    }

    fn overlay_mut(&mut self, owner: &str) -> &mut CustomizationOverlay {
        if !self.overlays.contains_key(owner) {
            let loaded = self.read_overlay(owner);
            self.overlays.insert(owner.to_owned(), loaded);
        }
        self.overlays.entry(owner.to_owned()).or_default()
    }

    fn read_overlay(&self, owner: &str) -> CustomizationOverlay {
        match self.store.get(&keys::owner_overlay(owner)) {
            Ok(Some(raw)) => match serde_json::from_str::<CustomizationOverlay>(&raw) {
                Ok(mut overlay) => {
                    overlay.dedupe_order();
                    overlay
                }
                Err(err) => {
                    warn!("discarding malformed overlay for {owner}: {err}");
                    CustomizationOverlay::default()
                }
            },
            Ok(None) => self.read_legacy_snapshot(owner),
            Err(err) => {
                warn!("failed to read overlay for {owner}: {err:#}");
                CustomizationOverlay::default()
            }
        }
    }

    fn read_legacy_snapshot(&self, owner: &str) -> CustomizationOverlay {
        let raw = match self.store.get(&keys::legacy_snapshot(owner)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CustomizationOverlay::default(),
            Err(err) => {
                warn!("failed to read legacy snapshot for {owner}: {err:#}");
                return CustomizationOverlay::default();
            }
        };

        match serde_json::from_str::<Vec<LegacySnapshotEntry>>(&raw) {
            Ok(entries) => {
                let mut overlay = CustomizationOverlay {
                    order: entries.into_iter().map(|entry| entry.id).collect(),
                    hidden: BTreeSet::new(),
                };
                overlay.dedupe_order();
                overlay
            }
            Err(err) => {
                warn!("ignoring unreadable legacy snapshot for {owner}: {err}");
                CustomizationOverlay::default()
            }
        }
    }

    fn persist_overlay(&mut self, owner: &str) {
        let Some(overlay) = self.overlays.get(owner) else {
            return;
        };
        match serde_json::to_string(overlay) {
            Ok(encoded) => self.write(&keys::owner_overlay(owner), Some(&encoded)),
            Err(err) => {
                warn!("failed to encode overlay for {owner}: {err}");
                self.write_warning = Some(format!("customization not saved: {err}"));
            }
        }
    }

    fn write(&mut self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        };
        match result {
            Ok(()) => self.write_warning = None,
            Err(err) => {
                warn!("failed to persist {key}: {err:#}");
                self.write_warning = Some(format!("customization not saved: {err}"));
            }
        }
    }
}
