//! In-memory portal directory.
//!
//! Readers take an `Arc` snapshot of the whole map and iterate it without
//! holding any lock; writers build a complete new map and swap it in. A
//! reader therefore sees either the full old set or the full new set, never a
//! mix, and a snapshot taken before a swap stays valid after it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::geometry;
use crate::portal::Portal;
use crate::types::Position;

/// One consistent version of the directory.
pub type PortalSnapshot = Arc<HashMap<String, Portal>>;

/// Mapping portal id → portal, shared by the sync paths, the movement
/// handler and the admin surface.
#[derive(Debug, Default)]
pub struct PortalDirectory {
    current: RwLock<PortalSnapshot>,
    /// Serializes writers so copy-on-write edits never lose a concurrent swap.
    write_guard: Mutex<()>,
}

impl PortalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the previous set and installs `portals` atomically.
    ///
    /// Duplicate ids keep the last record.
    ///
    /// # Arguments
    ///
    /// * `portals` - The complete new set. An empty set clears the directory.
    ///
    /// # Example
    ///
    /// ```rust
    /// use portal_sync::PortalDirectory;
    ///
    /// let directory = PortalDirectory::new();
    /// directory.replace_all(Vec::new());
    /// assert!(directory.is_empty());
    /// ```
    pub fn replace_all(&self, portals: impl IntoIterator<Item = Portal>) {
        let next: HashMap<String, Portal> = portals
            .into_iter()
            .map(|portal| (portal.id.clone(), portal))
            .collect();

        let _writer = self.write_guard.lock();
        *self.current.write() = Arc::new(next);
    }

    pub fn get(&self, id: &str) -> Option<Portal> {
        self.current.read().get(id).cloned()
    }

    /// The current version of the directory. Cheap: one refcount bump.
    pub fn snapshot(&self) -> PortalSnapshot {
        Arc::clone(&self.current.read())
    }

    pub fn snapshot_values(&self) -> Vec<Portal> {
        self.snapshot().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    /// The portal whose volume contains `point` in `world`.
    ///
    /// When volumes overlap, the portal with the lowest id wins, so the
    /// answer does not depend on map iteration order.
    pub fn find_containing(&self, point: Position, world: &str) -> Option<Portal> {
        self.snapshot()
            .values()
            .filter(|portal| geometry::contains(portal, point, world))
            .min_by(|a, b| a.id.cmp(&b.id))
            .cloned()
    }

    /// Inserts a locally created portal, replacing any portal with the same
    /// name. Used by the admin surface only; the sync paths always replace
    /// the full set.
    pub fn insert_named(&self, portal: Portal) {
        self.edit(|map| {
            map.retain(|_, existing| existing.name != portal.name);
            map.insert(portal.id.clone(), portal);
        });
    }

    /// Removes every portal called `name`. Returns whether any existed.
    pub fn remove_by_name(&self, name: &str) -> bool {
        let mut removed = false;
        self.edit(|map| {
            let before = map.len();
            map.retain(|_, existing| existing.name != name);
            removed = map.len() != before;
        });
        removed
    }

    fn edit(&self, apply: impl FnOnce(&mut HashMap<String, Portal>)) {
        let _writer = self.write_guard.lock();
        let mut next = HashMap::clone(&self.current.read());
        apply(&mut next);
        *self.current.write() = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::PortalShape;
    use std::thread;

    fn portal(id: &str, name: &str, x: i32) -> Portal {
        Portal {
            id: id.to_string(),
            name: name.to_string(),
            target_server_id: "srv".to_string(),
            target_server_name: "lobby".to_string(),
            owner_server_id: None,
            world: "world".to_string(),
            x,
            y: 64,
            z: 0,
            x2: 0,
            z2: 0,
            shape: PortalShape::Sphere,
        }
    }

    #[test]
    fn test_replace_all_discards_previous_set() {
        let directory = PortalDirectory::new();
        directory.replace_all(vec![portal("a", "A", 0), portal("b", "B", 10)]);
        directory.replace_all(vec![portal("c", "C", 20)]);

        assert_eq!(directory.len(), 1);
        assert!(directory.get("a").is_none());
        assert_eq!(directory.get("c").map(|p| p.name), Some("C".to_string()));
    }

    #[test]
    fn test_empty_replace_clears_lookups() {
        let directory = PortalDirectory::new();
        directory.replace_all(vec![portal("a", "A", 0)]);
        directory.replace_all(Vec::new());

        assert!(directory.is_empty());
        assert!(directory
            .find_containing(Position::new(0.0, 64.0, 0.0), "world")
            .is_none());
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let directory = PortalDirectory::new();
        directory.replace_all(vec![portal("a", "A", 0)]);

        let before = directory.snapshot();
        directory.replace_all(vec![portal("b", "B", 0), portal("c", "C", 0)]);

        assert_eq!(before.len(), 1);
        assert!(before.contains_key("a"));
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_concurrent_readers_see_whole_versions() {
        let old: Vec<Portal> = (0..50).map(|i| portal(&format!("old-{i}"), "old", i)).collect();
        let new: Vec<Portal> = (0..80).map(|i| portal(&format!("new-{i}"), "new", i)).collect();

        let directory = Arc::new(PortalDirectory::new());
        directory.replace_all(old.clone());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let directory = Arc::clone(&directory);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let values = directory.snapshot_values();
                        let olds = values.iter().filter(|p| p.name == "old").count();
                        let news = values.iter().filter(|p| p.name == "new").count();
                        assert!(
                            (olds == 50 && news == 0) || (olds == 0 && news == 80),
                            "mixed snapshot: {olds} old, {news} new"
                        );
                    }
                })
            })
            .collect();

        for round in 0..200 {
            if round % 2 == 0 {
                directory.replace_all(new.clone());
            } else {
                directory.replace_all(old.clone());
            }
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_overlapping_portals_resolve_to_lowest_id() {
        let directory = PortalDirectory::new();
        let ids = ["p-07", "p-03", "p-12", "p-05", "p-10", "p-04"];
        directory.replace_all(ids.iter().map(|id| portal(id, id, 0)));
        let inside = Position::new(0.5, 64.0, 0.5);

        for _ in 0..50 {
            let hit = directory.find_containing(inside, "world").unwrap();
            assert_eq!(hit.id, "p-03");
        }

        directory.replace_all(ids.iter().rev().map(|id| portal(id, id, 0)));
        assert_eq!(directory.find_containing(inside, "world").unwrap().id, "p-03");

        // A portal elsewhere never shadows the overlap.
        directory.insert_named(portal("p-01", "far", 100));
        assert_eq!(directory.find_containing(inside, "world").unwrap().id, "p-03");
    }

    #[test]
    fn test_insert_named_replaces_same_name() {
        let directory = PortalDirectory::new();
        directory.replace_all(vec![portal("a", "gate", 0), portal("b", "other", 0)]);
        directory.insert_named(portal("c", "gate", 5));

        assert_eq!(directory.len(), 2);
        assert!(directory.get("a").is_none());
        assert_eq!(directory.get("c").map(|p| p.x), Some(5));
    }

    #[test]
    fn test_remove_by_name() {
        let directory = PortalDirectory::new();
        directory.replace_all(vec![portal("a", "gate", 0), portal("b", "gate", 1)]);

        assert!(directory.remove_by_name("gate"));
        assert!(directory.is_empty());
        assert!(!directory.remove_by_name("gate"));
    }
}
