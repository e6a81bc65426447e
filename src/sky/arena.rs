//! Generational slot storage. Removing a star bumps its slot's generation,
//! so older `StarId`s stop resolving even after the slot is reused.

use std::fmt;

use super::star::Star;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StarId {
    idx: u32,
    generation: u32,
}

impl StarId {
    #[cfg(test)]
    pub const fn index(self) -> u32 {
        self.idx
    }
}

impl fmt::Debug for StarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StarId({}@gen{})", self.idx, self.generation)
    }
}

struct Slot {
    generation: u32,
    star: Option<Star>,
}

#[derive(Default)]
pub struct StarArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    len: usize,
}

impl StarArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live stars.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn insert(&mut self, star: Star) -> StarId {
        self.len += 1;
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.star = Some(star);
            return StarId {
                idx,
                generation: slot.generation,
            };
        }

        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            star: Some(star),
        });
        StarId { idx, generation: 0 }
    }

    pub fn remove(&mut self, id: StarId) -> Option<Star> {
        let slot = self.slots.get_mut(id.idx as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let star = slot.star.take()?;
        // Bump generation so old handles immediately fail validation.
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.idx);
        self.len -= 1;
        Some(star)
    }

    /// Whether `id` still resolves to a star (active or not).
    #[cfg(test)]
    pub fn contains(&self, id: StarId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: StarId) -> Option<&Star> {
        let slot = self.slots.get(id.idx as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.star.as_ref()
    }

    pub fn get_mut(&mut self, id: StarId) -> Option<&mut Star> {
        let slot = self.slots.get_mut(id.idx as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.star.as_mut()
    }

    /// Resolves `id` to a star that is still active.
    pub fn active(&self, id: StarId) -> Option<&Star> {
        self.get(id).filter(|star| star.is_active)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StarId, &Star)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.star.as_ref().map(|star| {
                (
                    StarId {
                        idx: idx as u32,
                        generation: slot.generation,
                    },
                    star,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (StarId, &mut Star)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            let generation = slot.generation;
            slot.star.as_mut().map(|star| {
                (
                    StarId {
                        idx: idx as u32,
                        generation,
                    },
                    star,
                )
            })
        })
    }

    pub fn ids(&self) -> Vec<StarId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Removes every star for which `keep` returns false. Returns the number
    /// of stars removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&Star) -> bool) -> usize {
        let doomed: Vec<StarId> = self
            .iter()
            .filter(|(_, star)| !keep(*star))
            .map(|(id, _)| id)
            .collect();
        for id in &doomed {
            self.remove(*id);
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(rng: &mut fastrand::Rng) -> Star {
        Star::new(10.0, 10.0, Some(1.0), 0.0, rng)
    }

    #[test]
    fn insert_and_resolve() {
        let mut rng = fastrand::Rng::with_seed(1);
        let mut arena = StarArena::new();
        let a = arena.insert(star(&mut rng));
        let b = arena.insert(star(&mut rng));

        assert_eq!(arena.len(), 2);
        assert_ne!(a, b);
        assert!(arena.contains(a));
        assert!(arena.get(b).is_some());
    }

    #[test]
    fn removed_handle_is_stale_after_slot_reuse() {
        let mut rng = fastrand::Rng::with_seed(2);
        let mut arena = StarArena::new();
        let old = arena.insert(star(&mut rng));
        assert!(arena.remove(old).is_some());
        assert!(arena.remove(old).is_none());

        let new = arena.insert(star(&mut rng));
        assert_eq!(old.index(), new.index());
        assert!(!arena.contains(old));
        assert!(arena.contains(new));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn retain_drops_inactive() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut arena = StarArena::new();
        let keep = arena.insert(star(&mut rng));
        let gone = arena.insert(star(&mut rng));
        if let Some(s) = arena.get_mut(gone) {
            s.is_active = false;
        }

        assert_eq!(arena.retain(|s| s.is_active), 1);
        assert!(arena.contains(keep));
        assert!(!arena.contains(gone));
        assert!(arena.active(gone).is_none());
        assert_eq!(arena.iter().count(), 1);
    }
}
