// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Cache Resolver
// ─────────────────────────────────────────────────────────────────────
//! Finds a stored tensor for a request, exact or with a different
//! shell depth.
//!
//! Search order: the requested `dl`, then `dl+1` up to `DL_MAX`, then
//! `dl-1` down to 0. The first entry found wins, even if a closer one
//! exists below: a deeper tensor covers every point of the request,
//! while a shallower one only covers part of it.

use booster_physics::BoosterBounds;
use booster_types::{BoosterError, BoosterKey, BoosterResult, DL_MAX};

use crate::storage::BoosterStorage;
use crate::tensor::BoosterTensor;

/// What the cache holds for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    /// Stored tensor for exactly the requested shell depth.
    ExactHit(BoosterTensor),
    /// Stored tensor for another shell depth `dl`.
    PartialHit { tensor: BoosterTensor, dl: u32 },
    Miss,
}

impl CacheOutcome {
    /// Shell depth of the tensor found, if any.
    pub fn found_dl(&self, requested: u32) -> Option<u32> {
        match self {
            CacheOutcome::ExactHit(_) => Some(requested),
            CacheOutcome::PartialHit { dl, .. } => Some(*dl),
            CacheOutcome::Miss => None,
        }
    }
}

/// Candidate shell depths other than `dl`, in search order.
pub fn search_order(dl: u32) -> impl Iterator<Item = u32> {
    (dl + 1..=DL_MAX).chain((0..dl).rev())
}

/// Looks up booster tensors in a storage backend.
pub struct CacheResolver<'a> {
    storage: &'a dyn BoosterStorage,
}

impl<'a> CacheResolver<'a> {
    pub fn new(storage: &'a dyn BoosterStorage) -> Self {
        Self { storage }
    }

    /// Shell depth of the first stored entry in search order.
    pub fn find(&self, key: &BoosterKey) -> BoosterResult<Option<u32>> {
        if self.storage.contains(key) {
            return Ok(Some(key.dl));
        }
        for dl in search_order(key.dl) {
            if self.storage.contains(&key.with_dl(dl)?) {
                log::debug!("{key}: found stored tensor at dl={dl}");
                return Ok(Some(dl));
            }
        }
        Ok(None)
    }

    /// Find and load the tensor for `key`.
    pub fn resolve(&self, key: &BoosterKey) -> BoosterResult<CacheOutcome> {
        match self.find(key)? {
            None => {
                log::debug!("{key}: cache miss");
                Ok(CacheOutcome::Miss)
            }
            Some(dl) if dl == key.dl => Ok(CacheOutcome::ExactHit(self.load_checked(key)?)),
            Some(dl) => Ok(CacheOutcome::PartialHit {
                tensor: self.load_checked(&key.with_dl(dl)?)?,
                dl,
            }),
        }
    }

    /// Load `key`, rejecting entries whose shape does not fit its bounds.
    pub fn load_checked(&self, key: &BoosterKey) -> BoosterResult<BoosterTensor> {
        let tensor = self.storage.load(key)?;
        let expected = BoosterBounds::for_key(key).tensor_dims();
        if tensor.dims() != expected {
            return Err(BoosterError::Storage(format!(
                "stored {key} has dims {:?}, expected {expected:?}",
                tensor.dims()
            )));
        }
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    fn key(dl: u32) -> BoosterKey {
        BoosterKey::from_raw(1, [2, 2, 2, 2], dl).unwrap()
    }

    fn seed(store: &InMemoryStorage, dl: u32) {
        let k = key(dl);
        let dims = BoosterBounds::for_key(&k).tensor_dims();
        store.save(&k, &BoosterTensor::zeros(dims)).unwrap();
    }

    #[test]
    fn test_search_order() {
        let order: Vec<u32> = search_order(47).collect();
        assert_eq!(order, vec![48, 49, 50, 46, 45, 44, 43, 42, 41, 40, 39, 38, 37, 36, 35, 34,
            33, 32, 31, 30, 29, 28, 27, 26, 25, 24, 23, 22, 21, 20, 19, 18, 17, 16, 15, 14, 13,
            12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0]);
        assert_eq!(search_order(DL_MAX).next(), Some(DL_MAX - 1));
        assert_eq!(search_order(0).count(), DL_MAX as usize);
    }

    #[test]
    fn test_miss() {
        let store = InMemoryStorage::new();
        let r = CacheResolver::new(&store);
        assert_eq!(r.resolve(&key(2)).unwrap(), CacheOutcome::Miss);
    }

    #[test]
    fn test_exact_hit() {
        let store = InMemoryStorage::new();
        seed(&store, 2);
        seed(&store, 3);
        let r = CacheResolver::new(&store);
        assert!(matches!(r.resolve(&key(2)).unwrap(), CacheOutcome::ExactHit(_)));
    }

    #[test]
    fn test_upward_search_wins() {
        let store = InMemoryStorage::new();
        seed(&store, 1);
        seed(&store, 3);
        let r = CacheResolver::new(&store);
        let out = r.resolve(&key(2)).unwrap();
        assert_eq!(out.found_dl(2), Some(3));
        match out {
            CacheOutcome::PartialHit { tensor, dl } => {
                assert_eq!(dl, 3);
                assert_eq!(tensor.dims(), BoosterBounds::for_key(&key(3)).tensor_dims());
            }
            other => panic!("expected partial hit, got {other:?}"),
        }
    }

    #[test]
    fn test_first_found_not_nearest() {
        let store = InMemoryStorage::new();
        seed(&store, 0);
        seed(&store, 9);
        let r = CacheResolver::new(&store);
        assert_eq!(r.find(&key(1)).unwrap(), Some(9));
    }

    #[test]
    fn test_downward_fallback() {
        let store = InMemoryStorage::new();
        seed(&store, 0);
        seed(&store, 1);
        let r = CacheResolver::new(&store);
        assert_eq!(r.find(&key(3)).unwrap(), Some(1));
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let store = InMemoryStorage::new();
        store
            .save(&key(1), &BoosterTensor::zeros([1, 1, 1, 1, 1, 1]))
            .unwrap();
        let r = CacheResolver::new(&store);
        assert!(matches!(r.resolve(&key(1)), Err(BoosterError::Storage(_))));
    }
}
