// ─────────────────────────────────────────────────────────────────────
// Spinfoam Boosters — Vertex Adapter
// ─────────────────────────────────────────────────────────────────────
//! The four boosters attached to one 4-simplex vertex.
//!
//! Vertex spins are ordered `(j12, j13, j14, j15, j23, j24, j25, j34,
//! j35, j45)`; edge 1 is gauge-fixed, so boosters 2 to 5 are needed.

use booster_types::{BoosterKey, BoosterResult, DSpin, GaugeAxis};

use crate::coordinator::Coordinator;
use crate::engine::BoosterEngine;
use crate::tensor::BoosterTensor;

/// Spin positions and gauge-fixed axis of one booster of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBooster {
    /// Edge the booster sits on.
    pub edge: u8,
    /// Indices into the ten vertex spins for `(ja, jb, jc, jd)`.
    pub spins: [usize; 4],
    pub gauge: GaugeAxis,
}

const J12: usize = 0;
const J13: usize = 1;
const J14: usize = 2;
const J15: usize = 3;
const J23: usize = 4;
const J24: usize = 5;
const J25: usize = 6;
const J34: usize = 7;
const J35: usize = 8;
const J45: usize = 9;

pub const VERTEX_BOOSTER_MAP: [VertexBooster; 4] = [
    VertexBooster {
        edge: 2,
        spins: [J23, J24, J25, J12],
        gauge: GaugeAxis::D,
    },
    VertexBooster {
        edge: 3,
        spins: [J34, J35, J13, J23],
        gauge: GaugeAxis::C,
    },
    VertexBooster {
        edge: 4,
        spins: [J45, J14, J24, J34],
        gauge: GaugeAxis::B,
    },
    VertexBooster {
        edge: 5,
        spins: [J15, J25, J35, J45],
        gauge: GaugeAxis::A,
    },
];

impl VertexBooster {
    pub fn two_js(&self, vertex: &[DSpin; 10]) -> [DSpin; 4] {
        self.spins.map(|s| vertex[s])
    }

    pub fn key(&self, vertex: &[DSpin; 10], dl: u32) -> BoosterResult<BoosterKey> {
        BoosterKey::new(self.gauge, self.two_js(vertex), dl)
    }

    /// Lower bound of the outer intertwiner, `max(|ja-jb|, |jc-jd|)`.
    pub fn two_i_min(&self, vertex: &[DSpin; 10]) -> DSpin {
        let [ja, jb, jc, jd] = self.two_js(vertex);
        ja.abs_diff(jb).max(jc.abs_diff(jd))
    }
}

/// Boosters of edges 2 to 5, in that order.
#[derive(Debug, Clone)]
pub struct VertexBoosters {
    /// `None` where the booster is degenerate.
    pub tensors: [Option<BoosterTensor>; 4],
    pub two_i_mins: [DSpin; 4],
}

/// Resolve the four boosters of a vertex, persisting them when the
/// engine's storage is enabled.
pub fn vertex_boosters<C: Coordinator>(
    engine: &BoosterEngine<C>,
    two_js: &[DSpin; 10],
    dl: u32,
) -> BoosterResult<VertexBoosters> {
    let persist = engine.config().store;
    let mut tensors: [Option<BoosterTensor>; 4] = Default::default();
    let mut two_i_mins = [0; 4];
    for (slot, booster) in VERTEX_BOOSTER_MAP.iter().enumerate() {
        let key = booster.key(two_js, dl)?;
        tensors[slot] = engine.resolve(&key, persist)?.tensor;
        two_i_mins[slot] = booster.two_i_min(two_js);
    }
    log::debug!("vertex {two_js:?} dl={dl}: resolved 4 boosters");
    Ok(VertexBoosters {
        tensors,
        two_i_mins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use booster_physics::{BoosterBounds, HeuristicKernel};
    use booster_types::BoosterConfig;

    use crate::coordinator::LocalCoordinator;
    use crate::storage::{BoosterStorage, InMemoryStorage};

    fn engine(storage: &Arc<InMemoryStorage>, store: bool) -> BoosterEngine {
        let config = BoosterConfig {
            store,
            ..BoosterConfig::default()
        };
        BoosterEngine::with_storage(
            config,
            Arc::new(HeuristicKernel),
            Arc::clone(storage) as Arc<dyn BoosterStorage>,
            LocalCoordinator,
        )
        .unwrap()
    }

    #[test]
    fn test_map_uses_every_non_gauge_spin_twice() {
        let mut uses = [0; 10];
        for b in &VERTEX_BOOSTER_MAP {
            for &s in &b.spins {
                uses[s] += 1;
            }
        }
        // j1x spins appear once, the others on both of their edges.
        assert_eq!(uses, [1, 1, 1, 1, 2, 2, 2, 2, 2, 2]);
        let gauges: Vec<u8> = VERTEX_BOOSTER_MAP.iter().map(|b| b.gauge.index()).collect();
        assert_eq!(gauges, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_spin_selection() {
        let vertex: [DSpin; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let js: Vec<[DSpin; 4]> = VERTEX_BOOSTER_MAP.iter().map(|b| b.two_js(&vertex)).collect();
        assert_eq!(js, vec![[5, 6, 7, 1], [8, 9, 2, 5], [10, 3, 6, 8], [4, 7, 9, 10]]);
        assert_eq!(VERTEX_BOOSTER_MAP[0].two_i_min(&vertex), 6);
    }

    #[test]
    fn test_uniform_vertex() {
        let storage = Arc::new(InMemoryStorage::new());
        let e = engine(&storage, true);
        let out = vertex_boosters(&e, &[2; 10], 1).unwrap();
        assert_eq!(out.two_i_mins, [0; 4]);
        for (b, tensor) in VERTEX_BOOSTER_MAP.iter().zip(out.tensors.iter()) {
            let key = b.key(&[2; 10], 1).unwrap();
            let t = tensor.as_ref().unwrap();
            assert_eq!(t.dims(), BoosterBounds::for_key(&key).tensor_dims());
            assert!(storage.contains(&key));
        }
        assert_eq!(storage.len(), 4);
    }

    #[test]
    fn test_store_disabled_skips_persistence() {
        let storage = Arc::new(InMemoryStorage::new());
        let e = engine(&storage, false);
        vertex_boosters(&e, &[2; 10], 0).unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_degenerate_booster_is_none() {
        let storage = Arc::new(InMemoryStorage::new());
        let e = engine(&storage, false);
        // booster 2: (j23, j24, j25, j12) = (0, 6, 1, 1) has no outer intertwiner
        let vertex: [DSpin; 10] = [1, 2, 2, 2, 0, 6, 1, 2, 2, 2];
        let out = vertex_boosters(&e, &vertex, 0).unwrap();
        assert!(out.tensors[0].is_none());
        assert_eq!(out.two_i_mins[0], 6);
    }
}
