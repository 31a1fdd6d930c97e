// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shadow tree: lazily filled per-node state mirroring an object's metadata.
//!
//! A shadow node is created the first time a projection reaches its metadata
//! node. It then keeps the auxiliary arrays decoded from its segments
//! (lengths, tags, null and none runs) and, for leaf columns, the last vector
//! built for a query registry. Each node has its own mutexes, so projections
//! running on different columns never contend.

use crate::csup::segment::Segment;
use crate::error::Result;
use crate::types::TypeRegistry;
use crate::vector::Vector;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

#[derive(Default)]
pub struct ShadowNode {
    /// Decoded uvarint streams by segment offset.
    aux: Mutex<HashMap<u64, Arc<Vec<u64>>>>,
    vector: Mutex<Option<(Arc<TypeRegistry>, Vector)>>,
}

impl ShadowNode {
    /// Uvarint stream of `seg`, decoded once.
    pub fn aux<F>(&self, seg: &Segment, load: F) -> Result<Arc<Vec<u64>>>
    where
        F: FnOnce() -> Result<Vec<u64>>,
    {
        let mut aux = self.aux.lock();
        if let Some(v) = aux.get(&seg.offset) {
            return Ok(Arc::clone(v));
        }
        let v = Arc::new(load()?);
        aux.insert(seg.offset, Arc::clone(&v));
        Ok(v)
    }

    /// Vector for `reg`, built once per registry.
    pub fn vector<F>(&self, reg: &Arc<TypeRegistry>, load: F) -> Result<Vector>
    where
        F: FnOnce() -> Result<Vector>,
    {
        let mut slot = self.vector.lock();
        if let Some((r, v)) = slot.as_ref() {
            if Arc::ptr_eq(r, reg) {
                return Ok(v.clone());
            }
        }
        let v = load()?;
        *slot = Some((Arc::clone(reg), v.clone()));
        Ok(v)
    }

    fn is_loaded(&self) -> bool {
        self.vector.lock().is_some() || !self.aux.lock().is_empty()
    }
}

/// Arena of shadow nodes indexed by metadata node id.
pub struct Shadows {
    nodes: Vec<OnceLock<ShadowNode>>,
}

impl Shadows {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            nodes: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Shadow of node `id`, created on first use. `id` must be in range.
    #[must_use]
    pub fn node(&self, id: u32) -> &ShadowNode {
        self.nodes[id as usize].get_or_init(ShadowNode::default)
    }

    /// Nodes a projection has reached so far.
    #[must_use]
    pub fn touched(&self) -> usize {
        self.nodes.iter().filter(|n| n.get().is_some()).count()
    }

    /// Nodes holding loaded state.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.get().is_some_and(ShadowNode::is_loaded))
            .count()
    }
}

impl std::fmt::Debug for Shadows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shadows")
            .field("nodes", &self.nodes.len())
            .field("touched", &self.touched())
            .finish()
    }
}
