// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cached translation of type ids between two registries.
//!
//! A [`TypeMapper`] is bound to one source registry and one target registry.
//! Its table is indexed by source name id and filled on demand. Consumers
//! that translate in a loop wrap it in a [`MapperCache`], which keeps a
//! private copy of the table and only touches the shared lock on a miss.

use super::registry::TypeRegistry;
use super::Type;
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared source-to-target translation table.
pub struct TypeMapper {
    target: Arc<TypeRegistry>,
    table: RwLock<Vec<Option<Type>>>,
}

impl std::fmt::Debug for TypeMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMapper")
            .field("entries", &self.table.read().iter().flatten().count())
            .finish()
    }
}

impl TypeMapper {
    #[must_use]
    pub fn new(target: Arc<TypeRegistry>) -> Self {
        Self {
            target,
            table: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn target(&self) -> &Arc<TypeRegistry> {
        &self.target
    }

    /// Cached target type for a source name id.
    #[must_use]
    pub fn lookup(&self, src_id: u32) -> Option<Type> {
        self.table
            .read()
            .get(src_id as usize)
            .and_then(Option::clone)
    }

    /// Translate `src` into the target registry and cache the result.
    pub fn enter(&self, src: &Type) -> Result<Type> {
        if let Some(hit) = self.lookup(src.name_id()) {
            return Ok(hit);
        }
        let out = self.target.translate_type(src)?;
        let idx = src.name_id() as usize;
        let mut table = self.table.write();
        if table.len() <= idx {
            table.resize(idx + 1, None);
        }
        table[idx] = Some(out.clone());
        Ok(out)
    }
}

/// Per-consumer cache in front of a [`TypeMapper`]; hits take no lock.
#[derive(Debug)]
pub struct MapperCache {
    mapper: Arc<TypeMapper>,
    local: Vec<Option<Type>>,
}

impl MapperCache {
    #[must_use]
    pub fn new(mapper: Arc<TypeMapper>) -> Self {
        Self {
            mapper,
            local: Vec::new(),
        }
    }

    #[must_use]
    pub fn mapper(&self) -> &Arc<TypeMapper> {
        &self.mapper
    }

    /// Target type for `src`, translating on first sight.
    pub fn lookup(&mut self, src: &Type) -> Result<Type> {
        let idx = src.name_id() as usize;
        if let Some(Some(hit)) = self.local.get(idx) {
            return Ok(hit.clone());
        }
        let out = self.mapper.enter(src)?;
        if self.local.len() <= idx {
            self.local.resize(idx + 1, None);
        }
        self.local[idx] = Some(out.clone());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{typevalue, Field};

    #[test]
    fn test_mapper_translates_and_caches() {
        let src = TypeRegistry::new();
        let dst = Arc::new(TypeRegistry::new());
        dst.lookup_array(Type::bytes());

        let rec = src
            .lookup_record(vec![Field::new("s", Type::string())])
            .expect("record");
        let mapper = TypeMapper::new(Arc::clone(&dst));
        assert!(mapper.lookup(rec.name_id()).is_none());

        let out = mapper.enter(&rec).expect("enter");
        assert_eq!(typevalue::encode(&out), typevalue::encode(&rec));
        assert_ne!(out.id(), rec.id());
        assert_eq!(mapper.lookup(rec.name_id()), Some(out.clone()));

        let mut cache = MapperCache::new(Arc::new(mapper));
        assert_eq!(cache.lookup(&rec).expect("cache"), out);
        assert_eq!(cache.lookup(&Type::int64()).expect("primitive"), Type::int64());
    }
}
