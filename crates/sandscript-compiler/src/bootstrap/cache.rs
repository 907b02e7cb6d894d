//! Per-call-site inline cache.
//!
//! A fixed array of `(observed type, target)` slots is filled append-only and
//! checked in order. Slots are claimed with an atomic counter and written once,
//! so readers never lock. When every slot is taken the site turns megamorphic
//! and further types go to a fallback table.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use sandscript_core::TypeHash;

#[derive(Debug)]
pub struct InlineCache<T> {
    slots: Box<[OnceLock<(TypeHash, T)>]>,
    claimed: AtomicUsize,
    megamorphic: AtomicBool,
    fallback: RwLock<FxHashMap<TypeHash, T>>,
}

impl<T: Clone> InlineCache<T> {
    /// A cache with `depth` monomorphic/polymorphic slots. A depth of zero
    /// starts out megamorphic.
    pub fn new(depth: usize) -> Self {
        Self {
            slots: (0..depth).map(|_| OnceLock::new()).collect(),
            claimed: AtomicUsize::new(0),
            megamorphic: AtomicBool::new(depth == 0),
            fallback: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// The cached target for `ty`, if any.
    pub fn get(&self, ty: TypeHash) -> Option<T> {
        for slot in self.slots.iter() {
            match slot.get() {
                Some((observed, target)) if *observed == ty => return Some(target.clone()),
                Some(_) => continue,
                None => break,
            }
        }
        if self.megamorphic.load(Ordering::Acquire) {
            return self.fallback.read().get(&ty).cloned();
        }
        None
    }

    /// Record `target` for `ty`. Types already present are left alone.
    pub fn insert(&self, ty: TypeHash, target: T) {
        if self.get(ty).is_some() {
            return;
        }
        let index = self.claimed.fetch_add(1, Ordering::AcqRel);
        if let Some(slot) = self.slots.get(index) {
            // A concurrent writer may have filled an earlier slot with the same
            // type; the duplicate only costs a comparison.
            let _ = slot.set((ty, target));
            return;
        }
        self.megamorphic.store(true, Ordering::Release);
        self.fallback.write().entry(ty).or_insert(target);
    }

    /// Number of receiver types resolved at this site.
    pub fn observed(&self) -> usize {
        let cached = self.slots.iter().filter(|slot| slot.get().is_some()).count();
        cached + self.fallback.read().len()
    }

    pub fn is_megamorphic(&self) -> bool {
        self.megamorphic.load(Ordering::Acquire)
    }
}
