//! Value-callback registry.
//!
//! The registry is an ordered list of [`ValueCallback`]s, each binding an
//! OID to a [`Binding`]. Sorted by numeric OID order it defines the walk
//! order GetNext and GetBulk follow.
//!
//! Mutations mark the registry unsorted; call [`Registry::sort`] (the agent
//! does this before serving a request) before relying on walk order.

mod binding;

pub use binding::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, ErrorStatus, OidErrorKind, Result};
use crate::oid::Oid;
use crate::value::Value;

/// Handle returned when a callback is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

/// One registry entry: an OID bound to a value accessor.
#[derive(Debug)]
pub struct ValueCallback {
    id: CallbackId,
    oid: Oid,
    binding: Binding,
    settable: bool,
    set_occurred: AtomicBool,
}

impl ValueCallback {
    /// Registration handle.
    pub fn id(&self) -> CallbackId {
        self.id
    }

    /// The OID this callback answers for. Fixed for the callback's lifetime.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// The bound accessor.
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Whether SET requests may write through this callback.
    pub fn is_settable(&self) -> bool {
        self.settable
    }

    /// True once a SET has succeeded since the last reset.
    pub fn set_occurred(&self) -> bool {
        self.set_occurred.load(Ordering::Relaxed)
    }

    pub fn reset_set_occurred(&self) {
        self.set_occurred.store(false, Ordering::Relaxed);
    }

    /// Read the current value. `None` means the accessor failed.
    pub fn get_value(&self) -> Option<Value> {
        self.binding.read()
    }

    /// Apply a SET.
    ///
    /// Non-settable callbacks refuse with `ReadOnly` before the value is
    /// looked at; otherwise the binding's type and length checks apply.
    pub fn set_value(&self, value: &Value) -> std::result::Result<(), ErrorStatus> {
        if !self.settable {
            return Err(ErrorStatus::ReadOnly);
        }
        self.binding.write(value)?;
        self.set_occurred.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Ordered collection of value callbacks.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Arc<ValueCallback>>,
    next_id: u64,
    sorted: bool,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            sorted: true,
        }
    }

    /// Register a binding at `oid`.
    ///
    /// Invalid OIDs are refused so they can never match a request.
    pub fn add(&mut self, oid: Oid, binding: Binding, settable: bool) -> Result<CallbackId> {
        if !oid.is_valid() {
            return Err(Error::invalid_oid_with_input(
                OidErrorKind::MissingPrefix,
                oid.to_dotted_string(),
            ));
        }
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.entries.push(Arc::new(ValueCallback {
            id,
            oid,
            binding,
            settable,
            set_occurred: AtomicBool::new(false),
        }));
        self.sorted = self.entries.len() <= 1;
        Ok(id)
    }

    /// Remove a callback by handle. The bound value is left untouched.
    pub fn remove(&mut self, id: CallbackId) -> bool {
        match self.entries.iter().position(|cb| cb.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Stable sort by numeric OID order.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.oid.cmp(&b.oid));
        self.sorted = true;
    }

    /// Sort only if something was added since the last sort.
    pub fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.sort();
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Look up the callback answering for `target`.
    ///
    /// Without `walk` this is an exact match. With `walk` an exact match
    /// yields the entry after it, and an unregistered `target` yields the
    /// first entry below it in the tree. Scanning starts at `start_at` and
    /// never wraps. Returns the entry and its index.
    pub fn find(
        &self,
        target: &Oid,
        walk: bool,
        start_at: usize,
    ) -> Option<(usize, &Arc<ValueCallback>)> {
        if !target.is_valid() {
            return None;
        }
        let mut use_next = false;
        for (index, callback) in self.entries.iter().enumerate().skip(start_at) {
            if use_next {
                return Some((index, callback));
            }
            if callback.oid == *target {
                if walk {
                    use_next = true;
                    continue;
                }
                return Some((index, callback));
            }
            if walk && callback.oid.is_subtree_of(target) {
                return Some((index, callback));
            }
        }
        None
    }

    /// Callback registered under `id`.
    pub fn get(&self, id: CallbackId) -> Option<&Arc<ValueCallback>> {
        self.entries.iter().find(|cb| cb.id == id)
    }

    /// Iterate in current order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ValueCallback>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any callback recorded a successful SET.
    pub fn any_set_occurred(&self) -> bool {
        self.entries.iter().any(|cb| cb.set_occurred())
    }

    /// Clear every callback's SET flag.
    pub fn reset_set_occurred(&self) {
        for cb in &self.entries {
            cb.reset_set_occurred();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(dotted: &str) -> Oid {
        Oid::from_dotted_string(dotted)
    }

    fn registry_of(oids: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for (i, s) in oids.iter().enumerate() {
            registry
                .add(oid(s), Binding::integer(shared_i32(i as i32)), false)
                .unwrap();
        }
        registry
    }

    fn walk_order(registry: &Registry) -> Vec<String> {
        registry
            .iter()
            .map(|cb| cb.oid().to_dotted_string().to_owned())
            .collect()
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    #[test]
    fn test_sort_numeric_order() {
        let mut registry = registry_of(&[
            ".1.3.6.1.4.1.510.2",
            ".1.3.6.1.4.1.5100.1",
            ".1.3.6.1.4.1.51.1",
            ".1.3.6.1.4.1.5.2",
            ".1.3.6.1.4.1.510.1",
            ".1.3.6.1.4.1.51.2",
        ]);
        assert!(!registry.is_sorted());
        registry.sort();
        assert_eq!(
            walk_order(&registry),
            vec![
                ".1.3.6.1.4.1.5.2",
                ".1.3.6.1.4.1.51.1",
                ".1.3.6.1.4.1.51.2",
                ".1.3.6.1.4.1.510.1",
                ".1.3.6.1.4.1.510.2",
                ".1.3.6.1.4.1.5100.1",
            ]
        );
    }

    #[test]
    fn test_invalid_oid_refused() {
        let mut registry = Registry::new();
        let binding = Binding::integer(shared_i32(0));
        let added = registry.add(oid("1.3.6.1"), binding, false);
        assert!(added.is_err());
        assert!(registry.is_empty());
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[test]
    fn test_find_exact() {
        let mut registry = registry_of(&[".1.3.6.1.4.1.5.1", ".1.3.6.1.4.1.5.2"]);
        registry.sort();
        let (index, cb) = registry.find(&oid(".1.3.6.1.4.1.5.2"), false, 0).unwrap();
        assert_eq!(index, 1);
        assert_eq!(cb.oid().to_dotted_string(), ".1.3.6.1.4.1.5.2");
        assert!(registry.find(&oid(".1.3.6.1.4.1.5"), false, 0).is_none());
    }

    #[test]
    fn test_find_walk_successor_no_wrap() {
        let mut registry = registry_of(&[".1.3.6.1.4.1.5.1", ".1.3.6.1.4.1.5.2"]);
        registry.sort();
        let (_, next) = registry.find(&oid(".1.3.6.1.4.1.5.1"), true, 0).unwrap();
        assert_eq!(next.oid().to_dotted_string(), ".1.3.6.1.4.1.5.2");
        assert!(registry.find(&oid(".1.3.6.1.4.1.5.2"), true, 0).is_none());
    }

    #[test]
    fn test_find_walk_unregistered_prefix() {
        let mut registry = registry_of(&[
            ".1.3.6.1.4.1.5.2",
            ".1.3.6.1.4.1.509.4.1",
            ".1.3.6.1.4.1.510.1",
        ]);
        registry.sort();

        let (_, first) = registry.find(&oid(".1.3.6.1.4.1.509"), true, 0).unwrap();
        assert_eq!(first.oid().to_dotted_string(), ".1.3.6.1.4.1.509.4.1");

        // no descendant registered: not found, and no wrap to the start
        assert!(registry.find(&oid(".1.3.6.1.4.1.508"), true, 0).is_none());
    }

    #[test]
    fn test_find_respects_start_at() {
        let mut registry = registry_of(&[".1.3.6.1.4.1.5.1", ".1.3.6.1.4.1.5.2"]);
        registry.sort();
        assert!(registry.find(&oid(".1.3.6.1.4.1.5.1"), false, 1).is_none());
    }

    // ========================================================================
    // Removal and SET
    // ========================================================================

    #[test]
    fn test_remove_by_handle() {
        let mut registry = Registry::new();
        let cell = shared_i32(3);
        let target = oid(".1.3.6.1.4.1.5.1");
        let binding = Binding::integer(cell.clone());
        let id = registry.add(target, binding, true).unwrap();
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
        // value outlives its registration
        assert_eq!(cell.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_set_value_flags() {
        let mut registry = Registry::new();
        let cell = shared_i32(1);
        let writable = Binding::integer(cell.clone());
        let read_only = Binding::integer(shared_i32(0));
        let rw = registry
            .add(oid(".1.3.6.1.4.1.5.1"), writable, true)
            .unwrap();
        let ro = registry
            .add(oid(".1.3.6.1.4.1.5.2"), read_only, false)
            .unwrap();

        let ro_cb = registry.get(ro).unwrap();
        let refused = ro_cb.set_value(&Value::Integer(9));
        assert_eq!(refused, Err(ErrorStatus::ReadOnly));
        assert!(!registry.any_set_occurred());

        let rw_cb = registry.get(rw).unwrap();
        rw_cb.set_value(&Value::Integer(9)).unwrap();
        assert_eq!(cell.load(Ordering::Relaxed), 9);
        assert!(rw_cb.set_occurred());
        assert!(registry.any_set_occurred());

        registry.reset_set_occurred();
        assert!(!rw_cb.set_occurred());
    }
}
