//! Scope stack
//!
//! Named statement bindings layered global → theory → session → graph
//! invocation. Resolution walks outward from the innermost frame. Frames
//! record insertion order so a transaction rollback can truncate each frame
//! to its snapshot size.

use crate::hdc::Vector;
use crate::kb::CanonicalMetadata;
use rustc_hash::FxHashMap;

/// What a `@dest` name is bound to
#[derive(Debug, Clone)]
pub struct ScopeBinding {
    pub metadata: CanonicalMetadata,
    pub vector: Vector,
}

#[derive(Debug)]
struct Frame {
    label: String,
    order: Vec<String>,
    bindings: FxHashMap<String, ScopeBinding>,
}

impl Frame {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            order: Vec::new(),
            bindings: FxHashMap::default(),
        }
    }
}

/// Captured frame sizes for rollback
#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    frame_count: usize,
    key_counts: Vec<usize>,
}

/// Stack of named binding frames
#[derive(Debug)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    /// A scope with its global frame in place
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new("global")],
        }
    }

    pub fn push_frame(&mut self, label: &str) {
        self.frames.push(Frame::new(label));
    }

    pub fn pop_frame(&mut self) {
        // The global frame never pops.
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current_label(&self) -> &str {
        self.frames
            .last()
            .map(|f| f.label.as_str())
            .unwrap_or("global")
    }

    /// Bind a name in the innermost frame. `_` is the discard name and is
    /// dropped silently; rebinding a name shadows in place.
    pub fn bind(&mut self, name: &str, binding: ScopeBinding) {
        if name == "_" {
            return;
        }
        if let Some(frame) = self.frames.last_mut() {
            if !frame.bindings.contains_key(name) {
                frame.order.push(name.to_string());
            }
            frame.bindings.insert(name.to_string(), binding);
        }
    }

    /// Resolve a `$name`, walking from the innermost frame outward
    pub fn resolve(&self, name: &str) -> Option<&ScopeBinding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    /// Total bindings across all frames (reported by `dump`)
    pub fn binding_count(&self) -> usize {
        self.frames.iter().map(|f| f.order.len()).sum()
    }

    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            frame_count: self.frames.len(),
            key_counts: self.frames.iter().map(|f| f.order.len()).collect(),
        }
    }

    /// Drop frames and bindings created after the snapshot
    pub fn rollback(&mut self, snapshot: &ScopeSnapshot) {
        self.frames.truncate(snapshot.frame_count);
        for (frame, keep) in self.frames.iter_mut().zip(snapshot.key_counts.iter()) {
            while frame.order.len() > *keep {
                if let Some(name) = frame.order.pop() {
                    frame.bindings.remove(&name);
                }
            }
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdc::Vector;
    use std::collections::BTreeSet;

    fn binding(op: &str) -> ScopeBinding {
        ScopeBinding {
            metadata: CanonicalMetadata::positive(op, vec![]),
            vector: Vector::Exact {
                products: BTreeSet::new(),
            },
        }
    }

    #[test]
    fn test_resolution_walks_outward() {
        let mut scope = Scope::new();
        scope.bind("x", binding("outer"));
        scope.push_frame("graph");
        scope.bind("x", binding("inner"));
        assert_eq!(scope.resolve("x").unwrap().metadata.operator, "inner");
        scope.pop_frame();
        assert_eq!(scope.resolve("x").unwrap().metadata.operator, "outer");
    }

    #[test]
    fn test_discard_name_not_stored() {
        let mut scope = Scope::new();
        scope.bind("_", binding("x"));
        assert!(scope.resolve("_").is_none());
        assert_eq!(scope.binding_count(), 0);
    }

    #[test]
    fn test_global_frame_never_pops() {
        let mut scope = Scope::new();
        scope.pop_frame();
        scope.bind("a", binding("x"));
        assert!(scope.resolve("a").is_some());
    }

    #[test]
    fn test_snapshot_rollback() {
        let mut scope = Scope::new();
        scope.bind("keep", binding("k"));
        let snapshot = scope.snapshot();

        scope.bind("drop1", binding("d"));
        scope.push_frame("session");
        scope.bind("drop2", binding("d"));
        scope.rollback(&snapshot);

        assert_eq!(scope.depth(), 1);
        assert!(scope.resolve("keep").is_some());
        assert!(scope.resolve("drop1").is_none());
        assert!(scope.resolve("drop2").is_none());
    }

    #[test]
    fn test_rebinding_shadows_in_place() {
        let mut scope = Scope::new();
        scope.bind("x", binding("first"));
        scope.bind("x", binding("second"));
        assert_eq!(scope.binding_count(), 1);
        assert_eq!(scope.resolve("x").unwrap().metadata.operator, "second");
    }
}
