//! Linked sequence storage with live sublist views.
//!
//! Every element lives in a node of a shared slab. The slab forms a circular
//! doubly linked list closed by a sentinel at index 0. A [`ScalarArray`] is a
//! window over that list: `len` nodes following an anchor node. The root
//! array is anchored on the sentinel; a sublist is anchored on the node just
//! before its first element, so elements inserted in front of the window show
//! up inside it while its length stays what the view itself recorded.
//!
//! Nodes carry a generation counter. A view whose anchor node has been
//! unlinked (or recycled), or whose window now runs past the end of the list,
//! is stale and every access fails with a concurrent modification fault.

use super::{Scalar, ScalarValue};
use crate::error::EngineError;
use parking_lot::Mutex;
use std::sync::Arc;

pub type ArrayRef = Arc<ScalarArray>;

const HEAD: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeRef {
    id: usize,
    gen: u64,
}

struct Node {
    value: Option<Scalar>,
    prev: usize,
    next: usize,
    gen: u64,
    live: bool,
}

struct Store {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

impl Store {
    fn new() -> Self {
        Store {
            nodes: vec![Node {
                value: None,
                prev: HEAD,
                next: HEAD,
                gen: 0,
                live: true,
            }],
            free: Vec::new(),
        }
    }

    fn node_ref(&self, id: usize) -> NodeRef {
        NodeRef {
            id,
            gen: self.nodes[id].gen,
        }
    }

    fn is_current(&self, node: NodeRef) -> bool {
        self.nodes
            .get(node.id)
            .map(|n| n.live && n.gen == node.gen)
            .unwrap_or(false)
    }

    /// Link a new node holding `value` directly after `at`.
    fn insert_after(&mut self, at: usize, value: Scalar) -> usize {
        let next = self.nodes[at].next;
        let id = match self.free.pop() {
            Some(id) => {
                let node = &mut self.nodes[id];
                node.value = Some(value);
                node.prev = at;
                node.next = next;
                node.gen += 1;
                node.live = true;
                id
            }
            None => {
                self.nodes.push(Node {
                    value: Some(value),
                    prev: at,
                    next,
                    gen: 0,
                    live: true,
                });
                self.nodes.len() - 1
            }
        };
        self.nodes[at].next = id;
        self.nodes[next].prev = id;
        id
    }

    fn unlink(&mut self, id: usize) -> Scalar {
        let (prev, next) = (self.nodes[id].prev, self.nodes[id].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        let node = &mut self.nodes[id];
        node.live = false;
        self.free.push(id);
        node.value.take().unwrap_or_default()
    }

    /// The node `steps` links after `from`.
    fn nth_after(&self, from: usize, steps: usize) -> usize {
        let mut at = from;
        for _ in 0..steps {
            at = self.nodes[at].next;
        }
        at
    }

    fn nth_before(&self, from: usize, steps: usize) -> usize {
        let mut at = from;
        for _ in 0..steps {
            at = self.nodes[at].prev;
        }
        at
    }

    fn value(&self, id: usize) -> Scalar {
        self.nodes[id].value.clone().unwrap_or_default()
    }
}

struct ViewMeta {
    anchor: NodeRef,
    len: usize,
    parent: Option<Arc<Mutex<ViewMeta>>>,
}

/// A Sequence of Scalars, or a live window onto one.
pub struct ScalarArray {
    store: Arc<Mutex<Store>>,
    meta: Arc<Mutex<ViewMeta>>,
}

impl ScalarArray {
    pub fn new() -> ArrayRef {
        Arc::new(ScalarArray {
            store: Arc::new(Mutex::new(Store::new())),
            meta: Arc::new(Mutex::new(ViewMeta {
                anchor: NodeRef { id: HEAD, gen: 0 },
                len: 0,
                parent: None,
            })),
        })
    }

    pub fn from_vec(items: Vec<Scalar>) -> ArrayRef {
        let array = ScalarArray::new();
        {
            let mut store = array.store.lock();
            let mut at = HEAD;
            for item in &items {
                at = store.insert_after(at, item.clone());
            }
            array.meta.lock().len = items.len();
        }
        array
    }

    pub fn is_view(&self) -> bool {
        self.meta.lock().parent.is_some()
    }

    /// Validate this view and every ancestor, returning `(anchor, len)`.
    fn window(&self, store: &Store) -> Result<(usize, usize), EngineError> {
        let (anchor, len, mut parent) = {
            let meta = self.meta.lock();
            (meta.anchor, meta.len, meta.parent.clone())
        };
        if parent.is_some() {
            check_window(store, anchor, len)?;
        }
        while let Some(meta) = parent {
            let next = {
                let guard = meta.lock();
                if guard.parent.is_some() {
                    check_window(store, guard.anchor, guard.len)?;
                }
                guard.parent.clone()
            };
            parent = next;
        }
        Ok((anchor.id, len))
    }

    /// Apply a length change to this view and all of its ancestors.
    fn adjust(&self, delta: isize) {
        let mut current = Some(self.meta.clone());
        while let Some(meta) = current {
            let mut guard = meta.lock();
            guard.len = (guard.len as isize + delta).max(0) as usize;
            current = guard.parent.clone();
        }
    }

    fn node_at(store: &Store, anchor: usize, len: usize, index: usize) -> usize {
        if anchor == HEAD && index > len / 2 {
            store.nth_before(HEAD, len - index)
        } else {
            store.nth_after(anchor, index + 1)
        }
    }

    fn resolve_index(index: i64, len: usize) -> Result<usize, EngineError> {
        if index < 0 {
            let from_end = len as i64 + index;
            if from_end < 0 {
                return Err(EngineError::BadIndex(format!(
                    "{} from end of sequence of size {}",
                    index, len
                )));
            }
            Ok(from_end as usize)
        } else {
            Ok(index as usize)
        }
    }

    pub fn len(&self) -> Result<usize, EngineError> {
        let store = self.store.lock();
        let (_, len) = self.window(&store)?;
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }

    /// The element cell at `index`, growing the sequence with empty cells
    /// when the index is past the end.
    pub fn get(&self, index: i64) -> Result<Scalar, EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let index = Self::resolve_index(index, len)?;
        if index < len {
            let id = Self::node_at(&store, anchor, len, index);
            return Ok(store.value(id));
        }
        let mut at = store.nth_after(anchor, len);
        let mut last = Scalar::null();
        for _ in len..=index {
            last = Scalar::null();
            at = store.insert_after(at, last.clone());
        }
        self.adjust((index + 1 - len) as isize);
        Ok(last)
    }

    /// The element cell at `index` without growing the sequence.
    pub fn get_existing(&self, index: i64) -> Result<Option<Scalar>, EngineError> {
        let store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let index = match Self::resolve_index(index, len) {
            Ok(index) if index < len => index,
            _ => return Ok(None),
        };
        let id = Self::node_at(&store, anchor, len, index);
        Ok(Some(store.value(id)))
    }

    pub fn push(&self, value: Scalar) -> Result<(), EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let last = store.nth_after(anchor, len);
        store.insert_after(last, value);
        self.adjust(1);
        Ok(())
    }

    pub fn pop(&self) -> Result<Option<Scalar>, EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        if len == 0 {
            return Ok(None);
        }
        let last = store.nth_after(anchor, len);
        let value = store.unlink(last);
        self.adjust(-1);
        Ok(Some(value))
    }

    pub fn shift(&self) -> Result<Option<Scalar>, EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        if len == 0 {
            return Ok(None);
        }
        let first = store.nodes[anchor].next;
        let value = store.unlink(first);
        self.adjust(-1);
        Ok(Some(value))
    }

    pub fn unshift(&self, value: Scalar) -> Result<(), EngineError> {
        self.insert(0, value)
    }

    /// Insert `value` so it ends up at `index`.
    pub fn insert(&self, index: i64, value: Scalar) -> Result<(), EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let index = Self::resolve_index(index, len)?;
        if index > len {
            return Err(EngineError::BadIndex(format!(
                "insert at {} into sequence of size {}",
                index, len
            )));
        }
        let at = store.nth_after(anchor, index);
        store.insert_after(at, value);
        self.adjust(1);
        Ok(())
    }

    pub fn remove_at(&self, index: i64) -> Result<Scalar, EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let index = Self::resolve_index(index, len)?;
        if index >= len {
            return Err(EngineError::BadIndex(format!(
                "remove {} from sequence of size {}",
                index, len
            )));
        }
        let id = Self::node_at(&store, anchor, len, index);
        let value = store.unlink(id);
        self.adjust(-1);
        Ok(value)
    }

    /// Remove every element equal to `target`; returns how many went.
    pub fn remove_value(&self, target: &ScalarValue) -> Result<usize, EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let mut doomed = Vec::new();
        let mut at = anchor;
        for _ in 0..len {
            at = store.nodes[at].next;
            if store.value(at).get() == *target {
                doomed.push(at);
            }
        }
        for id in &doomed {
            store.unlink(*id);
        }
        self.adjust(-(doomed.len() as isize));
        Ok(doomed.len())
    }

    /// The element cells in order.
    pub fn snapshot(&self) -> Result<Vec<Scalar>, EngineError> {
        let store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let mut out = Vec::with_capacity(len);
        let mut at = anchor;
        for _ in 0..len {
            at = store.nodes[at].next;
            out.push(store.value(at));
        }
        Ok(out)
    }

    pub fn clear(&self) -> Result<(), EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        for _ in 0..len {
            let first = store.nodes[anchor].next;
            store.unlink(first);
        }
        self.adjust(-(len as isize));
        Ok(())
    }

    /// Write `items` into the existing element positions, in order. The
    /// structure is untouched so views over this sequence stay valid.
    pub fn reorder(&self, items: Vec<Scalar>) -> Result<(), EngineError> {
        let mut store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        if items.len() != len {
            return Err(EngineError::runtime(format!(
                "reorder expected {} elements, got {}",
                len,
                items.len()
            )));
        }
        let mut at = anchor;
        for item in items {
            at = store.nodes[at].next;
            store.nodes[at].value = Some(item);
        }
        Ok(())
    }

    /// A live view over `[from, to)`.
    pub fn sublist(&self, from: i64, to: i64) -> Result<ArrayRef, EngineError> {
        let store = self.store.lock();
        let (anchor, len) = self.window(&store)?;
        let from = Self::resolve_index(from, len)?;
        let to = Self::resolve_index(to, len)?;
        if from > to || to > len {
            return Err(EngineError::BadIndex(format!(
                "sublist [{}, {}) of sequence of size {}",
                from, to, len
            )));
        }
        let start = store.nth_after(anchor, from);
        let view = ScalarArray {
            store: self.store.clone(),
            meta: Arc::new(Mutex::new(ViewMeta {
                anchor: store.node_ref(start),
                len: to - from,
                parent: Some(self.meta.clone()),
            })),
        };
        Ok(Arc::new(view))
    }
}

fn check_window(store: &Store, anchor: NodeRef, len: usize) -> Result<(), EngineError> {
    if !store.is_current(anchor) {
        return Err(EngineError::ConcurrentModification(
            "sublist anchor was removed from its parent".to_string(),
        ));
    }
    let mut at = anchor.id;
    for _ in 0..len {
        at = store.nodes[at].next;
        if at == HEAD {
            return Err(EngineError::ConcurrentModification(
                "sublist window extends past the end of its parent".to_string(),
            ));
        }
    }
    Ok(())
}
