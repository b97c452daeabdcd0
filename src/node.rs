use crate::error::{PipelineError, Result};
use crate::fanout::Split;
use crate::value::{SharedList, SharedSet, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// What a node reports after accepting an item
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// The item was consumed; carries the updated output snapshot
    Continue(Value),
    /// The node wants no more input. The item that triggered this was not
    /// forwarded and the node's output stays at its previous snapshot
    Done,
}

impl Flow {
    pub fn is_done(&self) -> bool {
        matches!(self, Flow::Done)
    }
}

/// A stateful consumer in a push pipeline
///
/// A node has a defined [`output`](Node::output) as soon as it is built,
/// before it sees any input. Parents push items through
/// [`accept`](Node::accept) and must never push again after a node returned
/// [`Flow::Done`]. [`finish`](Node::finish) is called exactly once, when the
/// driving sequence ends, whether or not the node is done.
pub trait Node: Send {
    /// Current output snapshot
    fn output(&self) -> Value;

    /// Consume one item
    fn accept(&mut self, item: Value) -> Result<Flow>;

    /// End-of-stream notification; returns the final output snapshot
    fn finish(&mut self) -> Result<Value> {
        Ok(self.output())
    }

    /// Get a human-readable name for this node
    fn name(&self) -> &str {
        "node"
    }
}

/// Declarative description of a pipeline's terminal shape
pub enum Target {
    /// Growable sequence; items are appended and the list is the output
    List(SharedList),
    /// Unique collection; items are inserted and the set is the output
    Set(SharedSet),
    /// Fixed-length tuple of targets, broadcast to in order
    Tuple(Vec<Target>),
    /// An already-built node, used unchanged
    Node(Box<dyn Node>),
    /// A raw sink object such as an aggregate, used as-is
    Sink(Box<dyn Node>),
}

impl Target {
    /// Resolve this description into a primed node
    pub fn resolve(self) -> Box<dyn Node> {
        match self {
            Target::List(list) => Box::new(Append::new(list)),
            Target::Set(set) => Box::new(Add::new(set)),
            Target::Tuple(children) => Box::new(Split::new(children)),
            Target::Node(node) | Target::Sink(node) => node,
        }
    }
}

/// Resolve anything convertible into a [`Target`]
pub fn resolve(target: impl Into<Target>) -> Box<dyn Node> {
    target.into().resolve()
}

impl From<SharedList> for Target {
    fn from(list: SharedList) -> Self {
        Target::List(list)
    }
}

impl From<SharedSet> for Target {
    fn from(set: SharedSet) -> Self {
        Target::Set(set)
    }
}

impl From<Box<dyn Node>> for Target {
    fn from(node: Box<dyn Node>) -> Self {
        Target::Node(node)
    }
}

impl From<Vec<Target>> for Target {
    fn from(children: Vec<Target>) -> Self {
        Target::Tuple(children)
    }
}

impl<A: Into<Target>, B: Into<Target>> From<(A, B)> for Target {
    fn from((a, b): (A, B)) -> Self {
        Target::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Target>, B: Into<Target>, C: Into<Target>> From<(A, B, C)> for Target {
    fn from((a, b, c): (A, B, C)) -> Self {
        Target::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

impl<A, B, C, D> From<(A, B, C, D)> for Target
where
    A: Into<Target>,
    B: Into<Target>,
    C: Into<Target>,
    D: Into<Target>,
{
    fn from((a, b, c, d): (A, B, C, D)) -> Self {
        Target::Tuple(vec![a.into(), b.into(), c.into(), d.into()])
    }
}

/// Implements `From<T> for Target` for concrete node types.
/// Combinators become `Target::Node`, aggregates `Target::Sink`.
macro_rules! impl_into_target {
    (node: $($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for $crate::node::Target {
                fn from(node: $ty) -> Self {
                    $crate::node::Target::Node(Box::new(node))
                }
            }
        )+
    };
    (sink: $($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for $crate::node::Target {
                fn from(node: $ty) -> Self {
                    $crate::node::Target::Sink(Box::new(node))
                }
            }
        )+
    };
}

pub(crate) use impl_into_target;

/// User transform applied to each item
pub type MapFn = Box<dyn FnMut(Value) -> Result<Value> + Send>;

/// User predicate over an item
pub type Predicate = Box<dyn FnMut(&Value) -> Result<bool> + Send>;

/// User function deriving a routing or grouping key from an item
pub type KeyFn = Box<dyn FnMut(&Value) -> Result<Value> + Send>;

/// A child node together with the last output it reported
pub(crate) struct Downstream {
    node: Box<dyn Node>,
    out: Value,
}

impl Downstream {
    /// Resolve and prime a target
    pub(crate) fn new(target: impl Into<Target>) -> Self {
        let node = resolve(target);
        let out = node.output();
        Self { node, out }
    }

    pub(crate) fn output(&self) -> Value {
        self.out.clone()
    }

    /// Push one item, recording the new snapshot
    pub(crate) fn send(&mut self, item: Value) -> Result<Flow> {
        match self.node.accept(item)? {
            Flow::Continue(out) => {
                self.out = out;
                Ok(Flow::Continue(self.out.clone()))
            }
            Flow::Done => Ok(Flow::Done),
        }
    }

    pub(crate) fn finish(&mut self) -> Result<Value> {
        self.out = self.node.finish()?;
        Ok(self.out.clone())
    }

    pub(crate) fn name(&self) -> &str {
        self.node.name()
    }
}

/// Builds a fresh target for each group or lazily created branch
pub type Factory = Box<dyn FnMut() -> Target + Send>;

/// Box a closure producing anything convertible into a [`Target`]
pub fn factory<F, T>(mut make: F) -> Factory
where
    F: FnMut() -> T + Send + 'static,
    T: Into<Target>,
{
    Box::new(move || make().into())
}

/// The default factory: a new empty list on every call
pub fn list_factory() -> Factory {
    Box::new(|| Target::List(SharedList::new()))
}

/// Appends every item to a shared list and echoes the list
#[derive(Debug)]
pub struct Append {
    list: SharedList,
}

impl Append {
    pub fn new(list: SharedList) -> Self {
        Self { list }
    }
}

impl Node for Append {
    fn output(&self) -> Value {
        Value::List(self.list.clone())
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        self.list.push(item);
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Inserts every item into a shared set and echoes the set
#[derive(Debug)]
pub struct Add {
    set: SharedSet,
}

impl Add {
    pub fn new(set: SharedSet) -> Self {
        Self { set }
    }
}

impl Node for Add {
    fn output(&self) -> Value {
        Value::Set(self.set.clone())
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        self.set.insert(item);
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "add"
    }
}

impl_into_target!(node: Append, Add);

struct SharedState {
    node: Box<dyn Node>,
    done: bool,
    finished: bool,
}

/// A node that several parents can push into
///
/// Clones share one inner node. Once the inner node is done, pushes from any
/// parent return [`Flow::Done`] without reaching it, and only the first
/// `finish` reaches the inner node. A push that loops back into the same
/// shared node while it is still handling an item fails with
/// [`PipelineError::Reentrant`].
#[derive(Clone)]
pub struct SharedNode {
    state: Arc<Mutex<SharedState>>,
    // Kept apart from `state` so snapshots never wait on an in-flight push
    out: Arc<Mutex<Value>>,
}

impl SharedNode {
    pub fn new(target: impl Into<Target>) -> Self {
        let node = resolve(target);
        let out = node.output();
        Self {
            state: Arc::new(Mutex::new(SharedState {
                node,
                done: false,
                finished: false,
            })),
            out: Arc::new(Mutex::new(out)),
        }
    }
}

impl Node for SharedNode {
    fn output(&self) -> Value {
        self.out.lock().clone()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let mut state = self.state.try_lock().ok_or(PipelineError::Reentrant)?;
        if state.done || state.finished {
            return Ok(Flow::Done);
        }
        let flow = state.node.accept(item)?;
        match &flow {
            Flow::Continue(out) => *self.out.lock() = out.clone(),
            Flow::Done => state.done = true,
        }
        Ok(flow)
    }

    fn finish(&mut self) -> Result<Value> {
        let mut state = self.state.try_lock().ok_or(PipelineError::Reentrant)?;
        if !state.finished {
            state.finished = true;
            let out = state.node.finish()?;
            *self.out.lock() = out;
        }
        Ok(self.output())
    }

    fn name(&self) -> &str {
        "shared"
    }
}

impl_into_target!(node: SharedNode);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::Limit;

    #[test]
    fn test_append_echoes_same_list() {
        let list = SharedList::new();
        let mut node = resolve(list.clone());
        assert_eq!(node.output(), Value::List(list.clone()));

        let Flow::Continue(out) = node.accept(Value::from(1)).unwrap() else {
            panic!("append never terminates");
        };
        assert!(out.as_list().unwrap().ptr_eq(&list));
        assert_eq!(list.to_vec(), vec![Value::from(1)]);
    }

    #[test]
    fn test_add_deduplicates() {
        let set = SharedSet::new();
        let mut node = resolve(set.clone());
        for i in [3, 1, 3, 2, 1] {
            node.accept(Value::from(i)).unwrap();
        }
        assert_eq!(
            set.to_vec(),
            vec![Value::from(1), Value::from(2), Value::from(3)]
        );
    }

    #[test]
    fn test_tuple_resolves_to_split() {
        let (a, b) = (SharedList::new(), SharedList::new());
        let mut node = resolve((a.clone(), b.clone()));
        assert_eq!(
            node.output(),
            Value::Tuple(vec![Value::List(a.clone()), Value::List(b.clone())])
        );
        node.accept(Value::from(7)).unwrap();
        assert_eq!(a.to_vec(), vec![Value::from(7)]);
        assert_eq!(b.to_vec(), vec![Value::from(7)]);
    }

    #[test]
    fn test_list_factory_is_fresh() {
        let mut make = list_factory();
        let Target::List(first) = make() else {
            panic!("list factory yields lists");
        };
        let Target::List(second) = make() else {
            panic!("list factory yields lists");
        };
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn test_shared_node_done_for_every_parent() {
        let list = SharedList::new();
        let shared = SharedNode::new(Limit::new(1, list.clone()));
        let mut left = shared.clone();
        let mut right = shared;

        assert!(!left.accept(Value::from(1)).unwrap().is_done());
        assert!(right.accept(Value::from(2)).unwrap().is_done());
        assert!(left.accept(Value::from(3)).unwrap().is_done());
        assert_eq!(list.to_vec(), vec![Value::from(1)]);
    }

    /// Pushes every item back into a shared node it is itself part of
    struct Loopback(Arc<Mutex<Option<SharedNode>>>);

    impl Node for Loopback {
        fn output(&self) -> Value {
            Value::Null
        }

        fn accept(&mut self, item: Value) -> Result<Flow> {
            let Some(mut shared) = self.0.lock().clone() else {
                return Ok(Flow::Continue(Value::Null));
            };
            assert_eq!(shared.output(), Value::Null);
            shared.accept(item)
        }

        fn finish(&mut self) -> Result<Value> {
            Ok(Value::Null)
        }

        fn name(&self) -> &str {
            "loopback"
        }
    }

    #[test]
    fn test_shared_node_rejects_reentrant_push() {
        let slot = Arc::new(Mutex::new(None));
        let mut shared = SharedNode::new(Target::Node(Box::new(Loopback(slot.clone()))));
        *slot.lock() = Some(shared.clone());

        assert_eq!(shared.accept(Value::from(1)), Err(PipelineError::Reentrant));
        // The inner node is free again once the failed push unwinds
        *slot.lock() = None;
        assert!(!shared.accept(Value::from(2)).unwrap().is_done());
    }

    #[test]
    fn test_shared_node_finishes_once() {
        let shared = SharedNode::new(SharedList::new());
        let mut a = shared.clone();
        let mut b = shared;
        a.accept(Value::from(1)).unwrap();
        let first = a.finish().unwrap();
        assert_eq!(b.finish().unwrap(), first);
        assert!(b.accept(Value::from(2)).unwrap().is_done());
    }
}
