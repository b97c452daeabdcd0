//! Combinators that distribute one input across several children.
//!
//! Children are visited in declared order and all of them observe an item
//! before the parent returns.

use crate::error::{PipelineError, Result};
use crate::node::{
    impl_into_target, list_factory, Downstream, Factory, Flow, KeyFn, Node, Target,
};
use crate::value::{resolve_index, SharedMap, Value};
use std::collections::BTreeMap;
use tracing::trace;

/// A fan-out child slot: the child, its last snapshot, and whether it still
/// accepts input
struct Branch {
    target: Downstream,
    alive: bool,
}

impl Branch {
    fn new(target: impl Into<Target>) -> Self {
        Self {
            target: Downstream::new(target),
            alive: true,
        }
    }

    /// Push an item unless the branch is dead
    fn feed(&mut self, item: Value) -> Result<()> {
        if !self.alive {
            return Ok(());
        }
        if self.target.send(item)?.is_done() {
            trace!(branch = self.target.name(), "pruned finished branch");
            self.alive = false;
        }
        Ok(())
    }
}

fn snapshot(branches: &[Branch]) -> Value {
    Value::Tuple(branches.iter().map(|b| b.target.output()).collect())
}

fn any_alive(branches: &[Branch]) -> bool {
    branches.iter().any(|b| b.alive)
}

fn finish_all(branches: &mut [Branch]) -> Result<Value> {
    for branch in branches.iter_mut() {
        branch.target.finish()?;
    }
    Ok(snapshot(branches))
}

/// Broadcasts every item to all children
///
/// Children that finish are pruned; the split is done once all of them are.
/// Output is the tuple of every child's snapshot, dead ones frozen.
pub struct Split {
    branches: Vec<Branch>,
}

impl Split {
    pub fn new(children: Vec<Target>) -> Self {
        Self {
            branches: children.into_iter().map(Branch::new).collect(),
        }
    }
}

impl Node for Split {
    fn output(&self) -> Value {
        snapshot(&self.branches)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if !any_alive(&self.branches) {
            return Ok(Flow::Done);
        }
        for branch in self.branches.iter_mut() {
            branch.feed(item.clone())?;
        }
        if any_alive(&self.branches) {
            Ok(Flow::Continue(self.output()))
        } else {
            Ok(Flow::Done)
        }
    }

    fn finish(&mut self) -> Result<Value> {
        finish_all(&mut self.branches)
    }

    fn name(&self) -> &str {
        "split"
    }
}

/// Routes each item to the child at the index chosen by the selector
///
/// Negative indices count back from the last child. Items routed to a dead
/// child are dropped; the switch is done once every child is.
pub struct Switch {
    selector: Box<dyn FnMut(&Value) -> Result<i64> + Send>,
    branches: Vec<Branch>,
}

impl Switch {
    pub fn new<F>(selector: F, children: Vec<Target>) -> Self
    where
        F: FnMut(&Value) -> Result<i64> + Send + 'static,
    {
        Self {
            selector: Box::new(selector),
            branches: children.into_iter().map(Branch::new).collect(),
        }
    }
}

impl Node for Switch {
    fn output(&self) -> Value {
        snapshot(&self.branches)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let index = resolve_index((self.selector)(&item)?, self.branches.len())?;
        self.branches[index].feed(item)?;
        if any_alive(&self.branches) {
            Ok(Flow::Continue(self.output()))
        } else {
            Ok(Flow::Done)
        }
    }

    fn finish(&mut self) -> Result<Value> {
        finish_all(&mut self.branches)
    }

    fn name(&self) -> &str {
        "switch"
    }
}

/// Routes each item to a branch chosen by key, creating branches on demand
///
/// Keys without a preconfigured branch get one from the factory the first
/// time they appear. Output is a shared map from key to the branch's latest
/// snapshot, updated in place. Items for a dead branch are dropped.
pub struct SwitchByKey {
    key_fn: KeyFn,
    factory: Factory,
    branches: BTreeMap<Value, Branch>,
    out: SharedMap,
}

impl SwitchByKey {
    pub fn new<F>(key_fn: F) -> Self
    where
        F: FnMut(&Value) -> Result<Value> + Send + 'static,
    {
        Self {
            key_fn: Box::new(key_fn),
            factory: list_factory(),
            branches: BTreeMap::new(),
            out: SharedMap::new(),
        }
    }

    /// Preconfigure the branch for `key`
    pub fn with_branch(mut self, key: impl Into<Value>, target: impl Into<Target>) -> Self {
        let key = key.into();
        let branch = Branch::new(target);
        self.out.insert(key.clone(), branch.target.output());
        self.branches.insert(key, branch);
        self
    }

    /// Set the factory used for keys seen for the first time
    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = factory;
        self
    }
}

impl Node for SwitchByKey {
    fn output(&self) -> Value {
        Value::Map(self.out.clone())
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let key = (self.key_fn)(&item)?;
        let factory = &mut self.factory;
        let branch = self.branches.entry(key.clone()).or_insert_with(|| {
            trace!(%key, "created branch");
            Branch::new(factory())
        });
        branch.feed(item)?;
        self.out.insert(key, branch.target.output());
        Ok(Flow::Continue(self.output()))
    }

    fn finish(&mut self) -> Result<Value> {
        for (key, branch) in self.branches.iter_mut() {
            let out = branch.target.finish()?;
            self.out.insert(key.clone(), out);
        }
        Ok(self.output())
    }

    fn name(&self) -> &str {
        "switch_by_key"
    }
}

/// Routes component `i` of each item to child `i`
///
/// Items must be tuples or lists with at least one component per child;
/// extra components are ignored.
pub struct Unzip {
    branches: Vec<Branch>,
}

impl Unzip {
    pub fn new(children: Vec<Target>) -> Self {
        Self {
            branches: children.into_iter().map(Branch::new).collect(),
        }
    }
}

impl Node for Unzip {
    fn output(&self) -> Value {
        snapshot(&self.branches)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let components = item.components()?;
        if components.len() < self.branches.len() {
            return Err(PipelineError::StructuralMismatch {
                expected: self.branches.len(),
                found: components.len(),
            });
        }
        for (branch, component) in self.branches.iter_mut().zip(components) {
            branch.feed(component)?;
        }
        if any_alive(&self.branches) {
            Ok(Flow::Continue(self.output()))
        } else {
            Ok(Flow::Done)
        }
    }

    fn finish(&mut self) -> Result<Value> {
        finish_all(&mut self.branches)
    }

    fn name(&self) -> &str {
        "unzip"
    }
}

impl_into_target!(node: Split, Switch, SwitchByKey, Unzip);
