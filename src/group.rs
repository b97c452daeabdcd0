//! Windowing combinators.
//!
//! Each group is collected by a fresh accumulator node built from a
//! [`Factory`]. When a group completes, the accumulator is finished and its
//! final output is forwarded to the target as a single item.

use crate::error::{PipelineError, Result};
use crate::node::{
    impl_into_target, list_factory, Downstream, Factory, Flow, KeyFn, Node, Predicate, Target,
};
use crate::value::Value;
use tracing::trace;

/// An in-progress group
struct Accumulator {
    node: Downstream,
    alive: bool,
}

impl Accumulator {
    fn new(factory: &mut Factory) -> Self {
        Self {
            node: Downstream::new(factory()),
            alive: true,
        }
    }

    /// Add an item to the group. An accumulator that is done stops
    /// collecting but the group still runs to its boundary.
    fn feed(&mut self, item: Value) -> Result<()> {
        if self.alive && self.node.send(item)?.is_done() {
            self.alive = false;
        }
        Ok(())
    }

    /// Final output of the completed group
    fn complete(mut self) -> Result<Value> {
        self.node.finish()
    }
}

/// Groups items up to and including the one the boundary predicate accepts
///
/// A trailing group whose boundary never arrived is discarded.
pub struct Group {
    boundary: Predicate,
    factory: Factory,
    current: Option<Accumulator>,
    target: Downstream,
}

impl Group {
    pub fn new<F>(boundary: F, target: impl Into<Target>) -> Self
    where
        F: FnMut(&Value) -> Result<bool> + Send + 'static,
    {
        Self {
            boundary: Box::new(boundary),
            factory: list_factory(),
            current: None,
            target: Downstream::new(target),
        }
    }

    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = factory;
        self
    }
}

impl Node for Group {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let factory = &mut self.factory;
        let group = self
            .current
            .get_or_insert_with(|| Accumulator::new(factory));
        group.feed(item.clone())?;

        if !(self.boundary)(&item)? {
            return Ok(Flow::Continue(self.target.output()));
        }
        match self.current.take() {
            Some(group) => {
                let out = group.complete()?;
                trace!("group boundary reached");
                self.target.send(out)
            }
            None => Ok(Flow::Continue(self.target.output())),
        }
    }

    fn finish(&mut self) -> Result<Value> {
        self.current = None;
        self.target.finish()
    }

    fn name(&self) -> &str {
        "group"
    }
}

/// Groups items into batches of exactly `n`
///
/// A trailing incomplete batch is discarded.
pub struct GroupByN {
    n: usize,
    filled: usize,
    factory: Factory,
    current: Option<Accumulator>,
    target: Downstream,
}

impl GroupByN {
    pub fn new(n: usize, target: impl Into<Target>) -> Result<Self> {
        if n == 0 {
            return Err(PipelineError::Config("group size must be positive".into()));
        }
        Ok(Self {
            n,
            filled: 0,
            factory: list_factory(),
            current: None,
            target: Downstream::new(target),
        })
    }

    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = factory;
        self
    }
}

impl Node for GroupByN {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let factory = &mut self.factory;
        let group = self
            .current
            .get_or_insert_with(|| Accumulator::new(factory));
        group.feed(item)?;
        self.filled += 1;

        if self.filled < self.n {
            return Ok(Flow::Continue(self.target.output()));
        }
        self.filled = 0;
        match self.current.take() {
            Some(group) => {
                let out = group.complete()?;
                trace!(size = self.n, "batch complete");
                self.target.send(out)
            }
            None => Ok(Flow::Continue(self.target.output())),
        }
    }

    fn finish(&mut self) -> Result<Value> {
        if self.filled > 0 {
            trace!(dropped = self.filled, "discarding incomplete batch");
        }
        self.current = None;
        self.filled = 0;
        self.target.finish()
    }

    fn name(&self) -> &str {
        "group_by_n"
    }
}

/// Groups runs of consecutive items sharing a key
///
/// A group is forwarded when an item with a different key arrives, and the
/// last group is flushed when the stream ends.
pub struct GroupByKey {
    key_fn: KeyFn,
    factory: Factory,
    current: Option<(Value, Accumulator)>,
    target: Downstream,
}

impl GroupByKey {
    pub fn new<F>(key_fn: F, target: impl Into<Target>) -> Self
    where
        F: FnMut(&Value) -> Result<Value> + Send + 'static,
    {
        Self {
            key_fn: Box::new(key_fn),
            factory: list_factory(),
            current: None,
            target: Downstream::new(target),
        }
    }

    /// Group runs of equal items
    pub fn identity(target: impl Into<Target>) -> Self {
        Self::new(|item| Ok(item.clone()), target)
    }

    pub fn with_factory(mut self, factory: Factory) -> Self {
        self.factory = factory;
        self
    }
}

impl Node for GroupByKey {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let key = (self.key_fn)(&item)?;
        if let Some((current_key, group)) = self.current.as_mut() {
            if *current_key == key {
                group.feed(item)?;
                return Ok(Flow::Continue(self.target.output()));
            }
        }

        if let Some((old_key, group)) = self.current.take() {
            let out = group.complete()?;
            trace!(key = %old_key, "key changed, forwarding group");
            if self.target.send(out)?.is_done() {
                return Ok(Flow::Done);
            }
        }

        let mut group = Accumulator::new(&mut self.factory);
        group.feed(item)?;
        self.current = Some((key, group));
        Ok(Flow::Continue(self.target.output()))
    }

    fn finish(&mut self) -> Result<Value> {
        if let Some((key, group)) = self.current.take() {
            let out = group.complete()?;
            trace!(%key, "flushing final group");
            self.target.send(out)?;
        }
        self.target.finish()
    }

    fn name(&self) -> &str {
        "group_by_key"
    }
}

/// Skips leading placeholder items, then forwards everything
///
/// Meant for re-merging a branch into a shared node: the placeholders are
/// the `Null`/`Sentinel` outputs siblings report before their first real
/// item. Only leading placeholders are skipped, so this does not hold up
/// under re-entrant composition.
pub struct Merge {
    started: bool,
    target: Downstream,
}

impl Merge {
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            started: false,
            target: Downstream::new(target),
        }
    }
}

impl Node for Merge {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if !self.started && item.is_placeholder() {
            return Ok(Flow::Continue(self.target.output()));
        }
        self.started = true;
        self.target.send(item)
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "merge"
    }
}

impl_into_target!(node: Group, GroupByN, GroupByKey, Merge);
