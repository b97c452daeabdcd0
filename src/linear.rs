//! Single-input, single-output combinators.
//!
//! Each one wraps exactly one downstream target and reports that target's
//! latest output as its own. A `Done` from the target is passed straight up.

use crate::error::{ErrorKind, PipelineError, Result};
use crate::node::{impl_into_target, Downstream, Flow, MapFn, Node, Predicate, Target};
use crate::value::Value;
use std::collections::HashSet;
use tracing::trace;

/// Forwards `func(item)`
///
/// Errors of the kind registered with [`Map::catch`] drop the item and keep
/// the node running; every other error is fatal.
pub struct Map {
    func: MapFn,
    catch: Option<ErrorKind>,
    target: Downstream,
}

impl Map {
    pub fn new<F>(func: F, target: impl Into<Target>) -> Self
    where
        F: FnMut(Value) -> Result<Value> + Send + 'static,
    {
        Self {
            func: Box::new(func),
            catch: None,
            target: Downstream::new(target),
        }
    }

    /// Skip items whose transform fails with an error of this kind
    pub fn catch(mut self, kind: ErrorKind) -> Self {
        self.catch = Some(kind);
        self
    }
}

impl Node for Map {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        match (self.func)(item) {
            Ok(mapped) => self.target.send(mapped),
            Err(e) if Some(e.kind()) == self.catch => {
                trace!(error = %e, "map dropped item");
                Ok(Flow::Continue(self.target.output()))
            }
            Err(e) => Err(e),
        }
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "map"
    }
}

/// Forwards items for which the predicate holds
pub struct Filter {
    predicate: Predicate,
    target: Downstream,
}

impl Filter {
    pub fn new<F>(predicate: F, target: impl Into<Target>) -> Self
    where
        F: FnMut(&Value) -> Result<bool> + Send + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            target: Downstream::new(target),
        }
    }

    /// Forwards truthy items
    pub fn truthy(target: impl Into<Target>) -> Self {
        Self::new(|item| Ok(item.is_truthy()), target)
    }
}

impl Node for Filter {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if (self.predicate)(&item)? {
            self.target.send(item)
        } else {
            Ok(Flow::Continue(self.target.output()))
        }
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "filter"
    }
}

/// Forwards `item[key]`; a failed lookup is fatal
pub struct Get {
    key: Value,
    target: Downstream,
}

impl Get {
    pub fn new(key: impl Into<Value>, target: impl Into<Target>) -> Self {
        Self {
            key: key.into(),
            target: Downstream::new(target),
        }
    }
}

impl Node for Get {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let part = item.get(&self.key)?;
        self.target.send(part)
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "get"
    }
}

/// Forwards the first `n` items, then is done
pub struct Limit {
    remaining: usize,
    target: Downstream,
}

impl Limit {
    pub fn new(n: usize, target: impl Into<Target>) -> Self {
        Self {
            remaining: n,
            target: Downstream::new(target),
        }
    }
}

impl Node for Limit {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if self.remaining == 0 {
            trace!("limit reached");
            return Ok(Flow::Done);
        }
        self.remaining -= 1;
        self.target.send(item)
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "limit"
    }
}

/// Forwards the first occurrence of each distinct value
///
/// Every distinct value seen is remembered for the life of the node; there
/// is no eviction.
pub struct Unique {
    seen: HashSet<Value>,
    target: Downstream,
}

impl Unique {
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            seen: HashSet::new(),
            target: Downstream::new(target),
        }
    }
}

impl Node for Unique {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if self.seen.contains(&item) {
            return Ok(Flow::Continue(self.target.output()));
        }
        self.seen.insert(item.clone());
        self.target.send(item)
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "unique"
    }
}

/// Forwards items whose arrival position falls in `start..stop` by `step`
pub struct Slice {
    start: usize,
    stop: Option<usize>,
    step: usize,
    position: usize,
    target: Downstream,
}

impl Slice {
    /// `stop: None` leaves the slice open-ended. `step` must be positive.
    pub fn new(
        start: usize,
        stop: Option<usize>,
        step: usize,
        target: impl Into<Target>,
    ) -> Result<Self> {
        if step == 0 {
            return Err(PipelineError::Config("slice step cannot be zero".into()));
        }
        Ok(Self {
            start,
            stop,
            step,
            position: 0,
            target: Downstream::new(target),
        })
    }
}

impl Node for Slice {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let position = self.position;
        if self.stop.is_some_and(|stop| position >= stop) {
            return Ok(Flow::Done);
        }
        self.position += 1;
        if position >= self.start && (position - self.start) % self.step == 0 {
            self.target.send(item)
        } else {
            Ok(Flow::Continue(self.target.output()))
        }
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "slice"
    }
}

/// Discards the pushed item and forwards the next value of a secondary
/// iterator instead
pub struct Pull {
    secondary: Box<dyn Iterator<Item = Value> + Send>,
    target: Downstream,
}

impl Pull {
    pub fn new<I>(secondary: I, target: impl Into<Target>) -> Self
    where
        I: IntoIterator,
        I::IntoIter: Send + 'static,
        I::Item: Into<Value> + 'static,
    {
        Self {
            secondary: Box::new(secondary.into_iter().map(Into::into)),
            target: Downstream::new(target),
        }
    }
}

impl Node for Pull {
    fn output(&self) -> Value {
        self.target.output()
    }

    fn accept(&mut self, _item: Value) -> Result<Flow> {
        let next = self.secondary.next().ok_or(PipelineError::ExhaustedSource)?;
        self.target.send(next)
    }

    fn finish(&mut self) -> Result<Value> {
        self.target.finish()
    }

    fn name(&self) -> &str {
        "pull"
    }
}

impl_into_target!(node: Map, Filter, Get, Limit, Unique, Slice, Pull);
