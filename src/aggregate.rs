//! Terminal running reducers.
//!
//! Sinks consume every item they are given, never signal `Done`, and keep
//! constant state regardless of stream length.

use crate::error::{PipelineError, Result};
use crate::node::{impl_into_target, Flow, MapFn, Node};
use crate::value::Value;

/// Number of items seen
#[derive(Debug, Default)]
pub struct Count {
    n: i64,
}

impl Count {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for Count {
    fn output(&self) -> Value {
        Value::Int(self.n)
    }

    fn accept(&mut self, _item: Value) -> Result<Flow> {
        self.n += 1;
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "count"
    }
}

/// Running floating-point sum
#[derive(Debug, Default)]
pub struct Sum {
    total: f64,
}

impl Sum {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for Sum {
    fn output(&self) -> Value {
        Value::Float(self.total)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        self.total += item.as_f64()?;
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "sum"
    }
}

/// Running maximum; [`Value::Sentinel`] until the first item
#[derive(Debug)]
pub struct Max {
    best: Value,
}

impl Max {
    pub fn new() -> Self {
        Self {
            best: Value::Sentinel,
        }
    }
}

impl Default for Max {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Max {
    fn output(&self) -> Value {
        self.best.clone()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if matches!(self.best, Value::Sentinel) || item > self.best {
            self.best = item;
        }
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "max"
    }
}

/// Running minimum; [`Value::Sentinel`] until the first item
#[derive(Debug)]
pub struct Min {
    best: Value,
}

impl Min {
    pub fn new() -> Self {
        Self {
            best: Value::Sentinel,
        }
    }
}

impl Default for Min {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Min {
    fn output(&self) -> Value {
        self.best.clone()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if matches!(self.best, Value::Sentinel) || item < self.best {
            self.best = item;
        }
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "min"
    }
}

/// Running mean, updated incrementally as `mean += (x - mean) / i`
#[derive(Debug, Default)]
pub struct Average {
    mean: f64,
    n: u64,
}

impl Average {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for Average {
    fn output(&self) -> Value {
        Value::Float(self.mean)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let x = item.as_f64()?;
        self.n += 1;
        self.mean += (x - self.mean) / self.n as f64;
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "average"
    }
}

/// Decoded output of [`Stats`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    /// `None` before the first item
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` for fewer than two items
    pub std_dev: Option<f64>,
}

impl StatsSummary {
    /// Decode a `(count, mean, std_dev)` tuple produced by [`Stats`]
    pub fn from_value(value: &Value) -> Option<Self> {
        let [count, mean, std_dev] = value.as_tuple()? else {
            return None;
        };
        Some(Self {
            count: u64::try_from(count.as_i64().ok()?).ok()?,
            mean: mean.as_f64().ok(),
            std_dev: std_dev.as_f64().ok(),
        })
    }

    pub fn to_value(&self) -> Value {
        Value::Tuple(vec![
            Value::Int(self.count as i64),
            self.mean.into(),
            self.std_dev.into(),
        ])
    }
}

/// One-pass running count, mean and sample standard deviation (Welford)
///
/// Output is the tuple `(count, mean, std_dev)`; see [`StatsSummary`].
#[derive(Debug, Default)]
pub struct Stats {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            count: self.n,
            mean: (self.n > 0).then_some(self.mean),
            std_dev: (self.n > 1).then(|| (self.m2 / (self.n - 1) as f64).sqrt()),
        }
    }
}

impl Node for Stats {
    fn output(&self) -> Value {
        self.summary().to_value()
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        let x = item.as_f64()?;
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "stats"
    }
}

/// The first item, frozen; `Null` before any input
#[derive(Debug, Default)]
pub struct First {
    value: Option<Value>,
}

impl First {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for First {
    fn output(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        self.value.get_or_insert(item);
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "first"
    }
}

/// The most recent item; `Null` before any input
#[derive(Debug, Default)]
pub struct Last {
    value: Option<Value>,
}

impl Last {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for Last {
    fn output(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        self.value = Some(item);
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "last"
    }
}

/// The transformed `n`-th item (0-based), frozen once it arrives
pub struct Select {
    index: u64,
    seen: u64,
    transform: MapFn,
    value: Option<Value>,
}

impl Select {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            seen: 0,
            transform: Box::new(Ok::<Value, PipelineError>),
            value: None,
        }
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: FnMut(Value) -> Result<Value> + Send + 'static,
    {
        self.transform = Box::new(transform);
        self
    }
}

impl Node for Select {
    fn output(&self) -> Value {
        self.value.clone().unwrap_or(Value::Null)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        if self.value.is_none() {
            if self.seen == self.index {
                self.value = Some((self.transform)(item)?);
            }
            self.seen += 1;
        }
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "select"
    }
}

/// Whether every item is truthy; true for an empty stream
#[derive(Debug)]
pub struct All {
    acc: bool,
}

impl All {
    pub fn new() -> Self {
        Self { acc: true }
    }
}

impl Default for All {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for All {
    fn output(&self) -> Value {
        Value::Bool(self.acc)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        self.acc = self.acc && item.is_truthy();
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "all"
    }
}

/// Whether any item is truthy; false for an empty stream
#[derive(Debug, Default)]
pub struct Any {
    acc: bool,
}

impl Any {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for Any {
    fn output(&self) -> Value {
        Value::Bool(self.acc)
    }

    fn accept(&mut self, item: Value) -> Result<Flow> {
        self.acc = self.acc || item.is_truthy();
        Ok(Flow::Continue(self.output()))
    }

    fn name(&self) -> &str {
        "any"
    }
}

impl_into_target!(sink: Count, Sum, Max, Min, Average, Stats, First, Last, Select, All, Any);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::{diverge, drive};

    fn assert_close(actual: f64, expected: f64) {
        let scale = expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() / scale < 1e-9,
            "{actual} != {expected}"
        );
    }

    #[test]
    fn test_count() {
        assert_eq!(drive(0..0, Count::new()).unwrap(), Value::from(0));
        assert_eq!(drive("hello".chars(), Count::new()).unwrap(), Value::from(5));
    }

    #[test]
    fn test_sum() {
        assert_eq!(drive(0..0, Sum::new()).unwrap(), Value::from(0.0));
        assert_eq!(drive(1..=4, Sum::new()).unwrap(), Value::from(10.0));
        let err = drive(vec![Value::from(1), Value::from("x")], Sum::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_max_sentinel_and_first_item() {
        assert_eq!(drive(0..0, Max::new()).unwrap(), Value::Sentinel);
        assert_eq!(drive([5], Max::new()).unwrap(), Value::from(5));
        assert_eq!(drive([-5], Max::new()).unwrap(), Value::from(-5));
        assert_eq!(drive([3, 9, 2, 9, 1], Max::new()).unwrap(), Value::from(9));
    }

    #[test]
    fn test_max_any_value_type() {
        assert_eq!(drive(["pear", "apple", "zoo"], Max::new()).unwrap(), Value::from("zoo"));
        assert_eq!(drive([Value::Null], Max::new()).unwrap(), Value::Null);
    }

    #[test]
    fn test_min() {
        assert_eq!(drive(0..0, Min::new()).unwrap(), Value::Sentinel);
        assert_eq!(drive([4, -2, 7], Min::new()).unwrap(), Value::from(-2));
        assert_eq!(drive([i64::MAX], Min::new()).unwrap(), Value::from(i64::MAX));
    }

    #[test]
    fn test_average() {
        assert_eq!(drive(0..0, Average::new()).unwrap(), Value::from(0.0));
        assert_eq!(drive(1..=4, Average::new()).unwrap(), Value::from(2.5));
    }

    #[test]
    fn test_average_running_outputs() {
        let means: Vec<Value> = diverge([2, 4, 9], Average::new())
            .map(|step| step.unwrap().1)
            .collect();
        assert_eq!(means, vec![Value::from(2.0), Value::from(3.0), Value::from(5.0)]);
    }

    #[test]
    fn test_stats_matches_closed_form() {
        let data: Vec<f64> = (0..10_000)
            .map(|i| 1.0e6 + (i as f64) * 0.37 + ((i * 7919) % 101) as f64)
            .collect();
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

        let out = drive(data.clone(), Stats::new()).unwrap();
        let summary = StatsSummary::from_value(&out).unwrap();

        assert_eq!(summary.count, 10_000);
        assert_close(summary.mean.unwrap(), mean);
        assert_close(summary.std_dev.unwrap(), variance.sqrt());
    }

    #[test]
    fn test_stats_small_inputs() {
        let empty = StatsSummary::from_value(&drive(0..0, Stats::new()).unwrap()).unwrap();
        assert_eq!(
            empty,
            StatsSummary {
                count: 0,
                mean: None,
                std_dev: None
            }
        );

        let single = StatsSummary::from_value(&drive([4.0], Stats::new()).unwrap()).unwrap();
        assert_eq!(single.mean, Some(4.0));
        assert_eq!(single.std_dev, None);

        let pair = StatsSummary::from_value(&drive([1.0, 3.0], Stats::new()).unwrap()).unwrap();
        assert_close(pair.std_dev.unwrap(), 2.0f64.sqrt());
    }

    #[test]
    fn test_first_and_last() {
        assert_eq!(drive(0..0, First::new()).unwrap(), Value::Null);
        assert_eq!(drive(0..0, Last::new()).unwrap(), Value::Null);
        assert_eq!(drive("hello".chars(), First::new()).unwrap(), Value::from("h"));
        assert_eq!(drive("hello".chars(), Last::new()).unwrap(), Value::from("o"));
    }

    #[test]
    fn test_select() {
        assert_eq!(drive(0..3, Select::new(3)).unwrap(), Value::Null);
        assert_eq!(drive(10..20, Select::new(3)).unwrap(), Value::from(13));

        let squared = Select::new(1).with_transform(|x| Ok(Value::from(x.as_i64()?.pow(2))));
        assert_eq!(drive(5..9, squared).unwrap(), Value::from(36));
    }

    #[test]
    fn test_select_frozen_after_selection() {
        let outputs: Vec<Value> = diverge(0..4, Select::new(1))
            .map(|step| step.unwrap().1)
            .collect();
        assert_eq!(
            outputs,
            vec![Value::Null, Value::from(1), Value::from(1), Value::from(1)]
        );
    }

    #[test]
    fn test_all_and_any() {
        assert_eq!(drive(0..0, All::new()).unwrap(), Value::from(true));
        assert_eq!(drive(0..0, Any::new()).unwrap(), Value::from(false));
        assert_eq!(drive([1, 2, 0, 3], All::new()).unwrap(), Value::from(false));
        assert_eq!(drive([0, 0, 3], Any::new()).unwrap(), Value::from(true));

        // Sinks consume everything even once the answer is settled
        let mut source = 0..5;
        drive(source.by_ref(), All::new()).unwrap();
        assert_eq!(source.next(), None);
    }
}
