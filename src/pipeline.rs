use crate::error::Result;
use crate::metrics::DriveMetrics;
use crate::node::{resolve, Flow, Node, Target};
use crate::value::Value;
use tracing::{debug, warn};

/// A resolved, primed node tree ready to be fed
///
/// Items can be pushed one at a time with [`push`](Pipeline::push), or a
/// whole source fed with [`run`](Pipeline::run) or
/// [`diverge`](Pipeline::diverge). Once the root asks for no more input,
/// further pushes are refused with [`Flow::Done`] and never reach it.
///
/// Dropping a pipeline that was never finished finishes it, so pending
/// groups still reach their targets when a run is abandoned part way.
pub struct Pipeline {
    name: String,
    root: Box<dyn Node>,
    out: Value,
    done: bool,
    finished: bool,
    metrics: DriveMetrics,
}

impl Pipeline {
    /// Resolve `target` and prime the resulting node
    pub fn new(target: impl Into<Target>) -> Self {
        let root = resolve(target);
        let out = root.output();
        Self {
            name: String::from("pipeline"),
            root,
            out,
            done: false,
            finished: false,
            metrics: DriveMetrics::new(),
        }
    }

    /// Label used in log events
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Record into a shared metrics handle
    pub fn with_metrics(mut self, metrics: DriveMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &DriveMetrics {
        &self.metrics
    }

    /// Last known output snapshot
    pub fn output(&self) -> Value {
        self.out.clone()
    }

    /// Whether the root node wants no more input
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Push one item into the root node
    pub fn push(&mut self, item: impl Into<Value>) -> Result<Flow> {
        if self.done || self.finished {
            return Ok(Flow::Done);
        }
        match self.root.accept(item.into())? {
            Flow::Continue(out) => {
                self.metrics.record_accepted();
                self.out = out;
                Ok(Flow::Continue(self.out.clone()))
            }
            Flow::Done => {
                debug!(pipeline = %self.name, "root node terminated");
                self.metrics.record_termination();
                self.done = true;
                Ok(Flow::Done)
            }
        }
    }

    /// Feed `source` until it is exhausted or the root is done, then finish
    pub fn run<I>(mut self, source: I) -> Result<Value>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut source = source.into_iter();
        while !self.done {
            let Some(item) = source.next() else {
                break;
            };
            self.metrics.record_pulled();
            self.push(item)?;
        }
        self.finish()
    }

    /// Feed `source` lazily, yielding each item with the output it produced
    pub fn diverge<I>(self, source: I) -> Diverge<I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Diverge {
            pipeline: self,
            source: source.into_iter(),
            exhausted: false,
        }
    }

    /// Signal end of stream to the node tree and return the final output
    pub fn finish(mut self) -> Result<Value> {
        self.finish_in_place()
    }

    fn finish_in_place(&mut self) -> Result<Value> {
        if !self.finished {
            self.finished = true;
            self.out = self.root.finish()?;
            self.metrics.record_run();
            debug!(
                pipeline = %self.name,
                pulled = self.metrics.total_pulled(),
                terminated = self.done,
                "pipeline finished"
            );
        }
        Ok(self.out.clone())
    }
}

impl Drop for Pipeline {
    // Abandoned pipelines still flush pending state, e.g. GroupByKey's last group
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.finish_in_place() {
            warn!(pipeline = %self.name, error = %e, "finish failed while dropping pipeline");
        }
    }
}

/// Lazy sequence of `(item, output)` pairs; see [`diverge`]
pub struct Diverge<I> {
    pipeline: Pipeline,
    source: I,
    exhausted: bool,
}

impl<I> Diverge<I> {
    /// The pipeline being fed
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl<I> Iterator for Diverge<I>
where
    I: Iterator,
    I::Item: Into<Value>,
{
    type Item = Result<(Value, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let item = match self.source.next() {
            Some(item) => item.into(),
            None => {
                self.exhausted = true;
                return self.pipeline.finish_in_place().err().map(Err);
            }
        };
        self.pipeline.metrics.record_pulled();
        match self.pipeline.push(item.clone()) {
            Ok(Flow::Continue(out)) => Some(Ok((item, out))),
            Ok(Flow::Done) => {
                self.exhausted = true;
                self.pipeline.finish_in_place().err().map(Err)
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

/// Feed every item of `source` into `target` and return the final output
///
/// The source is consumed lazily and never past the point where the
/// pipeline stops accepting input.
pub fn drive<I>(source: I, target: impl Into<Target>) -> Result<Value>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    Pipeline::new(target).run(source)
}

/// Feed `source` into `target` lazily, yielding `(item, output)` per item
pub fn diverge<I>(source: I, target: impl Into<Target>) -> Diverge<I::IntoIter>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    Pipeline::new(target).diverge(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Count, Sum};
    use crate::error::PipelineError;
    use crate::group::GroupByKey;
    use crate::linear::{Limit, Pull};
    use crate::value::{SharedList, SharedSet};

    #[test]
    fn test_drive_returns_target_list() {
        let list = SharedList::new();
        let out = drive(0..5, list.clone()).unwrap();
        assert!(out.as_list().unwrap().ptr_eq(&list));
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn test_drive_into_set() {
        let set = SharedSet::new();
        drive([3, 1, 3, 2], set.clone()).unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_output_primed_before_input() {
        let pipeline = Pipeline::new((Count::new(), Sum::new()));
        assert_eq!(pipeline.output(), Value::tuple([Value::from(0), Value::from(0.0)]));
    }

    #[test]
    fn test_push_by_hand() {
        let mut pipeline = Pipeline::new(Limit::new(2, Count::new())).with_name("manual");
        assert_eq!(pipeline.name(), "manual");
        assert_eq!(pipeline.push(1).unwrap(), Flow::Continue(Value::from(1)));
        assert_eq!(pipeline.push(2).unwrap(), Flow::Continue(Value::from(2)));
        assert!(pipeline.push(3).unwrap().is_done());
        assert!(pipeline.is_done());
        assert!(pipeline.push(4).unwrap().is_done());
        assert_eq!(pipeline.metrics().total_terminations(), 1);
        assert_eq!(pipeline.finish().unwrap(), Value::from(2));
    }

    #[test]
    fn test_run_records_metrics() {
        let metrics = DriveMetrics::new();
        Pipeline::new(Limit::new(3, Count::new()))
            .with_metrics(metrics.clone())
            .run(0..10)
            .unwrap();
        assert_eq!(metrics.total_pulled(), 4);
        assert_eq!(metrics.total_accepted(), 3);
        assert_eq!(metrics.total_runs(), 1);
    }

    #[test]
    fn test_diverge_pairs() {
        let pairs: Vec<(Value, Value)> = diverge(10..13, Count::new())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            pairs,
            vec![
                (Value::from(10), Value::from(1)),
                (Value::from(11), Value::from(2)),
                (Value::from(12), Value::from(3)),
            ]
        );
    }

    #[test]
    fn test_diverge_is_lazy_on_infinite_source() {
        let firsts: Vec<Value> = diverge(0i64.., Count::new())
            .take(3)
            .map(|step| step.unwrap().0)
            .collect();
        assert_eq!(firsts, vec![Value::from(0), Value::from(1), Value::from(2)]);
    }

    #[test]
    fn test_diverge_stops_at_termination() {
        let steps: Vec<_> = diverge(0i64.., Limit::new(2, Count::new())).collect();
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_dropped_pipeline_flushes_last_group() {
        let groups = SharedList::new();
        let mut pipeline = Pipeline::new(GroupByKey::identity(groups.clone()));
        pipeline.push(1).unwrap();
        pipeline.push(2).unwrap();
        assert_eq!(groups.len(), 1);
        drop(pipeline);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_abandoned_diverge_flushes_last_group() {
        let groups = SharedList::new();
        let metrics = DriveMetrics::new();
        let pipeline = Pipeline::new(GroupByKey::identity(groups.clone()))
            .with_metrics(metrics.clone());
        let steps = pipeline.diverge([1, 1, 2, 2]).take(3).count();
        assert_eq!(steps, 3);
        let sizes: Vec<usize> = groups
            .to_vec()
            .iter()
            .map(|g| g.as_list().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(metrics.total_runs(), 1);
    }

    #[test]
    fn test_finish_runs_once_before_drop() {
        let metrics = DriveMetrics::new();
        let pipeline = Pipeline::new(Count::new()).with_metrics(metrics.clone());
        assert_eq!(pipeline.finish().unwrap(), Value::from(0));
        assert_eq!(metrics.total_runs(), 1);
    }

    #[test]
    fn test_diverge_fuses_after_error() {
        let mut steps = diverge(0..5, Pull::new(vec![1], Count::new()));
        assert!(steps.next().unwrap().is_ok());
        assert!(matches!(steps.next(), Some(Err(PipelineError::ExhaustedSource))));
        assert!(steps.next().is_none());
    }
}
