//! A push-based stream processing engine.
//!
//! Instead of pulling values out of iterators, a pipeline of small stateful
//! nodes has items pushed into it one at a time. Every node reports a live
//! output snapshot after each item, so a single pass over a source can fill
//! several lists, route items by key, batch them and compute running
//! statistics without materializing intermediate collections.
//!
//! # Features
//!
//! - Declarative targets: lists, sets and tuples of targets resolve into nodes
//! - Linear combinators: `Map`, `Filter`, `Get`, `Limit`, `Unique`, `Slice`, `Pull`
//! - Fan-out: `Split`, `Switch`, `SwitchByKey`, `Unzip`
//! - Grouping: `Group`, `GroupByN`, `GroupByKey`, `Merge`
//! - Running aggregates: `Count`, `Sum`, `Max`, `Min`, `Average`, `Stats`,
//!   `First`, `Last`, `Select`, `All`, `Any`
//! - Bounded consumers stop the source early; the signal never escapes
//!
//! # Example
//!
//! ```
//! use push_pipeline::{drive, Limit, Map, SharedList, Sum, Value};
//!
//! let squares = SharedList::new();
//! let out = drive(
//!     0..10,
//!     (
//!         Limit::new(3, Map::new(|x| Ok(Value::from(x.as_i64()? * x.as_i64()?)), squares.clone())),
//!         Sum::new(),
//!     ),
//! )?;
//!
//! assert_eq!(squares.to_vec(), vec![Value::from(0), Value::from(1), Value::from(4)]);
//! assert_eq!(out.as_tuple().unwrap()[1], Value::from(45.0));
//! # Ok::<(), push_pipeline::PipelineError>(())
//! ```

pub mod aggregate;
pub mod error;
pub mod fanout;
pub mod group;
pub mod linear;
pub mod metrics;
pub mod node;
pub mod pipeline;
pub mod value;

// Re-exports for convenience
pub use aggregate::{
    All, Any, Average, Count, First, Last, Max, Min, Select, Stats, StatsSummary, Sum,
};
pub use error::{ErrorKind, PipelineError, Result};
pub use fanout::{Split, Switch, SwitchByKey, Unzip};
pub use group::{Group, GroupByKey, GroupByN, Merge};
pub use linear::{Filter, Get, Limit, Map, Pull, Slice, Unique};
pub use metrics::{DriveMetrics, MetricsSnapshot};
pub use node::{
    factory, list_factory, resolve, Add, Append, Factory, Flow, KeyFn, MapFn, Node, Predicate,
    SharedNode, Target,
};
pub use pipeline::{diverge, drive, Diverge, Pipeline};
pub use value::{SharedList, SharedMap, SharedSet, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
