//! Number processing pipeline demonstrating filtering and transformations
//!
//! Pipeline:
//! 1. Source: numbers 1-100
//! 2. Filter: keep only even numbers
//! 3. Transform: multiply by 10
//! 4. Aggregate: running sum, count, average and standard deviation
//!
//! Usage: cargo run --example filter_pipeline --release

use push_pipeline::{
    Average, Count, Filter, Map, Pipeline, Stats, StatsSummary, Sum, Value,
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Number Processing Pipeline");
    println!("==========================");
    println!("Generating numbers 1-100, filtering evens, multiplying by 10, and summing");
    println!();

    let start = Instant::now();

    let pipeline = Pipeline::new(Filter::new(
        |x| Ok(x.as_i64()? % 2 == 0),
        Map::new(
            |x| Ok(Value::from(x.as_i64()? * 10)),
            (Sum::new(), Count::new(), Average::new(), Stats::new()),
        ),
    ))
    .with_name("filter_pipeline");
    let metrics = pipeline.metrics().clone();

    let mut last = pipeline.output();
    for step in pipeline.diverge(1..=100) {
        let (item, out) = step?;
        let item = item.as_i64()?;
        if item % 10 == 0 {
            let parts = out.as_tuple().unwrap_or_default();
            println!("Running sum after {item}: {}", parts.first().unwrap_or(&Value::Null));
        }
        last = out;
    }

    let parts = last.as_tuple().unwrap_or_default();
    println!("\n=== Final Results ===");
    if let [sum, count, average, stats] = parts {
        println!("Total numbers kept: {count}");
        println!("Sum of all numbers: {sum}");
        println!("Average: {average}");
        if let Some(StatsSummary {
            std_dev: Some(std_dev),
            ..
        }) = StatsSummary::from_value(stats)
        {
            println!("Standard deviation: {std_dev:.2}");
        }
    }

    println!("\n{}", metrics.snapshot().format());
    println!("Pipeline execution time: {:.3}s", start.elapsed().as_secs_f64());

    Ok(())
}
