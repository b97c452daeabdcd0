//! Word frequency counter pipeline
//!
//! Reads lines from stdin, splits into words, counts frequencies, and prints top-N words.
//!
//! Usage: cargo run --example word_count --release
//!        (Then type lines of text and press Ctrl-D to finish)

use push_pipeline::{drive, factory, Count, Filter, Map, SwitchByKey, Unique, Value};
use std::io::{self, BufRead};
use tracing_subscriber::EnvFilter;

/// Lowercase a word and strip everything but letters and digits
fn clean(word: Value) -> push_pipeline::Result<Value> {
    let text = word.as_str().unwrap_or_default();
    Ok(Value::from(
        text.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect::<String>(),
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Word Frequency Counter Pipeline");
    println!("================================");
    println!("Enter lines of text (Ctrl-D to finish):");
    println!();

    let stdin = io::stdin();
    let mut lines = Vec::new();
    for line in stdin.lock().lines() {
        lines.push(line?);
    }
    let words = lines
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(Value::from);

    let out = drive(
        words,
        Map::new(
            clean,
            Filter::new(
                |w| Ok(w.as_str().is_some_and(|s| s.chars().count() > 2)),
                (
                    SwitchByKey::new(|w| Ok(w.clone())).with_factory(factory(Count::new)),
                    Count::new(),
                    Unique::new(Count::new()),
                ),
            ),
        ),
    )?;

    let parts = out.as_tuple().unwrap_or_default();
    let [by_word, total, distinct] = parts else {
        return Err("unexpected pipeline output".into());
    };

    let mut counts: Vec<(Value, i64)> = by_word
        .as_map()
        .map(|m| m.entries())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(word, count)| count.as_i64().ok().map(|c| (word, c)))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    println!("\n=== Top 10 Words ({total} words, {distinct} distinct) ===");
    for (i, (word, count)) in counts.iter().take(10).enumerate() {
        println!("{:2}. {} ({})", i + 1, word, count);
    }

    println!("\n\nProcessing complete!");

    Ok(())
}
