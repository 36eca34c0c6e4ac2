//! Latency percentile report for the submission path.
//!
//! Drives the engine directly on one thread with a pre-generated command
//! stream (no RNG or allocation inside the measured section) and prints an
//! hdrhistogram summary.

use hdrhistogram::Histogram;
use std::time::Instant;

use tickmatch::{Command, Engine, Order, Side};

const SYMBOL: &str = "AAPL";
const ITERATIONS: u64 = 1_000_000;
const BUFFER_SIZE: usize = 10_000;

fn main() {
    println!("Preparing latency benchmark...");

    let mut engine = Engine::new(SYMBOL, 2_000_000);
    engine.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3).unwrap();

    // Pre-generate commands; ids never repeat so duplicate checks stay cold.
    println!("Pre-generating {} command templates...", BUFFER_SIZE);
    let commands: Vec<Command> = (0..BUFFER_SIZE)
        .map(|i| {
            let id = (i + 1) as u64;
            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            // Bids 99.00-99.99, asks 100.01-101.00: no crossing, pure insert.
            let price = match side {
                Side::Buy => 9_900 + (id % 100) as i64,
                Side::Sell => 10_001 + (id % 100) as i64,
            };
            Command::Place(Order::limit(id, SYMBOL, side, price, 10))
        })
        .collect();

    // Train the branch predictor before measuring.
    println!("Warming up ({} ops)...", BUFFER_SIZE);
    for command in &commands {
        std::hint::black_box(engine.process_command(command.clone()));
    }
    engine.clear_book();

    println!("Running {} iterations...", ITERATIONS);
    let mut total = std::time::Duration::ZERO;
    let mut next_id = BUFFER_SIZE as u64;

    for i in 0..ITERATIONS {
        let template = &commands[(i as usize) % BUFFER_SIZE];
        next_id += 1;
        let command = match template {
            Command::Place(order) => {
                let mut order = order.clone();
                order.id = next_id;
                Command::Place(order)
            }
            other => other.clone(),
        };

        let start = Instant::now();
        std::hint::black_box(engine.process_command(command));
        let elapsed = start.elapsed();

        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total += elapsed;

        // Keep the book bounded so inserts dominate the measurement.
        if i % 1_000_000 == 999_999 {
            engine.clear_book();
        }
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total ops:  {}", ITERATIONS);
    println!("Throughput: {:.2} ops/sec", ITERATIONS as f64 / total.as_secs_f64());
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for bucket in histogram.iter_log(1_000, 2.0) {
        let count = bucket.count_since_last_iteration();
        if count > 0 {
            println!(
                "<= {:8} ns: {:10} count",
                bucket.value_iterated_to(),
                count
            );
        }
    }
}
