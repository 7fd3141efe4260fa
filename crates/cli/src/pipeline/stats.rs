//! Relay run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use ingestion::ConsumerStats;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// `redis` or `mock`
    pub mode: &'static str,

    /// Total duration of the run
    pub duration: Duration,

    /// Number of registered routes
    pub routes: usize,

    /// Delivery counters
    pub consumer: ConsumerStats,

    /// Dispatch counters
    pub dispatch: MetricsSnapshot,

    /// Commands captured by the mock store (mock mode only)
    pub mock_commands: Option<usize>,
}

impl PipelineStats {
    /// Messages per second
    pub fn rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.consumer.received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Discarded messages as a percentage of received ones
    pub fn discard_rate(&self) -> f64 {
        if self.consumer.received > 0 {
            (self.dispatch.discarded() as f64 / self.consumer.received as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Relay Statistics                          ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Mode: {}", self.mode);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Routes: {}", self.routes);
        println!("   └─ Rate: {:.2} msg/s", self.rate());

        let c = &self.consumer;
        println!("\n📥 Deliveries");
        println!("   ├─ Received: {}", c.received);
        println!("   ├─ Acked: {}", c.acked);
        println!("   ├─ Requeued: {}", c.requeued);
        println!("   ├─ Exhausted: {}", c.exhausted);
        println!("   └─ Handler latency (ms): {}", c.latency_ms);

        let d = &self.dispatch;
        println!("\n📤 Dispatch");
        println!("   ├─ Dispatched: {}", d.dispatched);
        println!(
            "   ├─ Discarded: {} ({:.2}%) [rate limited {}, malformed {}]",
            d.discarded(),
            self.discard_rate(),
            d.rate_limited,
            d.malformed
        );
        println!("   ├─ Handler errors: {}", d.handler_errors);
        println!("   ├─ Flushes: {} ({} failed)", d.flushes, d.flush_errors);
        println!("   └─ Commands flushed: {}", d.commands_flushed);

        if let Some(n) = self.mock_commands {
            println!("\n🧪 Mock store captured {} commands", n);
        }

        println!();
    }
}
