use async_stream::stream;
use futures::stream::Stream;
use futures::stream::StreamExt;
use osr_sdk::{
    Cart, Client, MemoryTransport, MemoryTransportConfig, MergedView, MutationIntent,
    MutationTicket,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Statistics collected during stress testing
#[derive(Clone, Debug, Default)]
pub struct StressTestStats {
    pub num_carts: usize,
    pub intents_per_cart: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub refused: usize,
    pub total_time: Duration,
    pub avg_settle_time: Duration,
    pub ops_per_second: f64,
}

impl StressTestStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Number of Carts:           {:>30} ║", self.num_carts);
        println!("║  Intents per Cart:          {:>30} ║", self.intents_per_cart);
        println!("║  Confirmed:                 {:>30} ║", self.confirmed);
        println!("║  Rejected by Backend:       {:>30} ║", self.rejected);
        println!("║  Refused by Validation:     {:>30} ║", self.refused);
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Average Settle Time:       {:>28}µs ║", self.avg_settle_time.as_micros());
        println!("║  Intents/Second:            {:>30.0} ║", self.ops_per_second);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Settlement counters shared by every shopper task.
#[derive(Default)]
struct Tally {
    confirmed: usize,
    rejected: usize,
    refused: usize,
    settle_times: Vec<Duration>,
}

/// Generator that yields shopper intents against a small catalog
fn intent_generator(catalog: Vec<String>, num_intents: usize) -> impl Stream<Item = MutationIntent> {
    stream! {
        let mut rng = StdRng::from_entropy();
        for _ in 0..num_intents {
            let target = catalog[rng.gen_range(0..catalog.len())].clone();
            let intent = match rng.gen_range(0..10) {
                0..=5 => MutationIntent::add(target, rng.gen_range(1..=3)),
                6..=7 => MutationIntent::update(target, -1),
                8 => MutationIntent::remove(target, rng.gen_range(1..=2)),
                _ => MutationIntent::remove_line(target),
            };
            yield intent;
        }
    }
}

/// Panics if the cart's view differs from a fresh merge of its state.
fn assert_view_consistent(cart: &Cart<MemoryTransport>) {
    cart.inspect(|r| {
        let expected = MergedView::merge(&r.snapshot(), r.pending());
        assert_eq!(
            *r.current_view(),
            expected,
            "merged view drifted for {}",
            cart.id()
        );
    });
}

/// Wait for a submitted intent and record how it settled
async fn settle(ticket: MutationTicket, started: Instant, tally: Arc<Mutex<Tally>>) {
    let verdict = ticket.settled().await;
    let elapsed = started.elapsed();

    let mut tally = tally.lock().await;
    match verdict {
        Ok(_) => tally.confirmed += 1,
        Err(_) => tally.rejected += 1,
    }
    tally.settle_times.push(elapsed);
}

/// Stress test: many shoppers submitting against a jittery backend
pub async fn stress_test_carts(
    num_carts: usize,
    intents_per_cart: usize,
    jitter: Duration,
) -> StressTestStats {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Cart Stress Test (Async)                            ║");
    println!("║  Carts: {} | Intents/Cart: {} | Jitter: {}ms ║",
             num_carts, intents_per_cart, jitter.as_millis());
    println!("║  Started: {} ║", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("╚════════════════════════════════════════════════════════════╝");

    let start = Instant::now();

    let transport = Arc::new(MemoryTransport::new(MemoryTransportConfig {
        jitter,
        ..Default::default()
    }));
    let catalog: Vec<String> = (0..8).map(|i| format!("sku-{}", i)).collect();
    // Scarce stock so some optimistic adds get rolled back.
    transport.set_inventory(catalog[0].clone(), 4);
    transport.set_inventory(catalog[1].clone(), 2);

    let client = Client::new(transport.clone(), Default::default());
    let tally = Arc::new(Mutex::new(Tally::default()));

    println!("\n[Phase 1/2] Submitting intents...");

    // Phase 1: each shopper drives its own cart
    let mut handles = vec![];
    for idx in 0..num_carts {
        let cart = client.open_cart(format!("cart-{}", idx));
        let catalog = catalog.clone();
        let tally = Arc::clone(&tally);
        let handle = tokio::spawn(async move {
            let mut intents = Box::pin(intent_generator(catalog, intents_per_cart));
            let mut settling = vec![];
            let mut i = 0;

            while let Some(intent) = intents.next().await {
                match cart.submit(intent) {
                    Ok(ticket) => {
                        let started = Instant::now();
                        settling.push(tokio::spawn(settle(ticket, started, Arc::clone(&tally))));
                    }
                    Err(_) => tally.lock().await.refused += 1,
                }
                assert_view_consistent(&cart);

                i += 1;
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }

            futures::future::join_all(settling).await;
            assert_view_consistent(&cart);
        });
        handles.push(handle);
    }

    // Wait for all shoppers to finish
    for handle in handles {
        if let Err(err) = handle.await {
            eprintln!("shopper task failed: {}", err);
        }
    }

    println!("[Phase 1/2] ✓ Completed");
    println!("[Phase 2/2] Checking carts against the backend...");

    // Phase 2: every settled cart must show exactly the backend's state
    for cart_id in client.cart_ids() {
        let Ok(cart) = client.get_cart(&cart_id) else {
            continue;
        };
        let view = cart.current_view();
        assert!(view.is_settled(), "{} still has pending mutations", cart_id);
        if let Some(backend) = transport.snapshot_of(&cart_id) {
            assert_eq!(view.server_version(), backend.server_version);
            assert_eq!(view.total_quantity(), backend.aggregate.total_quantity());
        }
    }

    let total_time = start.elapsed();
    let tally = tally.lock().await;

    // Calculate statistics
    let avg_settle_time = if !tally.settle_times.is_empty() {
        tally.settle_times.iter().sum::<Duration>() / tally.settle_times.len() as u32
    } else {
        Duration::ZERO
    };

    let total_intents = num_carts * intents_per_cart;
    let ops_per_second = total_intents as f64 / total_time.as_secs_f64();

    println!("[Phase 2/2] ✓ Completed");

    StressTestStats {
        num_carts,
        intents_per_cart,
        confirmed: tally.confirmed,
        rejected: tally.rejected,
        refused: tally.refused,
        total_time,
        avg_settle_time,
        ops_per_second,
    }
}

/// Compare throughput as the number of concurrent carts grows
pub async fn stress_test_scaling(max_carts: usize, step_size: usize) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Throughput vs Concurrent Carts     ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current_carts = step_size;
    while current_carts <= max_carts {
        let stats = stress_test_carts(current_carts, 50, Duration::from_millis(2)).await;
        stats.print();
        current_carts += step_size;
    }
}
