use std::time::Duration;
use stress_test::{stress_test_carts, stress_test_scaling};
pub mod stress_test;

#[tokio::main]
async fn main() {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            OPTIMISTIC CART STRESS TESTS                    ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    // Test 1: few carts, no reordering
    let stats = stress_test_carts(4, 100, Duration::ZERO).await;
    stats.print();

    // Test 2: few carts, replies overtaking each other
    let stats = stress_test_carts(4, 100, Duration::from_millis(5)).await;
    stats.print();

    // Test 3: many carts with reordering
    let stats = stress_test_carts(32, 200, Duration::from_millis(3)).await;
    stats.print();

    // Test 4: scaling analysis
    stress_test_scaling(20, 5).await;

    println!("\n✓ All stress tests completed successfully!");
}
