//! # Garnet Cart
//!
//! A standalone CLI that walks through optimistic cart reconciliation with
//! the Garnet SDK against an in-memory backend.
//!
//! ## View model
//!
//! ```text
//! view = merge(latest confirmed snapshot, pending mutations in submission order)
//! badge = Σ quantity over visible lines
//! ```
//!
//! Lines marked `~` carry quantities the backend has not confirmed yet.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::*;
use osr_sdk::{
    Aggregate, Cart, CartConfigBuilder, Client, ClientConfigBuilder, LineItem, MemoryTransport,
    MemoryTransportConfig, MergedView, Money, MutationIntent, ProductVariant, ProductVariants,
    RejectReason, SelectedOption, ServerSnapshot, Transition, ViewChange,
};
use tracing_subscriber::EnvFilter;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "garnet-cart")]
#[command(about = "Optimistic cart reconciliation walkthrough (Garnet SDK)")]
#[command(version)]
struct Cli {
    /// Print the final merged view as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v for SDK transitions, -vv for everything)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: optimistic adds, confirmation, badge and subtotal
    Demo,
    /// Conflict scenario: server rejections roll back only the rejected mutation
    Conflict,
    /// Out-of-order replies: jittery backend, stale snapshots discarded
    Reorder,
    /// Slow backend: mutations time out and roll back
    Timeout,
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn describe(change: &ViewChange) -> String {
    match &change.transition {
        Transition::Optimistic { mutation_id } => {
            format!("{} {}", "optimistic".bright_yellow(), short(&mutation_id.to_string()))
        }
        Transition::Confirmed {
            mutation_id,
            server_version,
        } => format!(
            "{} {} at v{}",
            "confirmed".bright_green(),
            short(&mutation_id.to_string()),
            server_version
        ),
        Transition::Rejected {
            mutation_id,
            reason,
        } => format!(
            "{} {} ({})",
            "rejected".bright_red(),
            short(&mutation_id.to_string()),
            reason
        ),
        Transition::SnapshotObserved { server_version } => {
            format!("{} v{}", "snapshot".bright_cyan(), server_version)
        }
    }
}

fn short(id: &str) -> &str {
    &id[id.len().saturating_sub(6)..]
}

/// Print every transition as it happens.
fn trace_transitions(cart: &Cart<MemoryTransport>) {
    cart.subscribe(|change| {
        println!(
            "    {} {:<40} badge={}",
            "↳".dimmed(),
            describe(change),
            change.view.total_quantity()
        );
    });
}

fn show_view(view: &MergedView) {
    let border = "─".repeat(44);
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^42} │",
        format!("Cart {} @ v{}", view.aggregate_id(), view.server_version())
            .bright_yellow()
            .to_string()
    );
    println!("  ├{}┤", border);

    if view.lines().is_empty() {
        println!("  │ {:^42} │", "(empty)".dimmed().to_string());
    } else {
        for line in view.lines() {
            let marker = if line.is_optimistic { "~" } else { " " };
            let cost = line
                .cost()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "pricing…".to_string());
            let text = format!("{}{:<18} x{:>3}  {:>14}", marker, line.id, line.quantity, cost);
            println!("  │ {:<42} │", text);
        }
    }

    println!("  ├{}┤", border);
    let subtotal = view
        .subtotal()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "estimating…".to_string());
    let footer = format!(
        "badge {:>3}  pending {:>2}  {:>16}",
        view.total_quantity(),
        view.pending_count(),
        subtotal
    );
    println!("  │ {:<42} │", footer);
    println!("  └{}┘", border);
}

fn settled_result(view: &MergedView, backend: Option<&ServerSnapshot>) {
    let in_sync = view.is_settled()
        && backend
            .map(|b| {
                b.server_version == view.server_version()
                    && b.aggregate.total_quantity() == view.total_quantity()
            })
            .unwrap_or(true);
    if in_sync {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            "CART SETTLED: view matches the backend".bright_green().bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            "CART DIVERGED: view differs from the backend".bright_red().bold()
        );
    }
}

fn emit_json(view: &MergedView) {
    match serde_json::to_string_pretty(view) {
        Ok(json) => println!("{}", json),
        Err(err) => eprintln!("failed to encode view: {}", err),
    }
}

fn client(config: MemoryTransportConfig, timeout: Option<Duration>) -> Client<MemoryTransport> {
    let transport = Arc::new(MemoryTransport::new(config));
    transport.set_price("tee-m-red", Money::from_minor(2500, "USD"));
    transport.set_price("socks-blue", Money::from_minor(900, "USD"));
    transport.set_price("cap-black", Money::from_minor(1800, "USD"));

    let mut cart = CartConfigBuilder::new().max_line_quantity(20);
    cart = match timeout {
        Some(limit) => cart.mutation_timeout(limit),
        None => cart.no_timeout(),
    };
    Client::new(
        transport,
        ClientConfigBuilder::new().cart_config(cart.build()).build(),
    )
}

// ─── Demo ──────────────────────────────────────────────────────────────────

async fn run_demo() -> Arc<MergedView> {
    header("DEMO: Optimistic Adds and Confirmation");

    let client = client(
        MemoryTransportConfig {
            latency: Duration::from_millis(150),
            ..Default::default()
        },
        None,
    );
    let cart = client.open_cart("cart-demo");
    trace_transitions(&cart);

    section("Phase 1: Shopper adds items; the badge updates immediately");
    let mut tickets = Vec::new();
    for (sku, qty) in [("tee-m-red", 1), ("socks-blue", 3), ("tee-m-red", 1)] {
        step(&format!("add {} x{}", sku, qty));
        match cart.submit(MutationIntent::add(sku, qty)) {
            Ok(ticket) => tickets.push(ticket),
            Err(err) => step(&format!("refused: {}", err)),
        }
    }
    show_view(&cart.current_view());

    section("Phase 2: Backend replies arrive");
    for ticket in tickets {
        let _ = ticket.settled().await;
    }
    show_view(&cart.current_view());

    section("Phase 3: Remove a line entirely");
    if let Ok(ticket) = cart.submit(MutationIntent::remove_line("socks-blue")) {
        step("remove socks-blue");
        let _ = ticket.settled().await;
    }
    show_view(&cart.current_view());

    section("Variant picker: optimistic selection");
    let variants = sample_variants();
    let pending = [SelectedOption::new("Color", "Blue")];
    if let Some(v) = variants.fallback() {
        step(&format!("fallback variant: {}", v.title));
    }
    if let Some(v) = variants.optimistic(Some(&pending)) {
        step(&format!("after choosing Color=Blue: {} ({})", v.title, v.price));
    }

    let view = cart.current_view();
    settled_result(&view, client.transport().snapshot_of(cart.id()).as_ref());
    view
}

fn sample_variants() -> ProductVariants {
    let variant = |id: &str, color: &str, available: bool| ProductVariant {
        id: id.to_string(),
        title: format!("Tee / {}", color),
        available_for_sale: available,
        selected_options: vec![SelectedOption::new("Color", color)],
        price: Money::from_minor(2500, "USD"),
        compare_at_price: None,
    };
    ProductVariants {
        selected_or_first_available: Some(variant("tee-red", "Red", true)),
        listed: vec![variant("tee-red", "Red", true), variant("tee-blue", "Blue", true)],
        adjacent: vec![variant("tee-blue", "Blue", true), variant("tee-green", "Green", false)],
    }
}

// ─── Conflict ──────────────────────────────────────────────────────────────

async fn run_conflict() -> Arc<MergedView> {
    header("CONFLICT: Rejections Roll Back One Mutation");

    let client = client(MemoryTransportConfig::default(), None);
    let seeded = Aggregate::new("cart-conflict", "USD")
        .with_line(LineItem::new("tee-m-red", 2, Money::from_minor(2500, "USD")));
    client.transport().seed(ServerSnapshot::new(seeded, 5));
    client.transport().set_inventory("cap-black", 1);

    let cart = match client.open_and_fetch("cart-conflict").await {
        Ok(cart) => cart,
        Err(err) => {
            eprintln!("cannot open cart: {}", err);
            return Arc::new(MergedView::merge(&ServerSnapshot::initial("cart-conflict", "USD"), &[]));
        }
    };
    trace_transitions(&cart);
    show_view(&cart.current_view());

    section("Phase 1: Two local edits race on the same line (2 → +1 → -1)");
    let a = cart.apply_optimistic(MutationIntent::update("tee-m-red", 1));
    let b = cart.apply_optimistic(MutationIntent::update("tee-m-red", -1));
    show_view(&cart.current_view());

    section("Phase 2: The server refuses the +1");
    if let Ok(a) = &a {
        cart.reject(a.id(), RejectReason::Server("price changed".into()));
    }
    step("only the -1 remains on top of the snapshot");
    show_view(&cart.current_view());
    if let Ok(b) = &b {
        cart.reject(b.id(), RejectReason::Cancelled);
    }

    section("Phase 3: Backend inventory refuses an over-sized add");
    step("add cap-black x2 (1 in stock)");
    if let Ok(ticket) = cart.submit(MutationIntent::add("cap-black", 2)) {
        show_view(&cart.current_view());
        if let Err(err) = ticket.settled().await {
            step(&format!("settled with: {}", err));
        }
    }
    show_view(&cart.current_view());

    section("Phase 4: Local validation refuses before anything is sent");
    if let Err(err) = cart.submit(MutationIntent::remove("unknown-sku", 1)) {
        step(&format!("refused: {}", err));
    }
    if let Err(err) = cart.submit(MutationIntent::add("socks-blue", 50)) {
        step(&format!("refused: {}", err));
    }

    let view = cart.current_view();
    settled_result(&view, client.transport().snapshot_of(cart.id()).as_ref());
    view
}

// ─── Reorder ───────────────────────────────────────────────────────────────

async fn run_reorder() -> Arc<MergedView> {
    header("REORDER: Replies Overtake Each Other");

    let client = client(
        MemoryTransportConfig {
            jitter: Duration::from_millis(80),
            ..Default::default()
        },
        None,
    );
    let cart = client.open_cart("cart-reorder");
    trace_transitions(&cart);

    section("Phase 1: Burst of six adds against a jittery backend");
    let mut tickets = Vec::new();
    for i in 0..6 {
        let sku = if i % 2 == 0 { "tee-m-red" } else { "socks-blue" };
        if let Ok(ticket) = cart.submit(MutationIntent::add(sku, 1)) {
            tickets.push(ticket);
        }
    }
    show_view(&cart.current_view());

    section("Phase 2: Replies land in arbitrary order; older snapshots are ignored");
    for ticket in tickets {
        let _ = ticket.settled().await;
    }
    show_view(&cart.current_view());

    section("Phase 3: A late snapshot from an older version is discarded");
    let current = cart.snapshot();
    let mut older = (*current).clone();
    older.server_version = current.server_version.saturating_sub(2);
    let outcome = cart.observe_snapshot(older);
    step(&format!(
        "offered v{}: {}",
        current.server_version.saturating_sub(2),
        if outcome.is_installed() { "installed" } else { "ignored (stale)" }
    ));

    let view = cart.current_view();
    settled_result(&view, client.transport().snapshot_of(cart.id()).as_ref());
    view
}

// ─── Timeout ───────────────────────────────────────────────────────────────

async fn run_timeout() -> Arc<MergedView> {
    header("TIMEOUT: Slow Backend, Automatic Rollback");

    let client = client(
        MemoryTransportConfig {
            latency: Duration::from_millis(400),
            ..Default::default()
        },
        Some(Duration::from_millis(100)),
    );
    let cart = client.open_cart("cart-timeout");
    trace_transitions(&cart);

    section("Phase 1: Add while the backend is slow");
    if let Ok(ticket) = cart.submit(MutationIntent::add("cap-black", 1)) {
        show_view(&cart.current_view());
        if let Err(err) = ticket.settled().await {
            step(&format!("settled with: {}", err));
        }
    }
    show_view(&cart.current_view());

    section("Phase 2: The backend applied it anyway; refresh picks it up");
    tokio::time::sleep(Duration::from_millis(400)).await;
    match cart.refresh().await {
        Ok(outcome) => step(&format!(
            "refresh: {}",
            if outcome.is_installed() { "installed" } else { "already current" }
        )),
        Err(err) => step(&format!("refresh failed: {}", err)),
    }
    show_view(&cart.current_view());

    let view = cart.current_view();
    settled_result(&view, client.transport().snapshot_of(cart.id()).as_ref());
    view
}

// ─── Entry point ───────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "osr_sdk=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let view = match cli.command {
        Commands::Demo => run_demo().await,
        Commands::Conflict => run_conflict().await,
        Commands::Reorder => run_reorder().await,
        Commands::Timeout => run_timeout().await,
    };

    if cli.json {
        emit_json(&view);
    }
}
