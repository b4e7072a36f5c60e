use clap::{Parser, Subcommand};
use lob_engine::orderbook::Orderbook;
use lob_engine::orders::{Order, OrderType, Side};
use lob_engine::simulate::{self, SimConfig};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "lob-engine")]
#[command(version = "0.1", about = "A demo driver for the limit order book engine")]
struct Cli {
    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a seeded random-flow simulation and print a JSON report
    Simulate {
        /// Number of orders to submit
        #[arg(long, default_value_t = 10_000)]
        orders: u64,

        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Also print the final aggregated depth
        #[arg(long)]
        depth: bool,
    },
    /// Replay a small scripted crossing session and print the trades
    Scenario,
}

fn run_scenario(book: &Orderbook) -> anyhow::Result<()> {
    // Seed the book with resting bids @48 and asks @52
    for (id, side, price) in [(1, Side::Buy, 48), (2, Side::Sell, 52)] {
        book.add_order(Order::new(OrderType::GoodTillCancel, id, side, price, 10));
        tracing::info!(id, ?side, price, "seeded resting order");
    }
    println!("{}", serde_json::to_string_pretty(&book.depth())?);

    // A crossing buy lifts the ask
    let trades = book.add_order(Order::new(OrderType::GoodTillCancel, 3, Side::Buy, 52, 6));
    println!("{}", serde_json::to_string_pretty(&trades)?);

    // A market sell hits what is left of the bid side
    let trades = book.add_order(Order::market(4, Side::Sell, 5));
    println!("{}", serde_json::to_string_pretty(&trades)?);

    println!("{}", serde_json::to_string_pretty(&book.depth())?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Simulate {
            orders,
            seed,
            depth,
        } => {
            let book = Orderbook::new();
            let cfg = SimConfig {
                orders,
                seed,
                ..SimConfig::default()
            };
            let report = simulate::run(&book, &cfg);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if depth {
                println!("{}", serde_json::to_string_pretty(&book.depth())?);
            }
        }
        Commands::Scenario => {
            let book = Orderbook::new();
            run_scenario(&book)?;
        }
    };
    Ok(())
}
