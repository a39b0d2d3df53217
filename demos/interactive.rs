//! Interactive demo: the headless output layer
//!
//! Run with: cargo run --example interactive
//!
//! Reads state snapshots from the store and feeds user intents into
//! the core. Signing runs against the in-process wallet simulator;
//! transaction parameters, balances, and submission need a reachable
//! node (set ALGOD_URL).

use std::io::{self, Write};
use std::sync::Arc;

use algoconnect::{
    AlgodClient, AppState, ClientConfig, ConnectionState, Scenario, SignerSession,
    SigningCoordinator, StateStore, SubmissionTracker, WalletError, WalletSimulator,
};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut config = ClientConfig::default();
    if let Ok(url) = std::env::var("ALGOD_URL") {
        config = config.with_algod_url(url);
    }

    let store = StateStore::new();
    let wallet = WalletSimulator::new();
    let session = Arc::new(SignerSession::new(wallet, &config, store.clone()));
    let algod = AlgodClient::new(&config);
    let coordinator = SigningCoordinator::new(session.clone(), algod.clone(), store.clone());
    let tracker = SubmissionTracker::new(algod.clone(), store.clone(), &config);

    println!("\n========================================");
    println!("      algoconnect interactive demo");
    println!("========================================");

    loop {
        println!("\n----------------------------------------");
        println!("Select an option:");
        for (i, scenario) in Scenario::ALL.iter().enumerate() {
            println!("  {}. Sign: {}", i + 1, scenario.name());
        }
        println!("  c. Connect to wallet");
        println!("  k. Kill session");
        println!("  s. Submit last result");
        println!("  b. View balances");
        println!("  v. View state");
        println!("  q. Quit");
        println!("----------------------------------------");

        let choice = prompt("Enter choice: ")?;
        match choice.as_str() {
            "c" | "C" => connect_flow(&session).await,
            "k" | "K" => {
                if let Err(e) = session.kill().await {
                    println!("Kill failed: {}", e);
                } else {
                    println!("Session killed.");
                }
            }
            "s" | "S" => submit_flow(&tracker, &store).await,
            "b" | "B" => balances_flow(&algod, &store).await,
            "v" | "V" => print_state(&store.snapshot()),
            "q" | "Q" => {
                println!("\nGoodbye!");
                break;
            }
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 && n <= Scenario::ALL.len() => {
                    scenario_flow(&coordinator, &store, Scenario::ALL[n - 1]).await?;
                }
                _ => println!("\nInvalid choice. Please try again."),
            },
        }
    }

    Ok(())
}

async fn connect_flow(session: &Arc<SignerSession<WalletSimulator>>) {
    match session.connect().await {
        Ok(accounts) => {
            println!("Connected. Accounts:");
            for account in accounts {
                println!("  {}", account);
            }
        }
        Err(e) => println!("Pairing failed: {}", e),
    }
}

async fn scenario_flow(
    coordinator: &SigningCoordinator<WalletSimulator>,
    store: &StateStore,
    scenario: Scenario,
) -> eyre::Result<()> {
    let mut param: Option<u64> = None;

    loop {
        match coordinator.run_scenario(scenario, param).await {
            Ok(_) => {
                println!("Request approved.");
                print_last_result(&store.snapshot());
                return Ok(());
            }
            Err(WalletError::ParameterRequired { scenario: name }) => {
                let input = prompt(&format!("'{}' needs a number (empty to cancel): ", name))?;
                if input.is_empty() {
                    coordinator.cancel_parameter();
                    println!("Cancelled.");
                    return Ok(());
                }
                match input.parse::<u64>() {
                    Ok(value) => param = Some(value),
                    Err(_) => println!("Not a number."),
                }
            }
            Err(e) => {
                println!("Request rejected: {}", e);
                return Ok(());
            }
        }
    }
}

async fn submit_flow(tracker: &SubmissionTracker<AlgodClient>, store: &StateStore) {
    let Some(result) = store.snapshot().last_result else {
        println!("Nothing to submit - sign something first.");
        return;
    };

    println!("Submitting {} group(s)...", result.len());
    let outcomes = tracker.submit_all(&result).await;
    for (i, outcome) in outcomes.iter().enumerate() {
        println!("  group {}: {:?}", i, outcome);
    }
}

/// Read-endpoint failures degrade to an empty balance display rather
/// than aborting anything.
async fn balances_flow(algod: &AlgodClient, store: &StateStore) {
    let Some(address) = store.snapshot().address else {
        println!("Not connected.");
        return;
    };

    match algod.account_assets(&address.to_string()).await {
        Ok(assets) => {
            for asset in assets {
                println!(
                    "  {:>12}  {}  (id {})",
                    asset.amount,
                    asset.unit_name.unwrap_or_default(),
                    asset.id
                );
            }
        }
        Err(e) => {
            tracing::warn!("balance fetch failed: {}", e);
            println!("Balances unavailable.");
        }
    }
}

fn print_state(state: &AppState) {
    println!("\nConnection: {:?}", state.connection);
    if state.connection == ConnectionState::Connected {
        println!("Address: {}", state.address.map(|a| a.to_string()).unwrap_or_default());
        println!("Accounts: {}", state.accounts.len());
    }
    if let Some(uri) = &state.pairing_uri {
        println!("Pairing URI: {}", uri);
    }
    println!("Pending request: {}", state.pending_request);
    if let Some(scenario) = state.parameter_prompt {
        println!("Awaiting parameter for: {}", scenario.name());
    }
    print_last_result(state);
    if !state.submission_outcomes.is_empty() {
        println!("Submission outcomes:");
        for (i, outcome) in state.submission_outcomes.iter().enumerate() {
            println!("  group {}: {:?}", i, outcome);
        }
    }
}

fn print_last_result(state: &AppState) {
    let Some(result) = &state.last_result else {
        return;
    };
    println!("Last result:");
    for (g, group) in result.iter().enumerate() {
        for (i, slot) in group.iter().enumerate() {
            match slot {
                Some(info) => println!("  [{}][{}] txid {}", g, i, info.tx_id),
                None => println!("  [{}][{}] left unsigned", g, i),
            }
        }
    }
}

fn prompt(text: &str) -> eyre::Result<String> {
    print!("{}", text);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
