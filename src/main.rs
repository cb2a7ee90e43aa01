use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use bikeshare_client::config::ClientConfig;
use bikeshare_client::gateway::memory::{
    InMemoryLedgers, DEFAULT_NUM_OF_BIKES, DEFAULT_USAGE_FEE,
};
use bikeshare_client::gateway::Amount;
use bikeshare_client::orchestrator::{Orchestrator, TokenAccount, WorkflowMode};
use bikeshare_client::session::{MemoryWallet, Session, Wallet};

/// Interactive demo shell for the bikeshare client, backed by the bundled
/// in-memory ledgers.
#[derive(Parser)]
#[command(name = "bikeshare-client", version, about)]
struct Args {
    /// JSON config file with network and contract accounts
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of bikes in the demo fleet
    #[arg(long, default_value_t = DEFAULT_NUM_OF_BIKES)]
    bikes: usize,

    /// Usage fee charged per rental
    #[arg(long, default_value_t = DEFAULT_USAGE_FEE)]
    fee: Amount,

    /// Account to sign in as
    #[arg(long, default_value = "alice.testnet")]
    account: String,

    /// Starting balance minted to the signed-in account
    #[arg(long, default_value_t = 100)]
    balance: Amount,
}

const HELP: &str = "Commands:
  status                  show mode, bikes, and fee
  use <index>             pay the fee and take a bike
  inspect <index>         mark a bike as under inspection
  return <index>          return a bike you use or inspect
  balance [account]       check a balance (default: yours)
  transfer <account> <n>  send tokens peer to peer
  register                storage-register the signed-in account
  unregister              force-unregister and burn the balance
  signin <account>        start a session as <account>
  signout                 end the session
  quit";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match ClientConfig::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: {err}");
                process::exit(2);
            }
        },
        None => ClientConfig::default(),
    };

    let ledgers = InMemoryLedgers::new(config.fleet_contract.clone(), args.bikes, args.fee);
    // seed the reward pool and the demo account
    ledgers.mint(config.fleet_contract.clone(), 1_000);
    ledgers.register_with_balance(args.account.clone(), args.balance);

    let wallet = Arc::new(MemoryWallet::signed_in(args.account.clone()));
    let mut orch = start_client(&ledgers, Arc::clone(&wallet), &config).await;

    println!(
        "bikeshare demo on {} ({} bikes)",
        config.network_id, args.bikes
    );
    render(&orch);
    println!("type `help` for commands");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let outcome = match parts.as_slice() {
            [] => Ok(()),
            ["help"] => {
                println!("{HELP}");
                Ok(())
            }
            ["status"] => {
                render(&orch);
                Ok(())
            }
            ["use", index] => match index.parse() {
                Ok(index) => orch.use_bike(index).await,
                Err(_) => {
                    eprintln!("error: bad index {index}");
                    continue;
                }
            },
            ["inspect", index] => match index.parse() {
                Ok(index) => orch.inspect_bike(index).await,
                Err(_) => {
                    eprintln!("error: bad index {index}");
                    continue;
                }
            },
            ["return", index] => match index.parse() {
                Ok(index) => orch.return_bike(index).await,
                Err(_) => {
                    eprintln!("error: bad index {index}");
                    continue;
                }
            },
            ["balance"] => match orch.session().account_id() {
                Some(account) => orch.check_balance(&account).await.map(print_balance),
                None => {
                    eprintln!("error: not signed in; try `balance <account>`");
                    continue;
                }
            },
            ["balance", account] => orch
                .check_balance(&(*account).to_string())
                .await
                .map(print_balance),
            ["transfer", account, amount] => match amount.parse() {
                Ok(amount) => orch.transfer(&(*account).to_string(), amount).await,
                Err(_) => {
                    eprintln!("error: bad amount {amount}");
                    continue;
                }
            },
            ["register"] => orch.register().await,
            ["unregister"] => orch.unregister().await,
            ["signin", account] => {
                wallet.sign_in((*account).to_string());
                // sessions do not survive sign-in; rebuild the client
                orch = start_client(&ledgers, Arc::clone(&wallet), &config).await;
                render(&orch);
                Ok(())
            }
            ["signout"] => {
                orch.sign_out();
                render(&orch);
                Ok(())
            }
            ["quit"] | ["exit"] => break,
            _ => {
                eprintln!("error: unknown command; type `help`");
                continue;
            }
        };
        if let Err(err) = outcome {
            eprintln!("error: {err}");
        }
    }
}

async fn start_client(
    ledgers: &InMemoryLedgers,
    wallet: Arc<MemoryWallet>,
    config: &ClientConfig,
) -> Orchestrator {
    let session = Session::new(wallet);
    match Orchestrator::start(
        ledgers.fleet_gateway(),
        ledgers.token_gateway(),
        session,
        config,
    )
    .await
    {
        Ok(orch) => orch,
        Err(err) => {
            eprintln!("error: cannot reach the ledgers: {err}");
            process::exit(1);
        }
    }
}

fn print_balance(record: TokenAccount) {
    println!("{}'s balance: {}", record.account_id, record.balance);
}

fn render(orch: &Orchestrator) {
    match orch.mode() {
        WorkflowMode::SignIn => println!("-- signed out; `signin <account>` to begin"),
        WorkflowMode::Registration => {
            println!(
                "-- {} must register with the token ledger first; run `register`",
                orch.session().account_id().unwrap_or_default()
            );
        }
        WorkflowMode::TransactionInFlight { kind, .. } => {
            println!("-- {} transaction in process...", kind.name());
        }
        WorkflowMode::Home => {
            let viewer = orch.session().account_id().unwrap_or_default();
            println!(
                "-- hello {viewer}! fee per rental: {}",
                orch.fee().amount_to_use_bike
            );
            for (index, bike) in orch.snapshot().iter().enumerate() {
                let state = if bike.available {
                    "available".to_string()
                } else if let Some(user) = &bike.user {
                    format!("in use by {user}")
                } else if let Some(inspector) = &bike.inspector {
                    format!("inspected by {inspector}")
                } else {
                    // skew between the three reads; the next refresh settles it
                    "unsettled".to_string()
                };
                let yours = if bike.returnable_by(&viewer) {
                    " (yours)"
                } else {
                    ""
                };
                println!("   bike {index}: {state}{yours}");
            }
        }
    }
}
