use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use ussd_vote::application::dispatcher::{PaymentDispatcher, PaymentQueue};
use ussd_vote::application::driver::SessionDriver;
use ussd_vote::application::menu::{MenuConfig, MenuMachine};
use ussd_vote::application::payments::{PaymentClient, PaymentJob};
use ussd_vote::application::reconciler::CallbackReconciler;
use ussd_vote::config::Config;
use ussd_vote::domain::candidate::Candidate;
use ussd_vote::domain::ports::{CandidateDirectoryRef, LedgerStoreRef, SessionStoreRef};
use ussd_vote::domain::ussd::DialRequest;
use ussd_vote::infrastructure::http_gateway::{GatewayCredentials, HttpPaymentGateway};
use ussd_vote::infrastructure::in_memory::{
    InMemoryCandidateDirectory, InMemoryLedgerStore, InMemorySessionStore,
};
#[cfg(feature = "storage-rocksdb")]
use ussd_vote::infrastructure::rocksdb::RocksDBStore;
use ussd_vote::infrastructure::sms::SmsNotifier;
use ussd_vote::interfaces::csv::candidate_reader::CandidateReader;
use ussd_vote::interfaces::http::{AppState, router};

const QUEUE_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the USSD and payment callback endpoints.
    Serve {
        /// Listen port. Overrides PORT.
        #[arg(long)]
        port: Option<u16>,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Candidates CSV file (id,name,code,active) to seed the directory with.
        #[arg(long)]
        candidates: Option<PathBuf>,
    },
    /// Run one dialog offline and print every exchange.
    Simulate {
        /// Candidates CSV file (id,name,code,active).
        #[arg(long)]
        candidates: PathBuf,

        #[arg(long, default_value = "SIM-0001")]
        session: String,

        #[arg(long, default_value = "233240000000")]
        msisdn: String,

        #[arg(long, default_value = "MTN")]
        network: String,

        /// Ask for the MoMo PIN before dispatching a vote payment.
        #[arg(long)]
        legacy_pin: bool,

        /// Path to persistent database (optional). If provided, uses RocksDB.
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Menu inputs, sent in order after the session is opened.
        inputs: Vec<String>,
    },
}

struct Stores {
    sessions: SessionStoreRef,
    ledger: LedgerStoreRef,
    candidates: CandidateDirectoryRef,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve {
            port,
            db_path,
            candidates,
        } => serve(port, db_path, candidates).await,
        Command::Simulate {
            candidates,
            session,
            msisdn,
            network,
            legacy_pin,
            db_path,
            inputs,
        } => {
            let stores = open_stores(db_path, Some(candidates))?;
            let menu = MenuConfig {
                legacy_pin_capture: legacy_pin,
                ..MenuConfig::default()
            };
            simulate(stores, menu, session, msisdn, network, inputs).await
        }
    }
}

async fn serve(
    port: Option<u16>,
    db_path: Option<PathBuf>,
    candidates: Option<PathBuf>,
) -> Result<()> {
    let config = Config::from_env().into_diagnostic()?;
    let stores = open_stores(db_path, candidates)?;

    let http = reqwest::Client::new();
    let gateway = HttpPaymentGateway::new(
        http.clone(),
        config.payment_url.clone(),
        GatewayCredentials {
            api_name: config.payment_api_name.clone(),
            api_key: config.payment_api_key.clone(),
        },
    );
    let notifier = SmsNotifier::new(
        http,
        config.sms_url.clone(),
        config.sms_api_key.clone(),
        config.sms_sender_id.clone(),
    );

    let client = PaymentClient::new(Box::new(gateway), stores.ledger.clone(), config.payments());
    let dispatcher =
        PaymentDispatcher::spawn(Arc::new(client), config.dispatch_delay, QUEUE_CAPACITY);

    let driver = SessionDriver::new(
        stores.sessions,
        stores.ledger.clone(),
        MenuMachine::new(config.menu(), stores.candidates),
        dispatcher.queue(),
    );
    let reconciler =
        CallbackReconciler::new(stores.ledger, Box::new(notifier), config.reconciler());

    let app = router(AppState {
        driver: Arc::new(driver),
        reconciler: Arc::new(reconciler),
    });

    let address = format!("0.0.0.0:{}", port.unwrap_or(config.port));
    let listener = TcpListener::bind(&address).await.into_diagnostic()?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    info!("Draining payment dispatcher...");
    dispatcher.shutdown().await;
    Ok(())
}

async fn simulate(
    stores: Stores,
    menu: MenuConfig,
    session: String,
    msisdn: String,
    network: String,
    inputs: Vec<String>,
) -> Result<()> {
    let (queue, mut jobs) = PaymentQueue::channel(QUEUE_CAPACITY);
    let driver = SessionDriver::new(
        stores.sessions,
        stores.ledger,
        MenuMachine::new(menu, stores.candidates),
        queue,
    );

    let dial = std::iter::once(String::new()).chain(inputs);
    for input in dial {
        let request =
            DialRequest::new(session.clone(), msisdn.clone(), &input).with_network(network.clone());
        let response = driver.handle(request).await;
        println!("> {input}");
        println!("{}", response.msg);
        println!("{}", if response.msg_type { "[continue]" } else { "[end]" });
    }

    while let Ok(job) = jobs.try_recv() {
        match job {
            PaymentJob::Vote {
                vote,
                candidate_name,
                ..
            } => println!(
                "queued payment: {} {} votes for {candidate_name} GHS{} ({})",
                vote.record_ref(),
                vote.number_of_votes,
                vote.amount_paid,
                vote.payment.transaction_status
            ),
            PaymentJob::Donation { amount, .. } => {
                println!("queued payment: donation GHS{amount}")
            }
        }
    }
    Ok(())
}

fn open_stores(db_path: Option<PathBuf>, candidates: Option<PathBuf>) -> Result<Stores> {
    let seed = match candidates {
        Some(path) => read_candidates(path)?,
        None => Vec::new(),
    };

    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        for candidate in &seed {
            store.put_candidate(candidate).into_diagnostic()?;
        }
        return Ok(Stores {
            sessions: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            candidates: Arc::new(store),
        });
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    let directory: InMemoryCandidateDirectory = seed.into_iter().collect();
    Ok(Stores {
        sessions: Arc::new(InMemorySessionStore::new()),
        ledger: Arc::new(InMemoryLedgerStore::new()),
        candidates: Arc::new(directory),
    })
}

fn read_candidates(path: PathBuf) -> Result<Vec<Candidate>> {
    let file = File::open(&path).into_diagnostic()?;
    let mut candidates = Vec::new();
    for result in CandidateReader::new(file).candidates() {
        match result {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!("Error reading candidate: {e}"),
        }
    }
    info!("Loaded {} candidates from {}", candidates.len(), path.display());
    Ok(candidates)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
