//! Messaging service executable
//!
//! Wires the connection manager, dispatcher and booking orchestrator and
//! serves them over the HTTP gateway.

use anyhow::Context;
use clap::{Arg, Command};
use messenger_core::{
    paths, BookingOrchestrator, ConnectionManager, EventLog, FileCredentialStore, JsonRecordStore,
    LoopbackTransport, MessageDispatcher, MessageTemplates, MessengerConfig, SystemClock, Transport,
    UnlinkedTransport,
};
use messenger_server::gateway::{self, GatewayState};
use messenger_types::ConnectedIdentity;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let matches = Command::new("messenger-server")
        .version("1.0.0")
        .about("Appointment messaging service")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path (defaults apply when missing)")
                .default_value("/app/config/messenger.json")
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory for credentials, records and logs")
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Gateway port, overrides the configuration")
        )
        .arg(
            Arg::new("loopback")
                .long("loopback")
                .help("Development mode: record messages in memory instead of delivering them")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("connect-on-start")
                .long("connect-on-start")
                .help("Open the messaging session right after startup")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    // Load configuration
    let config_path = matches.get_one::<String>("config").map(String::as_str).unwrap_or_default();
    let mut config = if Path::new(config_path).exists() {
        let config = MessengerConfig::from_file(config_path)?;
        log::info!("Loaded configuration from {}", config_path);
        config
    } else {
        log::warn!("Config file {} not found, using defaults", config_path);
        MessengerConfig::default()
    };

    if let Some(port) = matches.get_one::<String>("port") {
        config.gateway.port = port.parse().with_context(|| format!("Invalid port number: {}", port))?;
    }

    // Initialize data directory; the flag wins over the configuration
    let data_dir = matches
        .get_one::<String>("data-dir")
        .cloned()
        .or_else(|| config.storage.data_dir.clone());
    if let Some(data_dir) = data_dir {
        if let Err(e) = paths::init_data_root(data_dir) {
            log::warn!("Data root initialization warning: {}", e);
        }
    }
    log::info!("Using data directory: {}", paths::data_root().display());

    for dir in paths::all_service_directories() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let events = Arc::new(EventLog::open(paths::event_log_path(), config.storage.event_log_capacity)?);
    let templates = MessageTemplates::load_or_init(paths::templates_path())?;
    let credentials = Arc::new(FileCredentialStore::new(paths::auth_dir())?);

    let transport: Arc<dyn Transport> = if matches.get_flag("loopback") {
        log::warn!("Loopback transport enabled: messages are recorded in memory, not delivered");
        Arc::new(LoopbackTransport::auto_open(ConnectedIdentity {
            id: format!("{}{}", config.business.operator_address, config.transport.address_suffix),
            name: Some(config.business.name.clone()),
        }))
    } else {
        log::warn!("No messaging platform transport available, connect requests will fail");
        Arc::new(UnlinkedTransport)
    };

    let connection = ConnectionManager::new(transport, credentials, events.clone(), &config.transport);
    let dispatcher = Arc::new(MessageDispatcher::new(connection.clone(), &config.transport));
    let orchestrator = Arc::new(BookingOrchestrator::new(
        dispatcher.clone(),
        Arc::new(JsonRecordStore::new(paths::database_dir())),
        Arc::new(SystemClock),
        templates,
        events.clone(),
        &config,
    ));

    log::info!("Initialized connection manager, dispatcher and orchestrator");

    if matches.get_flag("connect-on-start") {
        let outcome = connection.connect().await;
        log::info!("Startup connect: {}", outcome.message);
    }

    let state = Arc::new(GatewayState {
        connection,
        dispatcher,
        orchestrator,
        events,
    });

    gateway::start_gateway(state, &config.gateway.host, config.gateway.port).await?;

    Ok(())
}
