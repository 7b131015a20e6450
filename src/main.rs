use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simplepay_gateway::adapters::{
    PostgresAddressRepository, PostgresCustomerRepository, PostgresTransactionRepository,
};
use simplepay_gateway::cli::{Cli, Commands, DbCommands, TxCommands, TxStartArgs};
use simplepay_gateway::config::Config;
use simplepay_gateway::health::{HealthChecker, PostgresChecker};
use simplepay_gateway::simplepay::{GatewaySettings, SimplePayClient};
use simplepay_gateway::{cli, create_app, db, startup, AppState, HttpSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Tx(TxCommands::Start {
            total,
            language,
            currency,
            user_id,
            billing_address_id,
            delivery_address_id,
        }) => {
            let pool = db::create_pool(&config).await?;
            let args = TxStartArgs {
                total,
                language,
                currency,
                user_id,
                billing_address_id,
                delivery_address_id,
            };
            cli::handle_tx_start(&pool, &config, args).await
        }
        Commands::Tx(TxCommands::Show { tx_id }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_tx_show(&pool, tx_id).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let report = startup::validate_environment(&config, &pool).await?;
    if !report.is_valid() {
        report.print();
        anyhow::bail!("startup validation failed");
    }

    let gateway = SimplePayClient::new(GatewaySettings::from_config(&config));
    tracing::info!(
        mode = %gateway.mode(),
        start_url = %gateway.start_url(),
        "SimplePay client initialized"
    );

    let state = AppState {
        transactions: Arc::new(PostgresTransactionRepository::new(pool.clone())),
        addresses: Arc::new(PostgresAddressRepository::new(pool.clone())),
        customers: Arc::new(PostgresCustomerRepository::new(pool.clone())),
        gateway,
        health: Arc::new(
            HealthChecker::new().with_dependency("postgres", PostgresChecker::new(pool)),
        ),
    };

    let app = create_app(state, &HttpSettings::from_config(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
