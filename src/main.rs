//! Boutique Commerce - order lifecycle service

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use boutique_commerce::config::{AppConfig, StoreConfig};
use boutique_commerce::routes;
use boutique_commerce::services::mail::{LogMailer, MailTransport, SmtpMailer};
use boutique_commerce::services::sms::{SmsTransport, TwilioSms};
use boutique_commerce::services::{EventPublisher, InvoiceRenderer};
use boutique_commerce::state::{AppState, Transports};
use boutique_commerce::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let store: Arc<dyn Store> = match &config.store {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::Postgres { database_url, max_connections } => Arc::new(PgStore::connect(database_url, *max_connections).await?),
    };

    let mail: Arc<dyn MailTransport> = match &config.mail.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP not configured, emails are only logged");
            Arc::new(LogMailer)
        }
    };

    let client = reqwest::Client::builder().timeout(config.invoice.timeout).build()?;
    let sms = config.sms.clone().map(|sms| Arc::new(TwilioSms::new(client.clone(), sms)) as Arc<dyn SmsTransport>);
    if sms.is_none() {
        tracing::warn!("SMS not configured, verification codes cannot be delivered");
    }

    let transports = Transports {
        mail,
        sms,
        invoices: InvoiceRenderer::from_config(&config.invoice, client, &config.shop_name, &config.currency),
        events: EventPublisher::connect(config.nats_url.as_deref()).await,
    };
    let app = routes::router(AppState::new(&config, store, transports));

    let addr = config.socket_addr();
    tracing::info!("🚀 {} listening on {}", config.shop_name, addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
