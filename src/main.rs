use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use medbook::config::AppConfig;
use medbook::db::{MemoryRecordStore, RecordStore, SqliteRecordStore};
use medbook::handlers;
use medbook::services::ai::groq::GroqProvider;
use medbook::services::ai::ollama::OllamaProvider;
use medbook::services::ai::{LlmFieldExtractor, NaturalLanguageFieldExtractor};
use medbook::services::conversation;
use medbook::services::messaging::{
    DeliveryNotifier, MailRelayClient, NotificationSender, RecordingNotifier, TwilioSmsClient,
};
use medbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let store: Arc<dyn RecordStore> = if config.database_url == "memory" {
        tracing::warn!("using in-memory record store, nothing will be persisted");
        Arc::new(MemoryRecordStore::new())
    } else {
        Arc::new(SqliteRecordStore::open(&config.database_url)?)
    };

    let extractor: Option<Box<dyn NaturalLanguageFieldExtractor>> =
        match config.llm_provider.as_str() {
            "groq" => {
                anyhow::ensure!(
                    !config.groq_api_key.is_empty(),
                    "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
                );
                tracing::info!("using Groq field extraction (model: {})", config.groq_model);
                Some(Box::new(LlmFieldExtractor::new(Box::new(GroqProvider::new(
                    config.groq_api_key.clone(),
                    config.groq_model.clone(),
                )))))
            }
            "ollama" => {
                tracing::info!("using Ollama field extraction (url: {})", config.ollama_url);
                Some(Box::new(LlmFieldExtractor::new(Box::new(OllamaProvider::new(
                    config.ollama_url.clone(),
                    config.ollama_model.clone(),
                )))))
            }
            _ => {
                tracing::info!("field extraction disabled, answers are validated as typed");
                None
            }
        };

    let notifier: Arc<dyn NotificationSender> = if config.mock_notifications {
        tracing::info!("mock notifications enabled, email and SMS are recorded only");
        Arc::new(RecordingNotifier::new())
    } else {
        let sms = TwilioSmsClient::from_parts(
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_phone_number,
        );
        let email = MailRelayClient::from_parts(
            &config.email_api_url,
            &config.email_api_key,
            &config.email_from,
        );
        Arc::new(DeliveryNotifier::new(sms, email))
    };

    let state = Arc::new(AppState::new(config.clone(), store, extractor, notifier));

    if config.seed_schedule {
        let today = conversation::now().date();
        let seeded = state.schedule().seed_if_empty(today, config.seed_days);
        if let Err(e) = seeded {
            tracing::warn!(error = %e, "schedule seeding skipped");
        }
    }

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
