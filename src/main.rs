use dotenvy::dotenv;
use otlozhka_bot::config::Settings;
use otlozhka_bot::fetcher::PagedFetcher;
use otlozhka_bot::router::{CommandRouter, MessageHandler};
use otlozhka_bot::storage::PostStorage;
use otlozhka_bot::vk::{manager_set, LongPollListener, VkApi, VkClient};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting access tokens from log output.
struct RedactionPatterns {
    query_token: Regex,
    bare_token: Regex,
}

impl RedactionPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            query_token: Regex::new(r"access_token=[^&\s'\x22]+")?,
            bare_token: Regex::new(r"vk1\.a\.[A-Za-z0-9_-]{20,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self
            .query_token
            .replace_all(input, "access_token=[MASKED]");
        self.bare_token.replace_all(&output, "[VK_TOKEN]").to_string()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length to satisfy the contract even when the
        // redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile redaction patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting otlozhka-bot...");

    let settings = init_settings();
    let tz = settings.tz()?;
    let command_patterns = settings.patterns()?;

    let community: Arc<dyn VkApi> = Arc::new(VkClient::new(settings.community_token.clone()));
    let user: Arc<dyn VkApi> = Arc::new(VkClient::new(settings.user_token.clone()));

    // Group identity and manager roster are resolved once at startup;
    // failures here are unrecoverable.
    let group = community.group_info().await.map_err(|e| {
        error!("Failed to resolve community info: {e}");
        e
    })?;
    info!(group_id = group.id, domain = %group.screen_name, "community resolved");

    let managers = manager_set(&user.group_managers(&group.screen_name).await.map_err(|e| {
        error!("Failed to fetch community managers: {e}");
        e
    })?);
    info!(count = managers.len(), "manager set loaded");

    let fetcher = PagedFetcher::new(user, group.screen_name.clone());
    let storage = Arc::new(PostStorage::new(fetcher, settings.storage_keep_alive));

    let handler = Arc::new(MessageHandler::new(
        community,
        storage,
        CommandRouter::new(command_patterns),
        managers,
        settings.clone(),
        tz,
    ));

    let cancel = CancellationToken::new();
    spawn_shutdown_watcher(cancel.clone());

    let listener = LongPollListener::new(
        VkClient::new(settings.community_token.clone()),
        group.id,
        cancel,
    );

    info!("Bot is running...");
    listener
        .run(|message| {
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler.handle(message).await;
            });
        })
        .await?;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    let settings = match Settings::new() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = settings.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }
    info!("Configuration loaded successfully.");
    Arc::new(settings)
}

fn spawn_shutdown_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            cancel.cancel();
        }
    });
}
