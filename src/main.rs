use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use quiz_arena::completion::CompletionConfig;
use quiz_arena::protocol::DEFAULT_PORT;
use quiz_arena::{server, BonusTiming, RoundSettings, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file to load the quiz catalog from
    #[arg(short, long, env = "QUIZ_ARENA_QUIZZES")]
    quizzes: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "QUIZ_ARENA_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "QUIZ_ARENA_HOST")]
    host: String,

    /// Seconds each question stays open
    #[arg(long, default_value_t = 20)]
    question_time: u64,

    /// How the time bonus for correct answers is measured
    #[arg(long, value_enum, default_value = "server")]
    bonus_timing: BonusTiming,

    /// Also close rounds on a server-side timer
    #[arg(long)]
    server_timer: bool,

    /// API key for the chat completion service (enables GPT: commands)
    #[arg(long, env = "COMPLETION_API_KEY", hide_env_values = true)]
    completion_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible completion API
    #[arg(long, env = "COMPLETION_BASE_URL", default_value = "https://api.aimlapi.com/v1")]
    completion_base_url: String,

    /// Model requested from the completion API
    #[arg(long, default_value = "gpt-3.5-turbo")]
    completion_model: String,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let completion = self.completion_api_key.map(|key| {
            let mut config = CompletionConfig::new(self.completion_base_url, key);
            config.model = self.completion_model;
            config
        });

        ServerConfig {
            host: self.host,
            port: self.port,
            quizzes_path: self.quizzes,
            round: RoundSettings {
                question_time: Duration::from_secs(self.question_time),
                bonus_timing: self.bonus_timing,
                auto_close: self.server_timer,
            },
            completion,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("quiz_arena=info".parse()?))
        .init();

    let config = Args::parse().into_config();
    server::run(config).await?;
    Ok(())
}
