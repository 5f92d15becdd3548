use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use speakloop::audio::FileBackend;
use speakloop::speech::scripted::speak_words;
use speakloop::speech::{ScriptedGenerator, ScriptedRecognizer, ScriptedSynthesizer};
use speakloop::turn::next_event;
use speakloop::utterance::shadow;
use speakloop::{
    create_router, nats, AppState, AudioBackend, Collaborators, Config, ConversationSession,
    NatsClient, Role, TurnEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "speakloop", about = "Spoken conversation practice engine")]
struct Args {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/speakloop")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API with NATS-backed speech services
    Serve,

    /// Run a scripted conversation and print its turn events
    Simulate {
        /// Learner lines, one per turn
        #[arg(short, long)]
        say: Vec<String>,

        /// WAV file replayed as microphone input for level metering
        #[arg(short, long)]
        wav: Option<String>,
    },

    /// Score a shadow-speaking attempt
    Shadow {
        #[arg(short, long)]
        target: String,

        #[arg(short, long)]
        spoken: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Serve => serve(Config::load(&args.config)?).await,
        Command::Simulate { say, wav } => simulate(Config::load(&args.config)?, say, wav).await,
        Command::Shadow { target, spoken } => {
            println!("{:.2}", shadow::score(&target, &spoken));
            Ok(())
        }
    }
}

async fn serve(cfg: Config) -> Result<()> {
    info!("Loaded config: {}", cfg.service.name);

    let client = NatsClient::connect(cfg.nats.clone()).await?;
    let template = cfg.session_config(String::new());

    let factory_client = client.clone();
    let state = AppState::new(
        template,
        Arc::new(move |conversation_id: &str| nats::collaborators(&factory_client, conversation_id)),
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")
}

async fn simulate(cfg: Config, mut lines: Vec<String>, wav: Option<String>) -> Result<()> {
    if lines.is_empty() {
        lines = vec![
            "Hola me llamo Ana".to_string(),
            "Um vivo en Madrid con mi familia".to_string(),
        ];
    }

    let scripts = lines.iter().map(|line| speak_words(line, 600, 350)).collect();
    let audio = wav.map(|path| {
        Box::new(FileBackend::new(path, cfg.audio_backend_config())) as Box<dyn AudioBackend>
    });

    let session = ConversationSession::spawn(
        cfg.session_config(format!("simulation-{}", uuid::Uuid::new_v4())),
        Collaborators {
            recognizer: Box::new(ScriptedRecognizer::new(scripts)),
            generator: Arc::new(ScriptedGenerator::new(vec![Ok(
                "¡Hola! ¿Cómo te llamas?".to_string()
            )])),
            synthesizer: Arc::new(ScriptedSynthesizer::new()),
            audio,
        },
    );

    let mut events = session.subscribe();
    session.start_session().await?;

    let mut learner_turns = 0;
    while learner_turns < lines.len() {
        let event = tokio::time::timeout(Duration::from_secs(30), next_event(&mut events))
            .await
            .context("Conversation stalled")?
            .context("Conversation ended unexpectedly")?;

        println!("{}", serde_json::to_string(&event)?);

        if let TurnEvent::TurnCompleted {
            role: Role::Learner,
            ..
        } = event
        {
            learner_turns += 1;
        }
    }

    let history = session.history().await?;
    session.shutdown().await?;

    for message in history {
        println!("{:?}: {}", message.role, message.text);
    }

    Ok(())
}
