use anyhow::{anyhow, Context as _, Result};
use dotenvy::dotenv;
use log::{error, info};
use serenity::client::bridge::gateway::ShardManager;
use serenity::http::Http;
use serenity::prelude::*;
use std::sync::Arc;

use cordbind::commands::{from_fn, Chain, Command, Data, Engine, Executor, Next, Node, Request, SubcommandGroup};
use cordbind::core::error::{DispatchError, SchemaError};
use cordbind::core::model::{Choice, Interaction, Response, User};
use cordbind::core::{Config, Session};
use cordbind::discord::{Gateway, SerenityRegistry};
use cordbind::schema::{Fields, Payload};

/// Discord's ADMINISTRATOR permission bit
const ADMINISTRATOR: u64 = 1 << 3;

const COLORS: [&str; 6] = ["red", "orange", "yellow", "green", "blue", "purple"];

#[derive(Debug, Default)]
struct EchoArgs {
    text: String,
    times: Option<i64>,
}

impl Payload for EchoArgs {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
        fields
            .field("text", "description:What to repeat", |a| &mut a.text)?
            .field("times", "required:false,description:How often (1-5)", |a| &mut a.times)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ColorArgs {
    color: String,
    path: Vec<String>,
}

impl Payload for ColorArgs {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
        fields
            .field("color", "description:Pick a color", |a| &mut a.color)?
            .field("path", "special:path", |a| &mut a.path)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct WhoisArgs {
    user: Option<User>,
}

impl Payload for WhoisArgs {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
        fields.field("user", "required:false,description:Defaults to you", |a| &mut a.user)?;
        Ok(())
    }
}

fn ping() -> Result<Executor, SchemaError> {
    Executor::new(
        "ping",
        "Check the bot is alive",
        |session: Arc<dyn Session>, interaction: Arc<Interaction>| async move {
            session.respond(&interaction, &Response::message("🏓 Pong!")).await
        },
    )
}

fn echo() -> Result<Executor, SchemaError> {
    Executor::new(
        "echo",
        "Repeat some text",
        |session: Arc<dyn Session>, interaction: Arc<Interaction>, Data(args): Data<EchoArgs>| async move {
            let times = args.times.unwrap_or(1).clamp(1, 5) as usize;
            let content = vec![args.text; times].join("\n");
            session.respond(&interaction, &Response::message(content)).await
        },
    )
}

fn whois() -> Result<Executor, SchemaError> {
    Executor::new(
        "whois",
        "Show a user's id",
        |session: Arc<dyn Session>, interaction: Arc<Interaction>, Data(args): Data<WhoisArgs>| async move {
            let user = args.user.unwrap_or_else(|| interaction.user.clone());
            let kind = if user.bot { "bot" } else { "user" };
            let content = format!("👤 {} is {kind} `{}`", user.name, user.id);
            session.respond(&interaction, &Response::ephemeral(content)).await
        },
    )
}

/// `/palette color pick`, grouped to show path metadata and autocomplete
fn palette() -> Result<Command> {
    let pick = Executor::new(
        "pick",
        "Pick a color",
        |session: Arc<dyn Session>, interaction: Arc<Interaction>, Data(args): Data<ColorArgs>| async move {
            let content = format!("🎨 {} (via /{})", args.color, args.path.join(" "));
            session.respond(&interaction, &Response::message(content)).await
        },
    )?;
    pick.set_autocomplete("color", |Data(args): Data<ColorArgs>| async move {
        let typed = args.color.to_lowercase();
        COLORS
            .iter()
            .filter(|color| color.starts_with(&typed))
            .map(|color| Choice::string(*color, *color))
            .collect::<Vec<_>>()
    })?;

    let group = SubcommandGroup::new("color", "Color tools")?;
    group.add_subcommand(pick);

    let command = Command::new("palette", "Palette commands")?;
    command.add_group(group)?;
    Ok(command)
}

#[derive(Debug, Default)]
struct ShutdownArgs {
    confirm: bool,
    message: Option<String>,
}

impl Payload for ShutdownArgs {
    fn describe(fields: &mut Fields<Self>) -> Result<(), SchemaError> {
        fields
            .field("confirm", "description:Really shut down", |a| &mut a.confirm)?
            .field(
                "message",
                "required:false,description:Message shown before shutting down",
                |a| &mut a.message,
            )?;
        Ok(())
    }
}

/// `/admin shutdown`, behind an ADMINISTRATOR check on the whole command
fn admin(shard_manager: Arc<Mutex<ShardManager>>) -> Result<Command> {
    let shutdown = Executor::new(
        "shutdown",
        "Stop the bot",
        move |session: Arc<dyn Session>, interaction: Arc<Interaction>, Data(args): Data<ShutdownArgs>| {
            let shard_manager = Arc::clone(&shard_manager);
            async move {
                if !args.confirm {
                    let notice = Response::ephemeral("Shutdown not confirmed");
                    return session.respond(&interaction, &notice).await;
                }
                let farewell = args.message.unwrap_or_else(|| "👋 Shutting down".to_string());
                session.respond(&interaction, &Response::message(farewell)).await?;
                info!("🛑 Shutdown requested by {}", interaction.user.name);
                shard_manager.lock().await.shutdown_all().await;
                Ok(())
            }
        },
    )?;

    let command = Command::new("admin", "Administrative commands")?;
    command.add_subcommand(shutdown)?;
    command.set_middleware(Chain::new().append(from_fn(|request: Request, next: Next| async move {
        if request.interaction().member_permissions.unwrap_or(0) & ADMINISTRATOR == 0 {
            request
                .respond(Response::ephemeral("🚫 Administrators only"))
                .await
                .map_err(DispatchError::Execution)?;
            return Err(DispatchError::middleware(anyhow!("missing ADMINISTRATOR permission")));
        }
        next(request).await
    })));
    Ok(command)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    info!("Starting cordbind bot...");

    let application_id = Http::new(&config.discord_token)
        .get_current_application_info()
        .await
        .context("fetching application info")?
        .id
        .0;
    info!("🤖 Application ID: {application_id}");

    let http = Arc::new(Http::new_with_application_id(&config.discord_token, application_id));
    let engine = Arc::new(Engine::new(Arc::new(SerenityRegistry::new(http))));

    engine.set_error_handler(|session: Arc<dyn Session>, interaction: Arc<Interaction>, err: DispatchError| async move {
        error!("❌ /{} failed: {err:#}", interaction.command_name);
        if matches!(err, DispatchError::Execution(_) | DispatchError::Parsing(_)) {
            let notice = Response::ephemeral("❌ Something went wrong running that command");
            if let Err(e) = session.respond(&interaction, &notice).await {
                error!("Failed to send error message: {e}");
            }
        }
    });

    let mut client = Client::builder(&config.discord_token, GatewayIntents::GUILDS)
        .application_id(application_id)
        .event_handler(Gateway::new(Arc::clone(&engine), config.sync_commands))
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            e
        })?;

    // Commands are published once the gateway reports ready
    let commands: Vec<Node> = vec![
        ping()?.into(),
        echo()?.into(),
        whois()?.into(),
        palette()?.into(),
        admin(Arc::clone(&client.shard_manager))?.into(),
    ];
    match config.discord_guild_id {
        Some(guild_id) => info!("🔧 Development mode: Registering commands for guild {guild_id}"),
        None => info!("🌍 Production mode: Registering commands globally"),
    }
    for node in commands {
        match config.discord_guild_id {
            Some(guild_id) => engine.add_guild_command(guild_id, node),
            None => engine.add_command(node),
        }
    }

    info!("Establishing WebSocket connection to Discord gateway...");
    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        engine.close();
        return Err(why.into());
    }

    Ok(())
}
