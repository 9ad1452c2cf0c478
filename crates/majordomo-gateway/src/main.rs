use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use majordomo_access::{AccessControl, store::AccessStore};
use majordomo_channels::Router;
use majordomo_core::config::MajordomoConfig;
use majordomo_core::vault::Vault;
use majordomo_peers::{
    keys, AuditLog, Heartbeater, NonceCache, PeerInbox, PeerRegistry, PeerSender, RelayClient,
};
use majordomo_scheduler::{Scheduler, SessionGate};
use majordomo_session::SessionBridge;
use majordomo_tasks::{TaskDeps, TaskPaths};
use majordomo_transcript::TranscriptStream;
use majordomo_voice::{resolve_stt, resolve_tts, VoiceAdapter, VoicePipeline};

mod app;
mod http;

use app::{AppState, PeerPlane, VoicePlane};

/// Hard exit this long after a shutdown signal if cleanup stalls.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "majordomo-gateway", about = "Always-on personal assistant daemon")]
struct Args {
    /// Path to majordomo.yaml (default: ./majordomo.yaml, then
    /// ~/.majordomo/majordomo.yaml).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = MajordomoConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("config load failed ({e}), using defaults");
        MajordomoConfig::default()
    });

    let log_dir = PathBuf::from(&config.daemon.log_dir);
    let _logging = majordomo_core::logging::init_daemon(
        &log_dir,
        &config.daemon.log_level,
        &config.daemon.log_rotation,
    )?;
    info!(agent = %config.agent.name, "majordomo starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = build_state(config, log_dir.clone(), &shutdown_rx).await?;
    let router = app::build_router(Arc::clone(&state));

    // Port binding races the previous daemon instance releasing the port.
    let addr: SocketAddr = format!("{}:{}", state.config.daemon.bind, state.config.daemon.port)
        .parse()?;
    let listener = bind_with_retry(addr).await?;
    info!(%addr, "gateway listening");

    // Signal handling: one watch flip stops every subsystem; a watchdog
    // hard-exits if anything stalls past the grace period.
    tokio::spawn(handle_signals(shutdown_tx));

    let mut server_shutdown = shutdown_rx.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
            // Give the siblings a beat to wind down before the listener
            // closes.
            tokio::time::sleep(Duration::from_millis(200)).await;
        })
        .await?;

    info!("gateway stopped");
    Ok(())
}

async fn handle_signals(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("sigterm handler");
        tokio::select! {
            _ = ctrl_c => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("SIGINT received");
    }

    let _ = shutdown_tx.send(true);
    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        error!("cleanup stalled — hard exit");
        std::process::exit(1);
    });
}

async fn bind_with_retry(addr: SocketAddr) -> anyhow::Result<tokio::net::TcpListener> {
    let mut last_err = None;
    for attempt in 1..=3u32 {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                warn!(attempt, error = %e, "bind failed, retrying");
                last_err = Some(e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    Err(anyhow::anyhow!(
        "could not bind {addr}: {}",
        last_err.expect("at least one bind attempt")
    ))
}

/// Build every subsystem, spawn the long-running workers, and return the
/// shared state. Adapters with missing prerequisites log a startup warning
/// and stay down; the rest of the daemon continues.
async fn build_state(
    config: MajordomoConfig,
    log_dir: PathBuf,
    shutdown_rx: &watch::Receiver<bool>,
) -> anyhow::Result<Arc<AppState>> {
    let state_dir = PathBuf::from(&config.daemon.state_dir);
    std::fs::create_dir_all(&state_dir)?;
    let base_dir = state_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| state_dir.clone());

    let vault = Vault::with_default_stores(&format!("majordomo.{}", config.agent.name));

    // Session bridge + transcript stream.
    let transcript_dir = PathBuf::from(&config.transcript.dir);
    let bridge = Arc::new(SessionBridge::new(&config.tmux, transcript_dir.clone()));
    let (stream, transcript) = TranscriptStream::new(transcript_dir.clone());
    tokio::spawn(stream.run(shutdown_rx.clone()));

    match majordomo_transcript::spawn_watcher(transcript.clone(), &transcript_dir) {
        // Keep the watcher alive for the process lifetime.
        Ok(watcher) => std::mem::forget(watcher),
        Err(e) => warn!(error = %e, "transcript watcher unavailable — relying on hooks and polling"),
    }
    let poll_every = majordomo_core::config::parse_interval(&config.transcript.poll_interval)
        .unwrap_or(Duration::from_secs(20));
    majordomo_transcript::spawn_poll_timer(transcript.clone(), poll_every, shutdown_rx.clone());

    // Router + access control.
    let router = Arc::new(Router::new(state_dir.join("channel")));
    let access_store = AccessStore::open(
        state_dir.join("access.json"),
        &state_dir.join("safe_senders.json"),
    )?;
    let access = Arc::new(AccessControl::new(
        access_store,
        config.security.rate_limits.incoming_max_per_minute,
        config.security.rate_limits.outgoing_max_per_minute,
        config.security.auto_block_after,
    ));

    // Telegram adapter.
    let telegram = match config.channels.telegram.as_ref().filter(|t| t.enabled) {
        Some(tg_config) => match vault.get(&tg_config.bot_token_secret).await {
            Ok(token) => {
                let bot = teloxide::Bot::new(token.expose());
                let adapter = Arc::new(majordomo_telegram::TelegramAdapter::new(
                    bot.clone(),
                    tg_config.primary_chat_id,
                ));
                router.register(adapter);
                let ctx = Arc::new(majordomo_telegram::TelegramContext {
                    bot,
                    access: Arc::clone(&access),
                    bridge: Arc::clone(&bridge),
                    router: Arc::clone(&router),
                    primary_chat_id: tg_config.primary_chat_id,
                });
                if tg_config.webhook_path.is_none() {
                    tokio::spawn(majordomo_telegram::TelegramAdapter::run_polling(
                        Arc::clone(&ctx),
                    ));
                }
                Some(ctx)
            }
            Err(e) => {
                warn!(error = %e, "telegram enabled but bot token unavailable — adapter not started");
                None
            }
        },
        None => None,
    };

    let webhook_secret = match config
        .channels
        .telegram
        .as_ref()
        .and_then(|t| t.webhook_secret.as_deref())
    {
        Some(name) => match vault.get(name).await {
            Ok(secret) => Some(secret),
            Err(e) => {
                warn!(error = %e, "webhook secret unavailable — webhook ingress disabled");
                None
            }
        },
        None => None,
    };

    // Email adapter over the ordered provider list. The spool kind is the
    // only in-tree backend; network backends plug in behind the same trait.
    let (mailbox, triage) = match config.channels.email.as_ref().filter(|e| e.enabled) {
        Some(email_config) => {
            let mut providers: Vec<Arc<dyn majordomo_email::MailProvider>> = Vec::new();
            for p in &email_config.providers {
                match p.kind.as_str() {
                    "spool" => {
                        let dir = p
                            .dir
                            .clone()
                            .map(PathBuf::from)
                            .unwrap_or_else(|| base_dir.join("mailspool"));
                        match majordomo_email::SpoolProvider::new(&p.name, &p.address, &dir) {
                            Ok(provider) => providers.push(Arc::new(provider)),
                            Err(e) => warn!(provider = %p.name, error = %e, "spool provider failed to open"),
                        }
                    }
                    other => {
                        warn!(provider = %p.name, kind = other, "no in-tree client for this provider kind — skipped");
                    }
                }
            }

            if providers.is_empty() {
                warn!("email enabled but no providers resolved — adapter not started");
                (None, None)
            } else {
                let adapter = Arc::new(majordomo_email::EmailAdapter::new(providers));
                router.register(
                    Arc::clone(&adapter) as Arc<dyn majordomo_channels::Channel>
                );
                (
                    Some(adapter),
                    Some(Arc::new(majordomo_email::TriageClassifier::new(
                        &email_config.triage,
                    ))),
                )
            }
        }
        None => (None, None),
    };

    // Voice plane.
    let voice = match config.channels.voice.as_ref().filter(|v| v.enabled) {
        Some(voice_config) => {
            let adapter = Arc::new(VoiceAdapter::new());
            router.register(Arc::clone(&adapter) as Arc<dyn majordomo_channels::Channel>);
            let pipeline = match (
                resolve_stt(&voice_config.stt),
                resolve_tts(&voice_config.tts),
            ) {
                (Some(stt), Some(tts)) => Some(Arc::new(VoicePipeline::new(
                    stt,
                    tts,
                    Arc::clone(&bridge) as Arc<dyn majordomo_voice::Injector>,
                    Arc::clone(&router),
                ))),
                _ => {
                    warn!(
                        stt = %voice_config.stt,
                        tts = %voice_config.tts,
                        "voice enabled but engines did not resolve — transcribe route disabled"
                    );
                    None
                }
            };
            Some(VoicePlane { adapter, pipeline })
        }
        None => None,
    };

    // Peer plane.
    let peers = if config.agent_comms.enabled {
        match vault.get(&config.agent_comms.secret).await {
            Ok(bearer) => {
                let signing = match vault.get("agent-signing-key").await {
                    Ok(seed) => keys::signing_key_from_base64(seed.expose())?,
                    Err(_) => {
                        let key = keys::generate();
                        warn!(
                            public_key = %keys::verifying_key_to_base64(&key.verifying_key()),
                            "no signing key in vault — generated an ephemeral keypair; register the public key with the relay"
                        );
                        key
                    }
                };

                let registry = Arc::new(PeerRegistry::new(&config.agent_comms.peers));
                let audit = Arc::new(AuditLog::new(state_dir.join("message-audit.jsonl")));
                let relay = match (
                    config.network.enabled,
                    config.network.relay_url.as_deref(),
                ) {
                    (true, Some(url)) => Some(RelayClient::new(url, &config.agent.name)?),
                    (true, None) => {
                        warn!("network.enabled without relay_url — relay path disabled");
                        None
                    }
                    _ => None,
                };
                let sender = Arc::new(PeerSender::new(
                    bearer.clone(),
                    signing,
                    relay,
                    Arc::clone(&audit),
                )?);

                Some(PeerPlane {
                    registry,
                    inbox: Arc::new(PeerInbox::new()),
                    sender,
                    audit,
                    nonces: NonceCache::new(),
                    bearer,
                })
            }
            Err(e) => {
                warn!(error = %e, "agent comms enabled but bearer secret unavailable — peer plane disabled");
                None
            }
        }
    } else {
        None
    };

    // Scheduler + first-party tasks.
    let gate: Arc<dyn SessionGate> = Arc::clone(&bridge) as Arc<dyn SessionGate>;
    let scheduler = Scheduler::new(gate, state_dir.join("scheduler_state.json"))?;

    let heartbeater = peers
        .as_ref()
        .map(|p| {
            Heartbeater::new(
                Arc::clone(&p.registry),
                Arc::clone(&p.audit),
                p.bearer.clone(),
                config.agent.name.clone(),
            )
        })
        .transpose()?
        .map(Arc::new);

    let relay_for_tasks = match (config.network.enabled, config.network.relay_url.as_deref()) {
        (true, Some(url)) => Some(Arc::new(RelayClient::new(url, &config.agent.name)?)),
        _ => None,
    };

    let task_configs = config
        .scheduler
        .tasks
        .iter()
        .filter_map(|t| t.config.clone().map(|c| (t.name.clone(), c)))
        .collect();

    let consumer_mailbox = mailbox.clone();
    let deps = Arc::new(TaskDeps {
        bridge: Arc::clone(&bridge),
        router: Arc::clone(&router),
        access: Arc::clone(&access),
        transcript: transcript.clone(),
        paths: TaskPaths {
            calendar: base_dir.join("calendar.md"),
            todo: base_dir.join("todo.md"),
            context_usage: base_dir.join("context-usage.json"),
            scripts_dir: base_dir.join("scripts"),
        },
        mailbox,
        triage,
        heartbeater,
        relay: relay_for_tasks,
        peer_registry: peers.as_ref().map(|p| Arc::clone(&p.registry)),
        peer_inbox: peers.as_ref().map(|p| Arc::clone(&p.inbox)),
        peer_audit: peers.as_ref().map(|p| Arc::clone(&p.audit)),
        task_configs,
    });
    majordomo_tasks::register_all(&scheduler, &deps);
    scheduler.bind(&config.scheduler.tasks);
    tokio::spawn(scheduler.clone().run(shutdown_rx.clone()));

    // Outbound fan-out: transcript assistant messages → active channel.
    let mut events = transcript.subscribe();
    let consumer_router = Arc::clone(&router);
    let mut consumer_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(msg) => {
                        // An email selection carries its reply address.
                        if let majordomo_channels::Selection::Email(addr) =
                            consumer_router.channel()
                        {
                            if let Some(mb) = &consumer_mailbox {
                                mb.set_active_recipient(Some(addr));
                            }
                        }
                        if let Err(e) = consumer_router.route_assistant_message(&msg.text).await {
                            warn!(error = %e, "assistant message routing failed");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "assistant message consumer lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = consumer_shutdown.changed() => {
                    if *consumer_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    Ok(Arc::new(AppState {
        config,
        started_at: chrono::Utc::now(),
        bridge,
        router,
        access,
        transcript,
        scheduler,
        peers,
        voice,
        telegram,
        webhook_secret,
        log_dir,
    }))
}
