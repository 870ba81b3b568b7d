use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use parley_core::{IceServerConfig, NegotiationMessage, ParticipantId, RemoteTrack, decode};
use parley_peer::coordinator::{CoordinatorHandle, SessionObserver};
use parley_peer::media::SyntheticMediaSource;
use parley_peer::relay::MemoryRelay;
use parley_peer::session::{NegotiationState, Role};
use parley_peer::transport::{TransportConfig, WebRtcTransportFactory};
use parley_peer::{NegotiationError, Participant, ParticipantConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Two-party media negotiation coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Negotiate between two in-process participants over real transports.
    Demo {
        #[arg(long, default_value = "abc")]
        room: String,

        /// STUN server url. Repeat for several; defaults to public servers.
        #[arg(long)]
        stun: Vec<String>,

        /// Gather host candidates only.
        #[arg(long, conflicts_with = "stun")]
        no_stun: bool,
    },

    /// Decode a negotiation payload as received from the relay.
    Decode { payload: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            room,
            stun,
            no_stun,
        } => {
            let transport = if no_stun {
                TransportConfig::local_only()
            } else if stun.is_empty() {
                TransportConfig::default()
            } else {
                TransportConfig {
                    ice_servers: vec![IceServerConfig::stun(stun)],
                }
            };
            run_demo(room, transport).await?;
        }
        Commands::Decode { payload } => run_decode(&payload),
    }

    Ok(())
}

async fn run_demo(room: String, transport: TransportConfig) -> Result<()> {
    println!(
        "{}",
        format!("Starting demo in room '{}'...", room).green().bold()
    );

    info!("Demo room '{}' with {} ICE server(s)", room, transport.ice_servers.len());
    let relay = MemoryRelay::new();
    let alice = join(&relay, &room, "alice", transport.clone()).await?;
    let bob = join(&relay, &room, "bob", transport).await?;

    let connected = wait_until_connected(&alice, bob.local_id()).await?
        && wait_until_connected(&bob, alice.local_id()).await?;

    for handle in [&alice, &bob] {
        for session in handle.snapshot().await? {
            println!(
                "   {} -> {}: {} ({}), epoch {}",
                handle.local_id(),
                session.remote_id,
                session.state,
                session.role,
                session.epoch
            );
        }
    }

    alice.leave().await?;
    bob.leave().await?;
    info!("Both participants left '{}'", room);

    if connected {
        println!("{}", "Negotiation completed successfully!".green().bold());
        Ok(())
    } else {
        warn!("Gave up waiting for the sessions after {:?}", DEMO_TIMEOUT);
        anyhow::bail!("Negotiation did not complete within {:?}", DEMO_TIMEOUT)
    }
}

async fn join(
    relay: &MemoryRelay,
    room: &str,
    name: &str,
    transport: TransportConfig,
) -> Result<CoordinatorHandle> {
    let config = ParticipantConfig::new(room)
        .with_participant_id(name)
        .with_transport(transport);

    let handle = Participant::connect(
        config,
        Arc::new(relay.client()),
        Arc::new(SyntheticMediaSource::new(name)),
        Arc::new(WebRtcTransportFactory),
        Arc::new(ConsoleObserver {
            local_id: name.into(),
        }),
    )
    .await
    .with_context(|| format!("Failed to connect {}", name))?;

    println!("{} {}", "Joined:".cyan(), name);
    Ok(handle)
}

async fn wait_until_connected(handle: &CoordinatorHandle, peer_id: &ParticipantId) -> Result<bool> {
    let start = Instant::now();
    while start.elapsed() < DEMO_TIMEOUT {
        if let Some(session) = handle.session(peer_id).await? {
            if session.state == NegotiationState::Connected {
                return Ok(true);
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    warn!("{} never connected to {}", handle.local_id(), peer_id);
    Ok(false)
}

fn run_decode(payload: &str) {
    match decode(payload) {
        Ok(NegotiationMessage::Offer { offer }) => {
            println!("{} ({} bytes of sdp)", "offer".green().bold(), offer.sdp.len());
        }
        Ok(NegotiationMessage::Answer { answer }) => {
            println!("{} ({} bytes of sdp)", "answer".green().bold(), answer.sdp.len());
        }
        Ok(NegotiationMessage::Candidate { candidate }) => {
            println!("{} {}", "candidate".green().bold(), candidate.candidate);
            if let Some(mid) = candidate.sdp_mid {
                println!("   sdpMid: {}", mid);
            }
            if let Some(index) = candidate.sdp_m_line_index {
                println!("   sdpMLineIndex: {}", index);
            }
        }
        Err(e) => println!("{} {}", "Rejected:".red().bold(), e),
    }
}

struct ConsoleObserver {
    local_id: ParticipantId,
}

#[async_trait]
impl SessionObserver for ConsoleObserver {
    async fn on_role_assigned(&self, peer_id: ParticipantId, role: Role) {
        println!(
            "[{}] {} towards {}",
            self.local_id,
            role.to_string().yellow(),
            peer_id
        );
    }

    async fn on_state_changed(&self, peer_id: ParticipantId, state: NegotiationState) {
        let state = match state {
            NegotiationState::Connected => state.to_string().green(),
            NegotiationState::Closed => state.to_string().red(),
            _ => state.to_string().normal(),
        };
        println!("[{}] {} is {}", self.local_id, peer_id, state);
    }

    async fn on_remote_track(&self, peer_id: ParticipantId, track: RemoteTrack) {
        println!(
            "[{}] receiving {} from {}",
            self.local_id,
            track.kind.to_string().cyan(),
            peer_id
        );
    }

    async fn on_negotiation_failed(&self, peer_id: ParticipantId, error: &NegotiationError) {
        println!(
            "[{}] {} {}: {}",
            self.local_id,
            "Failed:".red().bold(),
            peer_id,
            error
        );
    }
}
