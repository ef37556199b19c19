//! Daemon runtime: the ledger plus its two background loops.
//!
//! Both loops talk to the ledger only through its public operations, each
//! call on the blocking pool since the store is synchronous SQLite. A tick
//! that fails is logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use x402_contracts::error::{ErrorKind, SequencerError, SequencerResult};
use x402_ledger::{Clock, Ledger, SystemClock};

use crate::config::SequencerConfig;

type Job = fn(&Ledger) -> SequencerResult<()>;

/// An opened ledger and the periods its loops run at.
pub struct Service {
    ledger: Ledger,
    epoch_period: Duration,
    sweep_period: Duration,
}

impl Service {
    /// Open the configured database, seed relayer keys, and attach the
    /// registry anchor if one is configured.
    pub fn open(config: &SequencerConfig) -> SequencerResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: &SequencerConfig, clock: Arc<dyn Clock>) -> SequencerResult<Self> {
        let mut ledger = Ledger::open(&config.database_path, config.ledger_config()?, clock)?;
        if let Some(anchor) = config.anchor() {
            ledger = ledger.with_anchor(Arc::new(anchor));
        }
        for key in config.relayer_keys() {
            ledger.upsert_relayer_key(&key)?;
        }

        info!(
            database = %config.database_path.display(),
            sequencer_key_id = %ledger.sequencer_key_id(),
            sequencer_public_key = %ledger.sequencer_public_key_hex(),
            relayer_keys = config.relayer_keys.len(),
            "sequencer ledger opened"
        );

        Ok(Self::from_ledger(
            ledger,
            Duration::from_secs(config.epoch_seconds),
            Duration::from_secs(config.sweeper_seconds),
        ))
    }

    pub fn from_ledger(ledger: Ledger, epoch_period: Duration, sweep_period: Duration) -> Self {
        Self {
            ledger,
            epoch_period,
            sweep_period,
        }
    }

    /// Start the epoch and sweep loops on the current tokio runtime.
    pub fn spawn(self) -> ServiceHandle {
        let (shutdown, rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(run_periodic(
                "epoch",
                self.epoch_period,
                self.ledger.clone(),
                rx.clone(),
                commit_epoch,
            )),
            tokio::spawn(run_periodic(
                "sweep",
                self.sweep_period,
                self.ledger.clone(),
                rx,
                sweep_expired,
            )),
        ];
        ServiceHandle {
            ledger: self.ledger,
            shutdown,
            tasks,
        }
    }
}

/// Running loops. Dropping the handle without calling
/// [`ServiceHandle::shutdown`] leaves the loops running.
pub struct ServiceHandle {
    ledger: Ledger,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceHandle {
    /// Signal both loops, wait for their current tick to finish, then close
    /// the store.
    pub async fn shutdown(self) -> SequencerResult<()> {
        // Receivers are held by the loops; a send error means they already exited.
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "background loop panicked");
            }
        }
        self.ledger.close()?;
        info!("sequencer stopped");
        Ok(())
    }
}

/// Run the daemon until ctrl-c.
pub async fn run(config: SequencerConfig) -> SequencerResult<()> {
    let handle = Service::open(&config)?.spawn();
    info!(
        epoch_seconds = config.epoch_seconds,
        sweeper_seconds = config.sweeper_seconds,
        "sequencer running, press ctrl-c to stop"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c, shutting down");
    } else {
        info!("shutdown requested");
    }
    handle.shutdown().await
}

async fn run_periodic(
    name: &'static str,
    period: Duration,
    ledger: Ledger,
    mut shutdown: watch::Receiver<bool>,
    job: Job,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; start one full period in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let ledger = ledger.clone();
        match tokio::task::spawn_blocking(move || job(&ledger)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log_tick_failure(name, &e),
            Err(e) => error!(loop_name = name, error = %e, "background tick panicked"),
        }
    }
    debug!(loop_name = name, "background loop stopped");
}

fn log_tick_failure(name: &'static str, e: &SequencerError) {
    match e.kind() {
        ErrorKind::Invariant | ErrorKind::Internal => {
            error!(loop_name = name, code = e.code(), error = %e, "background tick failed")
        }
        _ => warn!(loop_name = name, code = e.code(), error = %e, "background tick failed"),
    }
}

fn commit_epoch(ledger: &Ledger) -> SequencerResult<()> {
    let outcome = ledger.run_commitment_epoch()?;
    match outcome.epoch {
        Some(epoch) if outcome.committed => info!(
            epoch_id = epoch.epoch_id,
            leaf_count = epoch.leaf_count,
            root = %epoch.root,
            "epoch tick committed"
        ),
        _ => debug!("epoch tick idle"),
    }
    Ok(())
}

fn sweep_expired(ledger: &Ledger) -> SequencerResult<()> {
    let report = ledger.sweep_expired()?;
    if !report.reclaimed.is_empty() || !report.failed.is_empty() {
        info!(
            reclaimed = report.reclaimed.len(),
            failed = report.failed.len(),
            "sweep tick finished"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;

    use x402_contracts::{
        agent::SignatureScheme,
        authorization::{AuthStatus, Intent},
    };
    use x402_crypto::{derive_agent_id, Ed25519Signer, SignedMessage};
    use x402_ledger::{LedgerConfig, ManualClock};

    use super::*;

    const T0: i64 = 1_700_000_000;
    const CHAIN: &str = "solana:devnet";

    fn ledger(clock: Arc<ManualClock>) -> Ledger {
        let sequencer = Ed25519Signer::new("seq-key-1", SigningKey::from_bytes(&[0x5Eu8; 32]));
        let config = LedgerConfig::new(sequencer, b"salt".to_vec())
            .with_chain_ref(CHAIN)
            .with_execution_grace_seconds(60);
        Ledger::open_in_memory(config, clock).unwrap()
    }

    fn issue(ledger: &Ledger) -> String {
        let key = SigningKey::from_bytes(&[0x01u8; 32]);
        let pk = hex::encode(key.verifying_key().as_bytes());
        ledger
            .credit_agent(SignatureScheme::Ed25519Sha256V1, &pk, 10_000)
            .unwrap();
        let intent = Intent {
            agent_id: derive_agent_id(SignatureScheme::Ed25519Sha256V1, &pk).unwrap(),
            agent_pub_key: pk,
            signature_scheme: SignatureScheme::Ed25519Sha256V1,
            agent_nonce: 0,
            amount_micros: 1_000,
            merchant_id: "merchant-1".to_string(),
            required_chain_ref: CHAIN.to_string(),
            expires_at: T0 + 30,
            request_id: "req-0".to_string(),
            service_hash: None,
            memo_hash: None,
        };
        let sig = Ed25519Signer::new("agent", key).sign(&intent.canonical_bytes());
        ledger.authorize(&intent, &sig).unwrap().authorization.auth_id
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    // ── Startup ───────────────────────────────────────────────────────────────

    #[test]
    fn test_open_seeds_relayer_keys_from_config() {
        let path = std::env::temp_dir().join(format!("x402d-service-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let relayer = Ed25519Signer::new("relayer-1", SigningKey::from_bytes(&[0x42u8; 32]));
        let toml = format!(
            r#"
database_path = "{}"
supported_chain_refs = ["{CHAIN}"]
leaf_salt_secret = "salt"

[sequencer]
key_id = "seq-key-1"
private_key = "{}"

[[relayer_keys]]
chain_ref = "{CHAIN}"
key_id = "relayer-1"
public_key = "{}"
"#,
            path.display(),
            "5e".repeat(32),
            relayer.public_key_hex(),
        );
        let config = SequencerConfig::from_toml_str(&toml).unwrap();
        let service = Service::open_with_clock(&config, Arc::new(ManualClock::at_unix(T0))).unwrap();

        let key = service.ledger.relayer_key(CHAIN, "relayer-1").unwrap().unwrap();
        assert_eq!(key.public_key, relayer.public_key_hex());
        assert_eq!(service.ledger.sequencer_key_id(), "seq-key-1");

        service.ledger.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    // ── Loops ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_epoch_loop_commits_pending() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let ledger = ledger(clock);
        let auth_id = issue(&ledger);

        let handle = Service::from_ledger(
            ledger.clone(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        )
        .spawn();
        wait_for(|| ledger.counters().unwrap().committed_seq_no == 1).await;

        let proof = ledger.build_inclusion_proof(&auth_id).unwrap();
        assert_eq!(proof.epoch_id, 1);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_loop_reclaims_after_grace() {
        let clock = Arc::new(ManualClock::at_unix(T0));
        let ledger = ledger(clock.clone());
        let auth_id = issue(&ledger);
        clock.advance_secs(30 + 60 + 1);

        let handle = Service::from_ledger(
            ledger.clone(),
            Duration::from_secs(3600),
            Duration::from_millis(10),
        )
        .spawn();
        wait_for(|| {
            ledger.authorization(&auth_id).unwrap().map(|a| a.status) == Some(AuthStatus::Reclaimed)
        })
        .await;
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_ledger() {
        let ledger = ledger(Arc::new(ManualClock::at_unix(T0)));
        let handle = Service::from_ledger(
            ledger.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
        .spawn();
        handle.shutdown().await.unwrap();

        let err = ledger.counters().unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
    }
}
