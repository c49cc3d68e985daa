//! ALFA BioCrypt - CLI
//!
//! Command-line front end over the software key store. Fingerprint readings
//! come from the console (or match automatically with `--auto-match`).

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use log::debug;
use secrecy::ExposeSecret;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;

use alfa_biocrypt::biometrics::{
    BiometricSensor, CancellationSignal, PromptIcon, ScanListener, ScanPrompt, SensorCallback,
    SimulatedSensor, HW_CANCELED_MESSAGE,
};
use alfa_biocrypt::cipher_session::CryptoObject;
use alfa_biocrypt::keystore::DeviceSecurityState;
use alfa_biocrypt::{
    Availability, BiometricCrypto, CryptoConfig, CryptoOutcome, CryptoResult, FileCredentialStore,
    KeyAlias, MemoryCredentialStore, ScanEvent, SoftwareKeyStore,
};

const CONFIG_FILE: &str = "config.json";

#[derive(Parser)]
#[command(name = "alfa-biocrypt")]
#[command(author = "Karen Tonoyan")]
#[command(version = alfa_biocrypt::VERSION)]
#[command(about = "ALFA BioCrypt - Biometric-gated credential encryption")]
struct Cli {
    /// Data directory (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/config.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Every fingerprint scan matches immediately
    #[arg(long)]
    auto_match: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the emulated device: secure lock screen and one enrolled fingerprint
    Init,

    /// Show device readiness
    Status,

    /// List key aliases
    List,

    /// Encrypt a secret under an alias
    Encrypt {
        alias: String,

        /// Secret to encrypt (read from stdin if omitted)
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Decrypt the secret stored under an alias
    Decrypt { alias: String },

    /// Delete the key and stored credential for an alias
    Delete { alias: String },

    /// Enroll another fingerprint (invalidates existing keys)
    Enroll,

    /// Remove every enrolled fingerprint (invalidates existing keys)
    Unenroll,

    /// Change the lock screen (disabling or resetting invalidates existing keys)
    LockScreen {
        #[arg(value_enum)]
        action: LockScreenAction,
    },

    /// In-memory walkthrough of encrypt, decrypt and invalidation
    Demo,
}

#[derive(Clone, Copy, ValueEnum)]
enum LockScreenAction {
    On,
    Off,
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CryptoConfig> {
    let mut config = match &cli.config {
        Some(path) => CryptoConfig::load(path)?,
        None => {
            let data_dir = cli
                .data_dir
                .clone()
                .unwrap_or_else(|| CryptoConfig::default().data_dir);
            let path = data_dir.join(CONFIG_FILE);
            if path.exists() {
                CryptoConfig::load(&path)?
            } else {
                CryptoConfig::default()
            }
        }
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    config.validate()?;
    Ok(config)
}

struct Device {
    store: Arc<SoftwareKeyStore>,
    service: BiometricCrypto,
}

fn open_device(config: &CryptoConfig, auto_match: bool) -> CryptoResult<Device> {
    let store = Arc::new(SoftwareKeyStore::open(&config.data_dir, &config.keystore_file)?);
    let credentials = Arc::new(FileCredentialStore::open(
        &config.data_dir,
        &config.credentials_file,
    )?);
    let sensor = Arc::new(ConsoleSensor {
        store: Arc::clone(&store),
        auto_match,
    });

    let service = BiometricCrypto::new(store.clone(), sensor, credentials, config.clone());
    Ok(Device { store, service })
}

async fn run(cli: Cli, config: CryptoConfig) -> anyhow::Result<()> {
    let auto_match = cli.auto_match;
    let open = || {
        open_device(&config, auto_match)
            .with_context(|| format!("opening {}", config.data_dir.display()))
    };

    match cli.command {
        Commands::Init => {
            let device = open()?;
            println!("🔐 Initialising ALFA BioCrypt in {}", config.data_dir.display());
            device.store.set_lock_screen_secure(true)?;
            if device.store.device_state().enrolled_biometrics == 0 {
                device.store.enroll_biometric()?;
            }
            config.save(&config.data_dir.join(CONFIG_FILE))?;
            println!("✅ Secure lock screen enabled, fingerprint enrolled");
        }

        Commands::Status => {
            let device = open()?;
            let state = device.store.device_state();
            println!("📱 Device");
            println!("   Lock screen secure:  {}", state.lock_screen_secure);
            println!("   Enrolled biometrics: {}", state.enrolled_biometrics);
            println!("   Keys:                {}", device.service.aliases()?.len());
            println!("   Cipher:              {}", device.service.vault().spec().transformation());
            match device.service.availability() {
                Availability::Ready => println!("✅ Ready"),
                Availability::NoHardware => println!("⚠️ No fingerprint hardware detected"),
                Availability::NoSecureLockScreen => {
                    println!("⚠️ Secure lock screen has not been set up (run `init`)")
                }
                Availability::NoEnrolledBiometrics => {
                    println!("⚠️ No fingerprints enrolled (run `enroll`)")
                }
            }
        }

        Commands::List => {
            let device = open()?;
            let aliases = device.service.aliases()?;
            if aliases.is_empty() {
                println!("📭 No keys");
            } else {
                println!("🔑 Keys ({}):", aliases.len());
                for alias in aliases {
                    println!("   {}", alias);
                }
            }
        }

        Commands::Encrypt { alias, secret } => {
            let device = open()?;
            let secret = match secret {
                Some(secret) => secret,
                None => read_line("Secret: ")?,
            };
            let key = KeyAlias::new(alias.as_str());

            let (observer, printer) = start_prompt(&config, auto_match);
            let outcome = device
                .service
                .encrypt_observed(&key, secret.as_bytes(), Some(observer))
                .await;
            finish_prompt(&device.service, &config, auto_match, printer, &outcome).await;
            report(&alias, outcome)?;
        }

        Commands::Decrypt { alias } => {
            let device = open()?;
            let key = KeyAlias::new(alias.as_str());

            let (observer, printer) = start_prompt(&config, auto_match);
            let outcome = device.service.decrypt_observed(&key, Some(observer)).await;
            finish_prompt(&device.service, &config, auto_match, printer, &outcome).await;
            report(&alias, outcome)?;
        }

        Commands::Delete { alias } => {
            let device = open()?;
            if device.service.delete(&KeyAlias::new(alias.as_str()))? {
                println!("🗑️ Deleted {}", alias);
            } else {
                println!("📭 Nothing stored for {}", alias);
            }
        }

        Commands::Enroll => {
            let device = open()?;
            device.store.enroll_biometric()?;
            println!("✅ Fingerprint enrolled; existing keys are now invalidated");
        }

        Commands::Unenroll => {
            let device = open()?;
            device.store.remove_all_biometrics()?;
            println!("🗑️ All fingerprints removed; existing keys are now invalidated");
        }

        Commands::LockScreen { action } => {
            let device = open()?;
            match action {
                LockScreenAction::On => device.store.set_lock_screen_secure(true)?,
                LockScreenAction::Off => device.store.set_lock_screen_secure(false)?,
                LockScreenAction::Reset => device.store.reset_lock_screen()?,
            }
            println!("✅ Lock screen updated");
        }

        Commands::Demo => demo(config.clone()).await?,
    }

    Ok(())
}

/// Subscribe a console renderer to scan events
fn start_prompt(config: &CryptoConfig, auto_match: bool) -> (ScanListener, JoinHandle<()>) {
    if !auto_match {
        println!(
            "👆 {}  [Enter = match, n = no match, d = dirty sensor, q = cancel]",
            config.prompt.title
        );
    }

    let (tx, rx) = unbounded_channel();
    let printer = tokio::spawn(render_prompt(rx, ScanPrompt::new(config.prompt.clone())));
    (tx, printer)
}

async fn finish_prompt(
    service: &BiometricCrypto,
    config: &CryptoConfig,
    auto_match: bool,
    printer: JoinHandle<()>,
    outcome: &CryptoOutcome,
) {
    // Releases the console reader if the scan is still armed
    service.cancel();
    let _ = printer.await;

    let succeeded = matches!(outcome, CryptoOutcome::Encrypted(_) | CryptoOutcome::Decrypted(_));
    if succeeded && !auto_match {
        tokio::time::sleep(Duration::from_millis(config.prompt.success_delay_ms)).await;
    }
}

async fn render_prompt(mut rx: UnboundedReceiver<ScanEvent>, mut prompt: ScanPrompt) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                prompt.apply(&event, Instant::now());
                print_status(&prompt);
            }
            _ = ticker.tick() => {
                if prompt.tick(Instant::now()) {
                    print_status(&prompt);
                }
            }
        }
    }
}

fn print_status(prompt: &ScanPrompt) {
    let icon = match prompt.status().icon {
        PromptIcon::Fingerprint => "👆",
        PromptIcon::Success => "✅",
        PromptIcon::Error => "❌",
    };
    println!("{} {}", icon, prompt.status().text);
}

fn report(alias: &str, outcome: CryptoOutcome) -> anyhow::Result<()> {
    match outcome {
        CryptoOutcome::Encrypted(display) => {
            println!("🔒 Encrypted {}: {}", alias, display);
            Ok(())
        }
        CryptoOutcome::Decrypted(secret) => {
            println!("🔓 {}: {}", alias, String::from_utf8_lossy(secret.expose_secret()));
            Ok(())
        }
        CryptoOutcome::Failure(message) => bail!("operation failed: {}", message),
        CryptoOutcome::KeystoreInvalidated => bail!(
            "key for {} was invalidated by a lock-screen or fingerprint change; encrypt it again",
            alias
        ),
        CryptoOutcome::AuthenticationFailed(message) => {
            bail!("authentication failed: {}", message)
        }
        CryptoOutcome::NoSuchCredential => bail!("nothing stored for {}", alias),
    }
}

fn read_line(prompt: &str) -> anyhow::Result<String> {
    eprint!("{}", prompt);
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

/// Fingerprint sensor driven from stdin
struct ConsoleSensor {
    store: Arc<SoftwareKeyStore>,
    auto_match: bool,
}

impl BiometricSensor for ConsoleSensor {
    fn is_hardware_detected(&self) -> bool {
        true
    }

    fn has_enrolled_biometrics(&self) -> bool {
        self.store.device_state().enrolled_biometrics > 0
    }

    fn authenticate(
        &self,
        crypto: CryptoObject,
        cancel: CancellationSignal,
        callback: SensorCallback,
    ) -> CryptoResult<()> {
        debug!("Console sensor armed for operation {}", crypto.operation_id());

        if self.auto_match {
            callback.on_authentication_succeeded();
            return Ok(());
        }

        let on_cancel = callback.clone();
        cancel.set_on_cancel_listener(move || {
            on_cancel.on_authentication_error(HW_CANCELED_MESSAGE)
        });

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if cancel.is_cancelled() {
                    break;
                }
                let Ok(line) = line else { break };
                match line.trim() {
                    "" => {
                        callback.on_authentication_succeeded();
                        break;
                    }
                    "n" => callback.on_authentication_failed(),
                    "d" => callback.on_authentication_help("Sensor dirty, please clean it"),
                    "q" => {
                        callback.on_authentication_error("Fingerprint operation canceled by user.");
                        break;
                    }
                    other => debug!("Ignoring console input {:?}", other),
                }
            }
        });

        Ok(())
    }
}

async fn demo(config: CryptoConfig) -> anyhow::Result<()> {
    println!("🧪 ALFA BioCrypt demo (in-memory key store, simulated sensor)");

    let store = Arc::new(SoftwareKeyStore::in_memory(DeviceSecurityState::ready()));
    let service = BiometricCrypto::new(
        store.clone(),
        Arc::new(SimulatedSensor::always_match()),
        Arc::new(MemoryCredentialStore::new()),
        config,
    );
    let alias = KeyAlias::new("alice");

    println!("1. Encrypt \"s3cret\" for {}", alias);
    report(alias.as_str(), service.encrypt(&alias, b"s3cret").await)?;

    println!("2. Decrypt after a fingerprint match");
    report(alias.as_str(), service.decrypt(&alias).await)?;

    println!("3. Enroll a new fingerprint and decrypt again");
    store.enroll_biometric()?;
    match service.decrypt(&alias).await {
        CryptoOutcome::KeystoreInvalidated => println!("⚠️ Keystore invalidated, as expected"),
        other => bail!("expected invalidation, got {:?}", other),
    }

    println!("4. Re-encrypt with a fresh key");
    report(alias.as_str(), service.encrypt(&alias, b"s3cret").await)?;
    report(alias.as_str(), service.decrypt(&alias).await)?;

    println!("✅ Demo complete");
    Ok(())
}
