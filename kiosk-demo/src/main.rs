//! kiosk-demo: drives the kiosk flows from a terminal.
//!
//! Frames come from a directory of JPEG stills standing in for the webcam;
//! requests go to the configured verification service.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use veridface_kiosk::{
    capture::MediaCaptureAdapter,
    config::{KioskConfig, DEFAULT_VENUES},
    data_structures::RegistrationProfile,
    directory::{DirectoryClient, UserPager},
    liveness::{LivenessEvent, LivenessSequencer},
    session::{PresentationState, RegistrationWizard, SessionPresenter},
    simulation::StillFrameCamera,
    verification::{HttpBackend, VerificationSubmitter},
};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "kiosk-demo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; defaults apply to missing keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured service URL
    #[arg(long)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the check-in screen until Ctrl-C
    Checkin {
        /// Directory of JPEG stills used as the camera
        #[arg(long)]
        frames: PathBuf,

        /// Venue sent with each scan
        #[arg(long)]
        venue: Option<String>,
    },

    /// Register a new user from the command line
    Register {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
    },

    /// List registered users, one page at a time
    Users {
        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: usize,
    },

    /// Show one user and their activity log
    User { id: String },

    /// Attendance summary for a venue
    Dashboard {
        #[arg(long)]
        event: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<KioskConfig, BoxError> {
    let mut config = match &cli.config {
        Some(path) => KioskConfig::from_json_file(path)?,
        None => KioskConfig::default(),
    };
    if let Some(url) = &cli.backend {
        config.backend_base_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

fn init_logging(config: &KioskConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_checkin(config: KioskConfig, frames: PathBuf) -> Result<(), BoxError> {
    let http = HttpBackend::new(&config)?;
    let capture = MediaCaptureAdapter::from_config(Arc::new(StillFrameCamera::new(frames)), &config).into_shared();
    let (presenter, handle) = SessionPresenter::new(&config, capture, VerificationSubmitter::new(Arc::new(http)));
    let task = tokio::spawn(presenter.run());

    let mut states = handle.subscribe();
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                match state {
                    PresentationState::Scanning => println!("Scanning..."),
                    PresentationState::AccessGranted { subject_id, confidence } => {
                        println!("Access granted: {} ({})", subject_id, confidence)
                    }
                    PresentationState::NotRecognized { .. } => {
                        println!("Not recognised. Enter your ID manually or scan your QR code.")
                    }
                    PresentationState::NotDetected { reason, .. } => println!("Face not detected: {}", reason),
                    PresentationState::CameraDenied { message } => println!("{}", message),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("[Demo] Interrupted");
                handle.shutdown();
                break;
            }
        }
    }
    task.await?;
    Ok(())
}

async fn run_register(config: KioskConfig, frames: PathBuf, profile: RegistrationProfile) -> Result<(), BoxError> {
    let http = HttpBackend::new(&config)?;
    let capture = MediaCaptureAdapter::from_config(Arc::new(StillFrameCamera::new(frames)), &config).into_shared();
    let mut wizard = RegistrationWizard::new(
        capture,
        LivenessSequencer::from_config(&config),
        VerificationSubmitter::new(Arc::new(http)),
    );

    wizard.submit_personal_info(profile)?;
    wizard.give_consent()?;
    wizard.start_camera().await?;

    let mut events = wizard.begin_liveness().await?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LivenessEvent::Countdown(0) => {}
                LivenessEvent::Countdown(n) => println!("{}...", n),
                LivenessEvent::BlinkPrompt => println!("Blink now"),
                LivenessEvent::FrameCaptured { .. } => {}
                LivenessEvent::Done { .. } => println!("Face captured"),
            }
        }
    });
    wizard.await_liveness().await?;
    printer.await?;
    wizard.confirm_capture()?;

    wizard.submit().await?;
    match wizard.digital_id() {
        Some(id) => println!("Registration complete. Digital ID: {}", id),
        None => println!("{}", wizard.last_error().unwrap_or("Registration failed")),
    }
    Ok(())
}

async fn run(cli: Cli, config: KioskConfig) -> Result<(), BoxError> {
    match cli.command {
        Commands::Checkin { frames, venue } => {
            let config = KioskConfig { venue: venue.unwrap_or(config.venue.clone()), ..config };
            run_checkin(config, frames).await
        }
        Commands::Register { frames, name, email, phone } => {
            run_register(config, frames, RegistrationProfile::new(name, email, phone)).await
        }
        Commands::Users { page } => {
            let users = DirectoryClient::new(HttpBackend::new(&config)?).list_users().await?;
            let mut pager = UserPager::new(users.len());
            for _ in 1..page {
                pager.next();
            }
            for user in pager.page(&users) {
                println!("{:<20} {:<28} {:<12} {}", user.name, user.email, user.digital_id, user.event);
            }
            let window = pager.window();
            println!("{}-{} of {}", (window.start + 1).min(window.end), window.end, users.len());
            Ok(())
        }
        Commands::User { id } => {
            match DirectoryClient::new(HttpBackend::new(&config)?).get_user(&id).await? {
                Some(user) => {
                    println!("{} <{}> {} [{}]", user.name, user.email, user.phone_number, user.digital_id);
                    println!("Registered for {} at {}", user.event, user.registered_at.to_rfc3339());
                    for entry in &user.activity_log {
                        println!("  {} {}", entry.date, entry.title);
                    }
                }
                None => println!("No user with id {}", id),
            }
            Ok(())
        }
        Commands::Dashboard { event } => {
            let event = event.unwrap_or_else(|| DEFAULT_VENUES[0].to_string());
            let summary = DirectoryClient::new(HttpBackend::new(&config)?).dashboard(&event).await?;
            println!(
                "{}: attendance {}, absence {}, late {}, users {}",
                event,
                summary.total_attendance_today,
                summary.total_absence_today,
                summary.total_late_today,
                summary.total_users
            );
            for row in &summary.hourly_heatmap {
                let hours: Vec<String> = row.hourly.iter().map(|c| c.to_string()).collect();
                println!("  {} {}", row.date, hours.join(" "));
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kiosk-demo: {}", e);
            std::process::exit(2);
        }
    };
    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("[Demo] Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(cli, config)) {
        error!("[Demo] {}", e);
        std::process::exit(1);
    }
}
