//! devstrap - developer machine bootstrapper
//!
//! Checks the host against the compatibility matrix, installs GnuPG and a
//! login shell through the native package manager, and reports status.

use anyhow::Result;
use clap::{Parser, Subcommand};
use devstrap::compatibility::{self, CompatibilityConfig, PrerequisiteStatus, SystemDetector};
use devstrap::{
    cancellation, run_installer, BootstrapOptions, CompatibilityFailure, DisplayMode, GpgInstaller,
    Host, InstallProgress, PackageManager, PackageManagerKind, ShellChanger, ShellInstaller,
    SystemInfo, ToolInstaller,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Developer machine bootstrapper
#[derive(Parser)]
#[command(name = "devstrap")]
#[command(version)]
#[command(about = "Bootstrap a developer machine on Linux or macOS", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Stream package manager output instead of showing spinners
    #[arg(long, global = true)]
    verbose_output: bool,

    /// Path to a TOML options file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check this machine against the compatibility matrix
    Check,
    /// Install GnuPG and the configured login shell
    Install {
        /// Skip making the shell the login shell
        #[arg(long)]
        no_default_shell: bool,
    },
    /// Show package manager and GnuPG status
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            if let Some(suggestion) = suggestion(&e) {
                eprintln!("hint: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

fn suggestion(error: &anyhow::Error) -> Option<String> {
    if let Some(e) = error.downcast_ref::<devstrap::Error>() {
        return e.fix_suggestion();
    }
    error
        .downcast_ref::<CompatibilityFailure>()
        .and_then(|f| f.error.fix_suggestion())
}

async fn run(cli: Cli) -> Result<()> {
    let mut options = match &cli.config {
        Some(path) => BootstrapOptions::load(path)?,
        None => BootstrapOptions::default(),
    };
    if cli.verbose_output {
        options.display_mode = DisplayMode::Verbose;
    }
    debug!(?options, "loaded options");

    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping running commands");
            handle.cancel();
        }
    });
    let host = Host::system(Some(signal), Some(options.termination_grace()));

    match cli.command {
        Commands::Check => {
            check(&host, &options).await?;
        }
        Commands::Install { no_default_shell } => {
            if no_default_shell {
                options.set_default_shell = false;
            }
            install(&host, &options).await?;
        }
        Commands::Status => status(&host, &options).await?,
    }
    Ok(())
}

async fn check(host: &Host, options: &BootstrapOptions) -> Result<SystemInfo> {
    let config = CompatibilityConfig::load(&options.compatibility_source())?;
    let result = compatibility::check(
        Some(&config),
        &host.detector(),
        &host.prerequisite_checker(),
    )
    .await;

    match result {
        Ok(info) => {
            print_system(&info);
            println!("✓ {} is supported", describe(&info));
            Ok(info)
        }
        Err(failure) => {
            print_system(&failure.system_info);
            Err(failure.into())
        }
    }
}

async fn install(host: &Host, options: &BootstrapOptions) -> Result<()> {
    let info = check(host, options).await?;
    let kind = PackageManagerKind::for_system(&info).ok_or_else(|| {
        anyhow::anyhow!("no supported package manager for {}", describe(&info))
    })?;
    let packages = host.package_manager(kind, options.display_mode);
    println!("Using {}", kind.display_name());

    if options.install_gpg {
        let gpg = GpgInstaller::for_backend(host.programs(), kind);
        install_tool(&gpg, &packages, options.display_mode).await?;
    }

    let shell = ShellInstaller::new(&options.shell, host.programs());
    install_tool(&shell, &packages, options.display_mode).await?;

    if options.set_default_shell {
        let mut changer = ShellChanger::new(&options.shell, host.os(), host.fs());
        if kind == PackageManagerKind::Brew {
            if let Some(prefix) = host.brew_prefix() {
                changer = changer.with_brew_prefix(prefix);
            }
        }
        changer.set_as_default().await?;
        println!("✓ {} is the login shell", options.shell);
    }
    Ok(())
}

async fn install_tool(
    installer: &dyn ToolInstaller,
    packages: &dyn PackageManager,
    mode: DisplayMode,
) -> Result<()> {
    let name = installer.name().to_string();
    match mode {
        DisplayMode::Progress => {
            let spinner = create_spinner(format!("{}: starting", name))?;
            let bar = spinner.clone();
            let result = run_installer(installer, packages, move |p: InstallProgress| {
                bar.set_message(format!("{}: {}", name, p.description()));
            })
            .await;
            spinner.finish_and_clear();
            result?;
        }
        DisplayMode::Verbose => {
            run_installer(installer, packages, move |p: InstallProgress| {
                println!("==> {}: {}", name, p.description());
            })
            .await?;
        }
    }
    println!("✓ {} ready", installer.name());
    Ok(())
}

fn create_spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

async fn status(host: &Host, options: &BootstrapOptions) -> Result<()> {
    let detected = host.detector().detect_system().await?;
    let info = SystemInfo::from(detected);
    println!("System:      {}", describe(&info));

    match PackageManagerKind::for_system(&info) {
        Some(kind) => {
            let packages = host.package_manager(kind, options.display_mode);
            match packages.info().await {
                Ok(pm) => println!("Backend:     {} {}", pm.name, pm.version),
                Err(e) => println!("Backend:     {} (unavailable: {})", kind.display_name(), e),
            }
        }
        None => println!("Backend:     none"),
    }

    let gpg = host.gpg_client();
    match gpg.secret_key_ids().await {
        Ok(ids) if ids.is_empty() => println!("GPG keys:    none"),
        Ok(ids) => println!("GPG keys:    {}", ids.join(", ")),
        Err(e) => println!("GPG keys:    unavailable ({})", e),
    }
    println!(
        "GPG tty:     {}",
        gpg.tty().unwrap_or_else(|| "not found".to_string())
    );
    Ok(())
}

fn describe(info: &SystemInfo) -> String {
    let mut text = info.os_name.clone();
    if !info.distro_name.is_empty() && info.distro_name != info.os_name {
        text.push(' ');
        text.push_str(&info.distro_name);
    }
    if let Some(version) = &info.distro_version {
        text.push(' ');
        text.push_str(version);
    }
    if !info.arch.is_empty() {
        text.push_str(&format!(" ({})", info.arch));
    }
    text
}

fn print_system(info: &SystemInfo) {
    println!("System: {}", describe(info));
    print_prerequisites(&info.prerequisites);
}

fn print_prerequisites(status: &PrerequisiteStatus) {
    if status.details.is_empty() {
        return;
    }
    let width = status.details.keys().map(String::len).max().unwrap_or(0);
    println!();
    for detail in status.details.values() {
        let mark = if detail.available { "✓" } else { "✗" };
        println!("  {} {:width$}  {}", mark, detail.name, detail.description, width = width);
        if !detail.available && !detail.install_hint.is_empty() {
            println!("    {:width$}  {}", "", detail.install_hint, width = width);
        }
    }
    println!();
}
