//! Einstieg der geruestplan-Kommandozeile

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

// .env beim Start laden
fn load_env() {
    // Zuerst im Arbeitsverzeichnis suchen, dann neben dem Binary
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

use geruestplan::cli::{self, Commands};

/// Gerüstausmass nach NPK 114 aus Gebäudegrundrissen berechnen
#[derive(Parser)]
#[command(name = "geruestplan")]
#[command(author, version)]
#[command(about = "Gerüstausmass nach NPK 114 aus Gebäudegrundrissen berechnen")]
#[command(
    long_about = "Berechnet das Fassadengerüst-Ausmass nach NPK 114 aus Gebäudegrundrissen.\n\n'berechnen' arbeitet ohne Datenbank, 'analysieren' führt die volle Pipeline mit GWR-Daten, Höhenauflösung und Zonenzerlegung aus."
)]
struct Cli {
    /// Verbosität erhöhen (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Nur Warnungen und Fehler ausgeben
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env vor allem anderen laden
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Berechnen {
            path,
            egid,
            length,
            width,
            traufhoehe,
            firsthoehe,
            roof,
            width_class,
            system,
            config,
            output,
        } => {
            cli::cmd_berechnen(
                path.as_deref(),
                egid,
                length,
                width,
                traufhoehe,
                firsthoehe,
                &roof,
                &width_class,
                system.as_deref(),
                &config,
                output.as_deref(),
            )?;
        }
        Commands::Analysieren {
            path,
            egid,
            at,
            all,
            address,
            gwr,
            heights,
            width_class,
            height,
            traufhoehe,
            firsthoehe,
            system,
            config,
            refresh,
            jobs,
            store,
            schema,
            output,
            host,
            database,
            user,
            password,
            port,
            ssl,
        } => {
            cli::cmd_analysieren(
                &path,
                &egid,
                at,
                all,
                address,
                gwr.as_deref(),
                heights.as_deref(),
                &width_class,
                height,
                traufhoehe,
                firsthoehe,
                system,
                &config,
                refresh,
                jobs,
                store,
                &schema,
                output.as_deref(),
                host,
                database,
                user,
                password,
                port,
                ssl,
            )
            .await?;
        }
        Commands::Kontext {
            egid,
            delete,
            schema,
            host,
            database,
            user,
            password,
            port,
            ssl,
        } => {
            cli::cmd_kontext(egid, delete, &schema, host, database, user, password, port, ssl)
                .await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
