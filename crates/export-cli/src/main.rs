//! markets-export CLI - write allocation CSV or market JSON for a recorded session

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use markets_core::ConfigStore;
use markets_output::{find_generator, SessionExport};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Per-trade allocations of every player
    Csv,
    /// Players and trades of every group
    Json,
}

impl Format {
    fn generator_name(self) -> &'static str {
        match self {
            Format::Csv => "allocation_csv",
            Format::Json => "json",
        }
    }
}

#[derive(Parser)]
#[command(name = "markets-export")]
#[command(about = "Export data from recorded double-auction sessions")]
struct Cli {
    /// Directory holding the session config files
    #[arg(long, value_name = "DIR")]
    config_dir: PathBuf,

    /// Recorded session JSON
    #[arg(long, value_name = "FILE")]
    session: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "csv")]
    format: Format,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Load configs and the session, then write the requested format.
fn export(cli: &Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = ConfigStore::load_dir(&cli.config_dir)
        .with_context(|| format!("loading configs from {}", cli.config_dir.display()))?;
    info!("Loaded {} session configs", store.names().count());

    let text = fs::read_to_string(&cli.session)
        .with_context(|| format!("reading {}", cli.session.display()))?;
    let session = SessionExport::from_json_str(&text)
        .with_context(|| format!("parsing {}", cli.session.display()))?;
    info!(
        "Session '{}': {} rounds recorded",
        session.config_name,
        session.subsessions.len()
    );

    let generator = find_generator(&store, cli.format.generator_name())
        .context("no generator for the requested format")?;
    generator
        .write(&session, out)
        .with_context(|| format!("writing {}", generator.name()))?;
    out.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            export(&cli, &mut BufWriter::new(file))?;
            info!("Wrote {}", path.display());
        }
        None => export(&cli, &mut io::stdout().lock())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "num_rounds": 1,
        "x_endowment": [5, 10],
        "y_endowment": [200, 100]
    }"#;

    const SESSION: &str = r#"{
        "config_name": "demo",
        "subsessions": [{
            "round_number": 1,
            "groups": [{
                "id_in_subsession": 1,
                "start_time": "2023-11-14T22:13:20Z",
                "players": [
                    {"pcode": "p1", "id_in_group": 1},
                    {"pcode": "p2", "id_in_group": 2}
                ],
                "trades": [{
                    "id": 1,
                    "timestamp": "2023-11-14T22:13:23Z",
                    "making_orders": [{
                        "id": 1, "pcode": "p2", "is_bid": false, "price": 20, "volume": 0,
                        "traded_volume": 2, "status": "FILLED",
                        "timestamp": "2023-11-14T22:13:21Z"
                    }],
                    "taking_order": {
                        "id": 2, "pcode": "p1", "is_bid": true, "price": 20, "volume": 0,
                        "traded_volume": 2, "status": "FILLED",
                        "timestamp": "2023-11-14T22:13:23Z"
                    }
                }]
            }]
        }]
    }"#;

    fn make_inputs(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("markets-export-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("configs")).unwrap();
        fs::write(dir.join("configs").join("demo.json"), CONFIG).unwrap();
        fs::write(dir.join("session.json"), SESSION).unwrap();
        dir
    }

    fn make_cli(dir: &std::path::Path, format: &str) -> Cli {
        let config_dir = dir.join("configs");
        let session = dir.join("session.json");
        Cli::try_parse_from([
            "markets-export",
            "--config-dir",
            config_dir.to_str().unwrap(),
            "--session",
            session.to_str().unwrap(),
            "--format",
            format,
        ])
        .unwrap()
    }

    #[test]
    fn test_export_csv() {
        let dir = make_inputs("csv");
        let mut buf: Vec<u8> = Vec::new();

        export(&make_cli(&dir, "csv"), &mut buf).unwrap();

        let csv = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "round_number,group_id,timestamp,p1x,p1y,p2x,p2y",
                "1,1,0,10,100,5,200",
                "1,1,3.0,12,60,3,240",
            ]
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export_json() {
        let dir = make_inputs("json");
        let mut buf: Vec<u8> = Vec::new();

        export(&make_cli(&dir, "json"), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\"elapsed_secs\": 3.0"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_session_file_is_error() {
        let dir = make_inputs("missing");
        fs::remove_file(dir.join("session.json")).unwrap();

        let err = export(&make_cli(&dir, "csv"), &mut Vec::<u8>::new()).unwrap_err();

        assert!(err.to_string().starts_with("reading"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from([
            "markets-export",
            "--config-dir",
            "c",
            "--session",
            "s",
            "--format",
            "xml",
        ])
        .is_err());
    }
}
