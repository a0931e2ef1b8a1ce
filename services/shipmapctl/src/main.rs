use std::path::PathBuf;

use admin_ipc::{send_request, AdminRequest, DEFAULT_SOCKET_PATH};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use filters::{load_map_rows, MapFilter, MapSummary, Selection};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "ADMIN_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Status,
    Pause,
    Resume,
    /// Ask the daemon for an export now.
    Refresh,
    /// Apply map filters to exported tables and print the result.
    Map(MapArgs),
}

#[derive(Args, Debug)]
struct MapArgs {
    #[arg(long, default_value = "output/imo_tracking.csv")]
    imo_tracking: PathBuf,

    #[arg(long, default_value = "output/yy_ship_count.csv")]
    yy_ship_count: PathBuf,

    #[arg(long)]
    imo: Option<String>,

    #[arg(long = "source-region")]
    source_regions: Vec<String>,

    #[arg(long = "source-subregion")]
    source_subregions: Vec<String>,

    #[arg(long = "source-port")]
    source_ports: Vec<String>,

    #[arg(long = "dest-region")]
    dest_regions: Vec<String>,

    #[arg(long = "dest-subregion")]
    dest_subregions: Vec<String>,

    #[arg(long = "dest-port")]
    dest_ports: Vec<String>,

    /// Year-ago idle flags to keep (0 or 1).
    #[arg(long = "yy-idle")]
    idle_statuses: Vec<i64>,

    /// Year-ago empty/full flags to keep (0 full, 1 empty).
    #[arg(long = "empty-full")]
    empty_full_statuses: Vec<i64>,

    #[arg(long)]
    max_full_draft: Option<f64>,

    #[arg(long)]
    max_idle_days: Option<u32>,

    /// Track length drawn behind each vessel, in hours.
    #[arg(long, default_value_t = 72.0)]
    track_hours: f64,
}

impl MapArgs {
    fn filter(&self) -> MapFilter {
        MapFilter {
            imo_search: self.imo.clone(),
            source_regions: Selection::parse(&self.source_regions),
            source_subregions: Selection::parse(&self.source_subregions),
            source_ports: Selection::parse(&self.source_ports),
            dest_regions: Selection::parse(&self.dest_regions),
            dest_subregions: Selection::parse(&self.dest_subregions),
            dest_ports: Selection::parse(&self.dest_ports),
            idle_statuses: self.idle_statuses.clone(),
            empty_full_statuses: self.empty_full_statuses.clone(),
            max_full_draft: self.max_full_draft,
            max_idle_days: self.max_idle_days,
        }
    }
}

fn map(args: &MapArgs) -> Result<MapSummary> {
    let rows = load_map_rows(&args.imo_tracking, &args.yy_ship_count)?;
    Ok(MapSummary::build(&rows, &args.filter(), args.track_hours))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let req = match cli.command {
        Command::Status => AdminRequest::Status,
        Command::Pause => AdminRequest::Pause,
        Command::Resume => AdminRequest::Resume,
        Command::Refresh => AdminRequest::Refresh,
        Command::Map(args) => {
            let summary = map(&args)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
    };

    let resp = send_request(&cli.socket, &req).await?;
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}
