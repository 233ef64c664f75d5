//! icytap CLI — tap an internet radio stream and print its ICY metadata

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use crossbeam_channel::Receiver;

use icytap::config::icy::COPY_CHUNK_SIZE;
use icytap::stream::{self, ChannelListener, IcyHeaders, MetadataRecord};

#[derive(Parser)]
#[command(
    name = "icytap",
    about = "Print now-playing metadata from an internet radio stream",
    version
)]
struct Cli {
    /// Stream URL to tap
    url: String,

    /// Write the audio (metadata removed) to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many audio bytes
    #[arg(long)]
    max_bytes: Option<u64>,

    /// Print each metadata record as one JSON object per line
    #[arg(long)]
    json: bool,

    /// Metadata text encoding (utf-8, iso-8859-1, us-ascii)
    #[arg(long)]
    encoding: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    eprintln!("Connecting to {}...", cli.url);
    let (listener, metadata_rx) = ChannelListener::channel();
    let mut station = match stream::open(&cli.url, listener, cli.encoding.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    print_station(station.headers(), station.format_hint());
    if !station.has_metadata() {
        eprintln!("Station sends no ICY metadata");
    }

    let mut sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::sink()),
    };

    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let want = match cli.max_bytes {
            Some(max) => max.saturating_sub(total).min(buf.len() as u64) as usize,
            None => buf.len(),
        };
        if want == 0 {
            break;
        }

        let n = match station.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("Stream error: {}", e);
                break;
            }
        };
        sink.write_all(&buf[..n])?;
        total += n as u64;

        print_pending(&metadata_rx, cli.json)?;
    }
    sink.flush()?;
    print_pending(&metadata_rx, cli.json)?;

    log::info!("done: {} audio bytes from {}", total, station.url());
    eprintln!(
        "{} audio bytes, {} metadata updates",
        total,
        station.frames_decoded()
    );
    Ok(())
}

fn print_station(headers: &IcyHeaders, format_hint: Option<&str>) {
    if let Some(name) = &headers.station_name {
        eprintln!("Station: {}", name);
    }
    if let Some(genre) = &headers.genre {
        eprintln!("Genre:   {}", genre);
    }
    if let Some(url) = &headers.station_url {
        eprintln!("URL:     {}", url);
    }
    match (format_hint, headers.bitrate) {
        (Some(fmt), Some(br)) => eprintln!("Format:  {} @ {} kbps", fmt, br),
        (Some(fmt), None) => eprintln!("Format:  {}", fmt),
        (None, Some(br)) => eprintln!("Bitrate: {} kbps", br),
        (None, None) => {}
    }
}

fn print_pending(
    rx: &Receiver<MetadataRecord>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in rx.try_iter() {
        if json {
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
            continue;
        }
        match record.now_playing() {
            Some(np) if np.title.is_some() || np.artist.is_some() => {
                writeln!(out, "Now playing: {}", np)?
            }
            _ => {
                let mut pairs: Vec<_> = record.iter().collect();
                pairs.sort();
                for (k, v) in pairs {
                    writeln!(out, "{}={}", k, v)?;
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}
