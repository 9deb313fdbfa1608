use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ledgerfile::{LedgerFile, OpenOptions};

#[derive(Parser)]
#[command(name = "lfctl", version = "0.1.0", about = "Diagnostic CLI for ledgerfile stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a chunk read from stdin or a literal string
    Append {
        file: PathBuf,
        /// Payload to append; reads stdin if omitted
        data: Option<String>,
        /// Embed an MD5 signature with the chunk
        #[arg(long)]
        md5: bool,
    },
    /// Read back a chunk at a given file position
    Read {
        file: PathBuf,
        position: u64,
    },
    /// Write a header checkpoint
    WriteHeader {
        file: PathBuf,
        payload: String,
    },
    /// Recover the most recent header by backward scan
    ReadHeader {
        file: PathBuf,
    },
    /// Print basic file info (size, block count)
    Info {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Append { file, data, md5 } => {
            let payload = match data {
                Some(s) => s.into_bytes(),
                None => {
                    use std::io::Read;
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let lf = LedgerFile::open(&file, OpenOptions::new().create(true)).await?;
            let position = lf.append(payload, md5).await?;
            println!("appended at position {position}");
        }

        Commands::Read { file, position } => {
            let lf = LedgerFile::open(&file, OpenOptions::new().read_only(true)).await?;
            let payload = lf.pread(position).await?;
            println!("{} bytes:", payload.len());
            println!("{}", String::from_utf8_lossy(&payload));
        }

        Commands::WriteHeader { file, payload } => {
            let lf = LedgerFile::open(&file, OpenOptions::new().create(true)).await?;
            let position = lf.write_header(payload.into_bytes()).await?;
            println!("header written at position {position}");
        }

        Commands::ReadHeader { file } => {
            let lf = LedgerFile::open(&file, OpenOptions::new().read_only(true)).await?;
            let payload = lf.read_header().await?;
            println!("{}", String::from_utf8_lossy(&payload));
        }

        Commands::Info { file } => {
            let lf = LedgerFile::open(&file, OpenOptions::new().read_only(true)).await?;
            let size = lf.bytes().await?;
            println!("── ledgerfile ───────────────────────────────");
            println!("  Path    {}", file.display());
            println!("  Size    {} B", size);
            println!("  Blocks  {}", size.div_ceil(ledgerfile::block::BLOCK_SIZE));
        }
    }

    Ok(())
}
