use clap::{Parser, Subcommand};
use lawpipe::{commands, config, logging};

#[derive(Parser)]
#[command(
    name = "lawpipe",
    version,
    about = "Resumable legal-document ingestion pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Extract text from raw PDFs, with OCR for scanned pages.
    Extract,
    /// Clean extracted text with its source profile.
    Clean,
    /// Adopt or build chunk files for cleaned text.
    Chunk,
    /// Create empty chunk placeholders for external annotators.
    ScaffoldChunks,
    /// Append embeddings for chunked documents to the embedding log.
    Embed,
    /// Push pending embeddings to Qdrant and MongoDB.
    Upload,
    /// Remove registry records sharing a raw path.
    Dedupe,
    /// Show per-stage eligibility without changing anything.
    Status,
}

impl Command {
    fn component(self) -> &'static str {
        match self {
            Command::Extract => "lawpipe-extract",
            Command::Clean => "lawpipe-clean",
            Command::Chunk | Command::ScaffoldChunks => "lawpipe-chunk",
            Command::Embed => "lawpipe-embed",
            Command::Upload => "lawpipe-upload",
            Command::Dedupe => "lawpipe-dedupe",
            Command::Status => "lawpipe",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.command.component());
    let config = config::init_config()?;

    match cli.command {
        Command::Extract => commands::extract(config).await,
        Command::Clean => commands::clean(config).await,
        Command::Chunk => commands::chunk(config).await,
        Command::ScaffoldChunks => commands::scaffold_chunks(config).await,
        Command::Embed => commands::embed(config).await,
        Command::Upload => commands::upload(config).await,
        Command::Dedupe => commands::dedupe(config).await,
        Command::Status => commands::status(config).await,
    }
}
