use lawpipe::{commands, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("lawpipe-dedupe");
    let config = config::init_config()?;
    commands::dedupe(config).await
}
