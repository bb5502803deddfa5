use lawpipe::{commands, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("lawpipe-embed");
    let config = config::init_config()?;
    commands::embed(config).await
}
