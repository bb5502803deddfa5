use lawpipe::{commands, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("lawpipe-chunk");
    let config = config::init_config()?;
    commands::chunk(config).await
}
