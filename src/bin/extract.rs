use lawpipe::{commands, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("lawpipe-extract");
    let config = config::init_config()?;
    commands::extract(config).await
}
