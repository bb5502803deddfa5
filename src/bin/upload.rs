use lawpipe::{commands, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("lawpipe-upload");
    let config = config::init_config()?;
    commands::upload(config).await
}
