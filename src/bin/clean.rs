use lawpipe::{commands, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("lawpipe-clean");
    let config = config::init_config()?;
    commands::clean(config).await
}
