use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cxxgraph_cli::main_entry().await
}
