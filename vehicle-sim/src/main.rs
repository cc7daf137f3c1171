mod host;
mod model;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
