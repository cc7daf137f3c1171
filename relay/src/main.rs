#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vehicle_relay::host::run().await
}
