#[tokio::main]
async fn main() -> anyhow::Result<()> {
    realcheck_lib::run().await
}
