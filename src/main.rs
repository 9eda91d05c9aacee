#[tokio::main]
async fn main() -> anyhow::Result<()> {
    deal_job_sync::run().await
}
