#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tasktimer_lib::run().await
}
