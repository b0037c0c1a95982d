#[tokio::main]
async fn main() -> anyhow::Result<()> {
    notesync_agent::run().await
}
