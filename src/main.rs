/*
 * Responsibility
 * - start the tokio runtime
 * - call app::run() (no logic here)
 */
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    par_idp::app::run().await
}
