use sqlyard_server::SqlyardServer;

#[derive(clap::Parser)]
struct Args {
    #[arg(long, default_value = "config/sqlyard.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    SqlyardServer::new().with_config(&args.config).run().await
}
