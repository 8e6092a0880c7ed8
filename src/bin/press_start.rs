use centering_guide::transport::DEFAULT_START_KEY;
use centering_guide::{ErrorWrapper, TransportArgs};
use clap::Parser;
use log::info;
use zenoh::prelude::r#async::*;

#[derive(Parser, Debug)]
#[command()]
struct Args {
    #[command(flatten)]
    transport: TransportArgs,

    /// Key the guide waits on.
    #[clap(long, default_value = DEFAULT_START_KEY)]
    start_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = Args::parse();

    let zenoh_session = args.transport.open_session().await?;

    zenoh_session
        .put(args.start_key.clone(), "start")
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?;
    info!("Start sent on {}", args.start_key);
    Ok(())
}
