use std::time::Duration;

use centering_guide::transport::DEFAULT_FEED_KEY;
use centering_guide::{encode_jpeg, CameraSource, ErrorWrapper, TransportArgs};
use clap::Parser;
use log::{info, warn};
use zenoh::prelude::r#async::*;

#[derive(Parser, Debug)]
#[command()]
struct Args {
    #[command(flatten)]
    transport: TransportArgs,

    /// Camera device index.
    #[clap(short, long, default_value_t = 0)]
    camera: i32,

    /// Key the JPEG feed is published on.
    #[clap(long, default_value = DEFAULT_FEED_KEY)]
    feed_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = Args::parse();

    let zenoh_session = args.transport.open_session().await?;

    let publisher = zenoh_session
        .declare_publisher(args.feed_key.clone())
        .congestion_control(CongestionControl::Drop)
        .priority(Priority::InteractiveHigh)
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?;

    let mut camera_source = CameraSource::new(args.camera)?;
    info!("Publishing camera {} on {}", args.camera, args.feed_key);

    loop {
        let Some(frame) = camera_source.next_frame()? else {
            warn!("Empty frame from camera {}", args.camera);
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        };

        let data = encode_jpeg(&frame)?;

        publisher
            .put(data)
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
    }
}
