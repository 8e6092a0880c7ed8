use std::time::Duration;

use centering_guide::detector::DEFAULT_CASCADE_PATH;
use centering_guide::pool::DEFAULT_DETECTOR_WORKERS;
use centering_guide::transport::{DEFAULT_FEED_KEY, DEFAULT_INSTRUCTION_KEY, DEFAULT_START_KEY};
use centering_guide::{
    CascadeModel, CenteringGuide, DetectionOptions, GuideConfig, SurfaceKeys, TransportArgs,
    ZenohSurface,
};
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[command()]
struct Args {
    #[command(flatten)]
    transport: TransportArgs,

    /// Key the JPEG feed is published on.
    #[clap(long, default_value = DEFAULT_FEED_KEY)]
    feed_key: String,

    /// Key instructions are published on.
    #[clap(long, default_value = DEFAULT_INSTRUCTION_KEY)]
    instruction_key: String,

    /// Key that starts guiding when anything is put on it.
    #[clap(long, default_value = DEFAULT_START_KEY)]
    start_key: String,

    /// Start guiding right away instead of waiting on the start key.
    #[clap(long)]
    auto_start: bool,

    /// Haar cascade, resolved through the OpenCV data search path.
    #[clap(long, default_value = DEFAULT_CASCADE_PATH)]
    model_path: String,

    /// Milliseconds between detection ticks.
    #[clap(long, default_value_t = 500)]
    interval_ms: u64,

    /// Dead zone half-width around the frame center in pixels.
    #[clap(long, default_value_t = 30.0)]
    tolerance: f64,

    #[clap(long, default_value_t = 1.1)]
    scale_factor: f64,

    #[clap(long, default_value_t = 2)]
    min_neighbors: i32,

    /// Smallest face side in pixels.
    #[clap(long, default_value_t = 30)]
    min_face_size: i32,

    /// Detections allowed to overlap, each with its own classifier.
    #[clap(long, default_value_t = DEFAULT_DETECTOR_WORKERS)]
    detector_workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = Args::parse();

    let zenoh_session = args.transport.open_session().await?;
    let keys = SurfaceKeys {
        feed: args.feed_key,
        instruction: args.instruction_key,
        start: args.start_key,
    };
    let surface = ZenohSurface::open(zenoh_session, keys, args.auto_start).await?;

    let config = GuideConfig {
        model_path: args.model_path,
        tick_interval: Duration::from_millis(args.interval_ms),
        tolerance: args.tolerance,
        detection: DetectionOptions {
            scale_factor: args.scale_factor,
            min_neighbors: args.min_neighbors,
            min_face_size: args.min_face_size,
        },
    };
    let guide = CenteringGuide::new(surface, config);
    let model = CascadeModel {
        workers: args.detector_workers,
    };

    let polling = match guide.run(&model).await {
        Ok(polling) => polling,
        Err(err) => {
            error!("Guide failed to start: {:#}", err);
            return Err(err);
        }
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    polling.stop().await;
    Ok(())
}
