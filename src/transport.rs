use std::sync::Arc;

use clap::Args;
use log::info;
use thiserror::Error;
use zenoh::prelude::r#async::*;

pub const DEFAULT_FEED_KEY: &str = "centering-guide/feed";
pub const DEFAULT_INSTRUCTION_KEY: &str = "centering-guide/instruction";
pub const DEFAULT_START_KEY: &str = "centering-guide/start";

#[derive(Error, Debug)]
pub enum ErrorWrapper {
    #[error("Zenoh error {0:?}")]
    ZenohError(#[from] zenoh::Error),
}

#[derive(Args, Debug, Clone, Default)]
pub struct TransportArgs {
    /// Endpoints to connect to.
    #[clap(short = 'e', long)]
    pub connect: Vec<zenoh_config::EndPoint>,

    /// Endpoints to listen on.
    #[clap(long)]
    pub listen: Vec<zenoh_config::EndPoint>,
}

impl TransportArgs {
    pub fn zenoh_config(&self) -> Config {
        let mut zenoh_config = Config::default();
        if !self.listen.is_empty() {
            zenoh_config.listen.endpoints = self.listen.clone();
            info!(
                "Configured listening endpoints {:?}",
                zenoh_config.listen.endpoints
            );
        }
        if !self.connect.is_empty() {
            zenoh_config.connect.endpoints = self.connect.clone();
            info!(
                "Configured connect endpoints {:?}",
                zenoh_config.connect.endpoints
            );
        }
        zenoh_config
    }

    pub async fn open_session(&self) -> anyhow::Result<Arc<Session>> {
        let zenoh_session = zenoh::open(self.zenoh_config())
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
        Ok(zenoh_session.into_arc())
    }
}
