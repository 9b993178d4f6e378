mod session_sweeper;

use async_trait::async_trait;

/// Long running task started next to the web host.
#[async_trait]
pub trait BackgroundService: Send + Sync {
    async fn run(&self);
}

pub mod prelude {
    #[rustfmt::skip]
    pub use super::{
        session_sweeper::SessionSweeper,
        BackgroundService,
    };
}
