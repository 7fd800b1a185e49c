//! Shared application plumbing for the luminary display drivers.

use std::sync::{Arc, Mutex};

use luminary_core::Engine;

pub type SharedEngine = Arc<Mutex<Engine>>;

pub mod command;
pub mod terminal;

pub mod renderer {
    use anyhow::Result;

    use crate::{CommandDrain, CommandSubmit, SharedEngine};

    /// Shared context passed to renderer implementations.
    pub struct RendererContext {
        pub engine: SharedEngine,
        pub command_drain: CommandDrain,
        pub command_submit: CommandSubmit,
    }

    pub trait Renderer {
        /// Stable identifier describing the renderer implementation (e.g., "terminal").
        fn name(&self) -> &'static str;

        /// Launch the renderer; blocks until the rendering session completes.
        fn run(&self, ctx: RendererContext) -> Result<()>;
    }
}

pub use command::{
    BatchStats, CommandBus, CommandDrain, CommandReceiver, CommandSender, CommandSubmit,
    EpochBatch, command_bus,
};
pub use luminary_core::ControlCommand;
