//! Input reaching the engine between epochs.
//!
//! Keyboard handlers and other producers push [`ControlCommand`]s onto a
//! bounded crossfire queue from any thread. The render loop latches the queue
//! once per epoch boundary into an [`EpochBatch`], which drops input that
//! cannot change the outcome before the engine sees it: only the last scene
//! switch survives, and repeated presses of one cell collapse to one press
//! (a cell pressed again in the same epoch is already inside its pressure
//! delay and cannot spark twice).

use crossfire::mpmc;
use crossfire::{MAsyncTx, MRx, TryRecvError, TrySendError, detect_backoff_cfg};
use luminary_core::{ControlCommand, Engine, apply_control_command};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Commands queued beyond this are dropped rather than stalling input.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

pub type CommandSender = MAsyncTx<ControlCommand>;
pub type CommandReceiver = MRx<ControlCommand>;
/// Latches pending input and applies it; called only between epochs.
pub type CommandDrain = Arc<dyn Fn(&mut Engine) -> BatchStats + Send + Sync>;
/// Queues a command without blocking; `false` when it was dropped.
pub type CommandSubmit = Arc<dyn Fn(ControlCommand) -> bool + Send + Sync>;

/// What one epoch boundary did with the queued input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub applied: usize,
    pub coalesced: usize,
}

/// Input latched at one epoch boundary, in arrival order after coalescing.
#[derive(Debug, Default)]
pub struct EpochBatch {
    commands: Vec<ControlCommand>,
    coalesced: usize,
}

impl EpochBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything currently queued on `receiver`.
    pub fn latch(receiver: &CommandReceiver) -> Self {
        let mut batch = Self::new();
        loop {
            match receiver.try_recv() {
                Ok(command) => batch.push(command),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        batch
    }

    pub fn push(&mut self, command: ControlCommand) {
        match &command {
            ControlCommand::SetScene(_) => {
                if let Some(slot) = self
                    .commands
                    .iter()
                    .position(|queued| matches!(queued, ControlCommand::SetScene(_)))
                {
                    self.commands.remove(slot);
                    self.coalesced += 1;
                }
            }
            ControlCommand::Press { xy } => {
                let repeat = self.commands.iter().any(
                    |queued| matches!(queued, ControlCommand::Press { xy: held } if held == xy),
                );
                if repeat {
                    self.coalesced += 1;
                    return;
                }
            }
            _ => {}
        }
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[ControlCommand] {
        &self.commands
    }

    pub fn apply(self, engine: &mut Engine) -> BatchStats {
        let stats = BatchStats {
            applied: self.commands.len(),
            coalesced: self.coalesced,
        };
        for command in self.commands {
            apply_control_command(engine, command);
        }
        if stats.applied > 0 || stats.coalesced > 0 {
            debug!(
                epoch = engine.epoch(),
                applied = stats.applied,
                coalesced = stats.coalesced,
                "latched input batch"
            );
        }
        stats
    }
}

/// Bounded multi-producer queue feeding the epoch-boundary drain.
pub struct CommandBus {
    sender: CommandSender,
    receiver: CommandReceiver,
}

impl CommandBus {
    pub fn bounded(capacity: usize) -> Self {
        detect_backoff_cfg();
        let (sender, receiver) = mpmc::bounded_tx_async_rx_blocking(capacity.max(1));
        Self { sender, receiver }
    }

    /// Split into the renderer-facing drain and the producer-facing submit.
    pub fn split(self) -> (CommandDrain, CommandSubmit) {
        let receiver = Arc::new(self.receiver);
        let drain: CommandDrain =
            Arc::new(move |engine: &mut Engine| EpochBatch::latch(&receiver).apply(engine));

        let sender = Arc::new(self.sender);
        let submit: CommandSubmit = Arc::new(move |command: ControlCommand| {
            match sender.try_send(command) {
                Ok(()) => true,
                Err(TrySendError::Full(dropped)) => {
                    warn!(command = ?dropped, "input queue full; dropping");
                    false
                }
                Err(TrySendError::Disconnected(dropped)) => {
                    warn!(command = ?dropped, "input queue closed");
                    false
                }
            }
        });
        (drain, submit)
    }
}

pub fn command_bus(capacity: usize) -> (CommandDrain, CommandSubmit) {
    CommandBus::bounded(capacity).split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use luminary_core::{DiscardSink, LuminaryConfig, Scene};

    fn engine() -> Engine {
        let config = LuminaryConfig {
            rng_seed: Some(1),
            initialization_epochs: 0,
            ambient_press_odds: Some(0),
            ..LuminaryConfig::default()
        };
        Engine::new(config).expect("engine")
    }

    #[test]
    fn submitted_commands_wait_for_the_drain() {
        let (drain, submit) = command_bus(4);
        let mut engine = engine();
        assert!(submit(ControlCommand::SetScene(Scene::Q2)));
        assert_eq!(engine.scene(), Scene::Base);
        let stats = drain(&mut engine);
        assert_eq!(engine.scene(), Scene::Q2);
        assert_eq!(
            stats,
            BatchStats {
                applied: 1,
                coalesced: 0
            }
        );
        assert_eq!(drain(&mut engine), BatchStats::default());
    }

    #[test]
    fn last_scene_switch_wins() {
        let mut batch = EpochBatch::new();
        batch.push(ControlCommand::SetScene(Scene::Q2));
        batch.push(ControlCommand::ChangeColor);
        batch.push(ControlCommand::SetScene(Scene::CirclingRainbows));
        assert_eq!(
            batch.commands(),
            &[
                ControlCommand::ChangeColor,
                ControlCommand::SetScene(Scene::CirclingRainbows)
            ]
        );

        let mut engine = engine();
        let stats = batch.apply(&mut engine);
        assert_eq!(engine.scene(), Scene::CirclingRainbows);
        assert_eq!(stats.coalesced, 1);
    }

    #[test]
    fn color_shifts_are_never_merged() {
        let mut batch = EpochBatch::new();
        for _ in 0..3 {
            batch.push(ControlCommand::ChangeColor);
        }
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn repeated_presses_match_a_single_press() {
        let mut single = engine();
        let mut repeated = engine();
        let xy = single.petal_source(0);
        let other = single.petal_source(1);

        let mut batch = EpochBatch::new();
        for target in [xy, xy, other, xy] {
            batch.push(ControlCommand::Press { xy: target });
        }
        assert_eq!(batch.len(), 2);
        let stats = batch.apply(&mut repeated);
        assert_eq!(stats.coalesced, 2);

        // Unbatched, the extra presses land inside the pressure delay.
        for target in [xy, xy, other, xy] {
            apply_control_command(&mut single, ControlCommand::Press { xy: target });
        }

        single.run_epoch(&mut DiscardSink);
        repeated.run_epoch(&mut DiscardSink);
        assert_eq!(single.sparks().current(), repeated.sparks().current());
        assert_eq!(single.pressure_self(), repeated.pressure_self());
        assert_eq!(repeated.pressure_self()[xy], repeated.pressure_self()[other]);
        assert!(repeated.pressure_self()[xy] > 0);
    }

    #[test]
    fn full_queue_drops_commands() {
        let (drain, submit) = command_bus(2);
        let accepted = (0..64)
            .take_while(|_| submit(ControlCommand::ChangeColor))
            .count();
        assert!((2..64).contains(&accepted), "accepted {accepted}");
        assert!(!submit(ControlCommand::SetScene(Scene::Q2)));
        let mut engine = engine();
        let stats = drain(&mut engine);
        assert_eq!(engine.scene(), Scene::Base);
        assert_eq!(stats.applied, accepted);
    }
}
