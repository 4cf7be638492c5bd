//! Broadcast channels over which the import pipeline announces its effects: imported blocks,
//! finality updates and light-client payloads.

use slog::{trace, Logger};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::{error::SendError, Receiver, Sender};
use types::{Checkpoint, EthSpec, Hash256, SignedBeaconBlock, Slot};

const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockEvent {
    pub slot: Slot,
    pub block_root: Hash256,
    /// Whether the block's execution payload is still awaiting an engine verdict.
    pub execution_optimistic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedCheckpointEvent {
    pub checkpoint: Checkpoint,
    pub state_root: Hash256,
}

/// The best header the light-client protocol can currently serve optimistically.
#[derive(Debug, Clone, PartialEq)]
pub struct LightClientOptimisticUpdateEvent {
    pub slot: Slot,
    pub block_root: Hash256,
}

/// The latest finalized header the light-client protocol can serve.
#[derive(Debug, Clone, PartialEq)]
pub struct LightClientFinalityUpdateEvent {
    pub slot: Slot,
    pub block_root: Hash256,
}

pub struct EventHandler<E: EthSpec> {
    block_tx: Sender<Arc<BlockEvent>>,
    finalized_tx: Sender<Arc<FinalizedCheckpointEvent>>,
    light_client_optimistic_tx: Sender<Arc<LightClientOptimisticUpdateEvent>>,
    light_client_finality_tx: Sender<Arc<LightClientFinalityUpdateEvent>>,
    log: Logger,
    _phantom: std::marker::PhantomData<E>,
}

impl<E: EthSpec> EventHandler<E> {
    pub fn new(log: Logger) -> Self {
        Self::with_capacity(log, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(log: Logger, capacity: usize) -> Self {
        let (block_tx, _) = broadcast::channel(capacity);
        let (finalized_tx, _) = broadcast::channel(capacity);
        let (light_client_optimistic_tx, _) = broadcast::channel(capacity);
        let (light_client_finality_tx, _) = broadcast::channel(capacity);
        Self {
            block_tx,
            finalized_tx,
            light_client_optimistic_tx,
            light_client_finality_tx,
            log,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn register_block(&self, block: &SignedBeaconBlock<E>, block_root: Hash256, execution_optimistic: bool) {
        self.emit(
            &self.block_tx,
            Arc::new(BlockEvent {
                slot: block.slot(),
                block_root,
                execution_optimistic,
            }),
            "block",
        );
    }

    pub fn register_finalized_checkpoint(&self, checkpoint: Checkpoint, state_root: Hash256) {
        self.emit(
            &self.finalized_tx,
            Arc::new(FinalizedCheckpointEvent {
                checkpoint,
                state_root,
            }),
            "finalized_checkpoint",
        );
    }

    pub fn register_light_client_optimistic_update(&self, slot: Slot, block_root: Hash256) {
        self.emit(
            &self.light_client_optimistic_tx,
            Arc::new(LightClientOptimisticUpdateEvent { slot, block_root }),
            "light_client_optimistic_update",
        );
    }

    pub fn register_light_client_finality_update(&self, slot: Slot, block_root: Hash256) {
        self.emit(
            &self.light_client_finality_tx,
            Arc::new(LightClientFinalityUpdateEvent { slot, block_root }),
            "light_client_finality_update",
        );
    }

    pub fn subscribe_block(&self) -> Receiver<Arc<BlockEvent>> {
        self.block_tx.subscribe()
    }

    pub fn subscribe_finalized(&self) -> Receiver<Arc<FinalizedCheckpointEvent>> {
        self.finalized_tx.subscribe()
    }

    pub fn subscribe_light_client_optimistic(
        &self,
    ) -> Receiver<Arc<LightClientOptimisticUpdateEvent>> {
        self.light_client_optimistic_tx.subscribe()
    }

    pub fn subscribe_light_client_finality(
        &self,
    ) -> Receiver<Arc<LightClientFinalityUpdateEvent>> {
        self.light_client_finality_tx.subscribe()
    }

    fn emit<T>(&self, sender: &Sender<Arc<T>>, event: Arc<T>, name: &str) {
        // A send only fails when there are no subscribers, which is not an error.
        if let Err(SendError(_)) = sender.send(event) {
            trace!(self.log, "No subscribers for event"; "event" => name);
        }
    }
}
