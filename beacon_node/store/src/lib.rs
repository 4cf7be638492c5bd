//! Storage for the beacon node's consensus data.
//!
//! Provides the `KeyValueStore` abstraction over an on-disk database, the in-memory
//! `MemoryStore` backend, and the typed `BeaconStore` wrapper which lays out blocks, states and
//! sidecars in their respective columns.

mod errors;
mod memory_store;
mod metadata;

pub use errors::Error;
pub use memory_store::MemoryStore;
pub use metadata::{AnchorInfo, BackfilledRange};

use parking_lot::RwLock;
use ssz::{Decode, Encode};
use std::sync::Arc;
use types::{
    BlobSidecarList, ChainSpec, DataColumnSidecarList, EthSpec, Hash256, SignedBeaconBlock, Slot,
};

/// The number of bytes in a database key: an 8-byte slot prefix plus a 32-byte root.
pub const SLOT_ROOT_KEY_LEN: usize = 40;

/// A column in the database, analogous to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DBColumn {
    BeaconBlock,
    BeaconState,
    BlobSidecars,
    DataColumnSidecars,
    /// Single-row metadata records (anchor, backfill progress, fork choice).
    BeaconMeta,
}

impl DBColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            DBColumn::BeaconBlock => "blk",
            DBColumn::BeaconState => "ste",
            DBColumn::BlobSidecars => "blb",
            DBColumn::DataColumnSidecars => "dcs",
            DBColumn::BeaconMeta => "bma",
        }
    }
}

/// A single database operation, used to batch writes atomically.
#[derive(Debug, Clone)]
pub enum KeyValueStoreOp {
    PutKeyValue(DBColumn, Vec<u8>, Vec<u8>),
    DeleteKey(DBColumn, Vec<u8>),
}

/// The on-disk database abstraction consumed by the typed store.
///
/// Implementations must make `do_atomically` all-or-nothing so that persistence is idempotent
/// across restarts.
pub trait KeyValueStore: Sync + Send + 'static {
    /// Retrieve some bytes in `column` with `key`.
    fn get_bytes(&self, column: DBColumn, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Store some `value` in `column`, indexed with `key`.
    fn put_bytes(&self, column: DBColumn, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Return `true` if `key` exists in `column`.
    fn key_exists(&self, column: DBColumn, key: &[u8]) -> Result<bool, Error>;

    /// Removes `key` from `column`.
    fn key_delete(&self, column: DBColumn, key: &[u8]) -> Result<(), Error>;

    /// Execute either all of the operations in `batch` or none at all.
    fn do_atomically(&self, batch: Vec<KeyValueStoreOp>) -> Result<(), Error>;

    /// Iterate over all keys in `column`, in lexicographic key order.
    fn iter_column_keys(&self, column: DBColumn) -> Vec<Vec<u8>>;
}

/// Build the `slot:root` key used for the block and sidecar columns.
///
/// The big-endian slot prefix keeps keys sorted by slot, making range iteration cheap.
pub fn slot_root_key(slot: Slot, root: &Hash256) -> Vec<u8> {
    let mut key = Vec::with_capacity(SLOT_ROOT_KEY_LEN);
    key.extend_from_slice(&slot.as_u64().to_be_bytes());
    key.extend_from_slice(root.as_slice());
    key
}

/// The typed store, wrapping a `KeyValueStore` backend with the beacon layout:
///
/// - block archive keyed by `slot:root`,
/// - state archive keyed by slot,
/// - blob and data-column sidecar archives keyed by `slot:root`,
/// - an anchor record and backfilled-range records in the metadata column.
pub struct BeaconStore<E: EthSpec, KV: KeyValueStore> {
    db: KV,
    /// A copy of the `ChainSpec`, required for decoding fork-versioned containers.
    spec: Arc<ChainSpec>,
    /// Cached copy of the anchor record, so reads don't hit the database.
    anchor_info: RwLock<Option<AnchorInfo>>,
    _phantom: std::marker::PhantomData<E>,
}

impl<E: EthSpec, KV: KeyValueStore> BeaconStore<E, KV> {
    pub fn open(db: KV, spec: Arc<ChainSpec>) -> Result<Self, Error> {
        let store = Self {
            db,
            spec,
            anchor_info: RwLock::new(None),
            _phantom: std::marker::PhantomData,
        };
        *store.anchor_info.write() = store.load_anchor_info()?;
        Ok(store)
    }

    /*
     * Blocks.
     */

    /// Store a block. Writing the same block twice is a no-op.
    pub fn put_block(
        &self,
        block_root: &Hash256,
        block: &SignedBeaconBlock<E>,
    ) -> Result<(), Error> {
        let key = slot_root_key(block.slot(), block_root);
        self.db
            .put_bytes(DBColumn::BeaconBlock, &key, &block.as_ssz_bytes())
    }

    pub fn get_block(
        &self,
        slot: Slot,
        block_root: &Hash256,
    ) -> Result<Option<SignedBeaconBlock<E>>, Error> {
        let key = slot_root_key(slot, block_root);
        self.db
            .get_bytes(DBColumn::BeaconBlock, &key)?
            .map(|bytes| {
                SignedBeaconBlock::from_ssz_bytes(&bytes, &self.spec).map_err(Error::SszDecodeError)
            })
            .transpose()
    }

    pub fn block_exists(&self, slot: Slot, block_root: &Hash256) -> Result<bool, Error> {
        self.db
            .key_exists(DBColumn::BeaconBlock, &slot_root_key(slot, block_root))
    }

    /*
     * States.
     */

    pub fn put_state(
        &self,
        slot: Slot,
        state: &types::BeaconState<E>,
    ) -> Result<(), Error> {
        self.db.put_bytes(
            DBColumn::BeaconState,
            &slot.as_u64().to_be_bytes(),
            &state.as_ssz_bytes(),
        )
    }

    pub fn get_state(&self, slot: Slot) -> Result<Option<types::BeaconState<E>>, Error> {
        self.db
            .get_bytes(DBColumn::BeaconState, &slot.as_u64().to_be_bytes())?
            .map(|bytes| {
                types::BeaconState::from_ssz_bytes(&bytes, &self.spec)
                    .map_err(Error::SszDecodeError)
            })
            .transpose()
    }

    /*
     * Sidecars.
     */

    pub fn put_blobs(
        &self,
        block_root: &Hash256,
        blobs: &BlobSidecarList<E>,
    ) -> Result<(), Error> {
        let Some(first) = blobs.first() else {
            return Ok(());
        };
        let key = slot_root_key(first.slot(), block_root);
        let ssz_blobs: Vec<_> = blobs.iter().map(|blob| (**blob).clone()).collect();
        self.db
            .put_bytes(DBColumn::BlobSidecars, &key, &ssz_blobs.as_ssz_bytes())
    }

    pub fn get_blobs(
        &self,
        slot: Slot,
        block_root: &Hash256,
    ) -> Result<Option<BlobSidecarList<E>>, Error> {
        let key = slot_root_key(slot, block_root);
        self.db
            .get_bytes(DBColumn::BlobSidecars, &key)?
            .map(|bytes| {
                Vec::<types::BlobSidecar<E>>::from_ssz_bytes(&bytes)
                    .map(|blobs| blobs.into_iter().map(Arc::new).collect())
                    .map_err(Error::SszDecodeError)
            })
            .transpose()
    }

    pub fn put_data_columns(
        &self,
        block_root: &Hash256,
        data_columns: &DataColumnSidecarList<E>,
    ) -> Result<(), Error> {
        let Some(first) = data_columns.first() else {
            return Ok(());
        };
        let key = slot_root_key(first.slot(), block_root);
        let ssz_columns: Vec<_> = data_columns.iter().map(|c| (**c).clone()).collect();
        self.db
            .put_bytes(DBColumn::DataColumnSidecars, &key, &ssz_columns.as_ssz_bytes())
    }

    pub fn get_data_columns(
        &self,
        slot: Slot,
        block_root: &Hash256,
    ) -> Result<Option<DataColumnSidecarList<E>>, Error> {
        let key = slot_root_key(slot, block_root);
        self.db
            .get_bytes(DBColumn::DataColumnSidecars, &key)?
            .map(|bytes| {
                Vec::<types::DataColumnSidecar<E>>::from_ssz_bytes(&bytes)
                    .map(|columns| columns.into_iter().map(Arc::new).collect())
                    .map_err(Error::SszDecodeError)
            })
            .transpose()
    }

    /*
     * Metadata.
     */

    const ANCHOR_INFO_KEY: &'static [u8] = b"anchor_info";
    const BACKFILLED_RANGES_KEY: &'static [u8] = b"backfilled_ranges";

    /// The current anchor record, if the node was started from a checkpoint.
    pub fn get_anchor_info(&self) -> Option<AnchorInfo> {
        self.anchor_info.read().clone()
    }

    pub fn put_anchor_info(&self, anchor: AnchorInfo) -> Result<(), Error> {
        self.db.put_bytes(
            DBColumn::BeaconMeta,
            Self::ANCHOR_INFO_KEY,
            &anchor.as_ssz_bytes(),
        )?;
        *self.anchor_info.write() = Some(anchor);
        Ok(())
    }

    fn load_anchor_info(&self) -> Result<Option<AnchorInfo>, Error> {
        self.db
            .get_bytes(DBColumn::BeaconMeta, Self::ANCHOR_INFO_KEY)?
            .map(|bytes| AnchorInfo::from_ssz_bytes(&bytes).map_err(Error::SszDecodeError))
            .transpose()
    }

    /// Records of `finalized_slot -> anchor_slot` segments that backfill has completed.
    pub fn get_backfilled_ranges(&self) -> Result<Vec<BackfilledRange>, Error> {
        self.db
            .get_bytes(DBColumn::BeaconMeta, Self::BACKFILLED_RANGES_KEY)?
            .map(|bytes| {
                Vec::<BackfilledRange>::from_ssz_bytes(&bytes).map_err(Error::SszDecodeError)
            })
            .transpose()
            .map(|maybe| maybe.unwrap_or_default())
    }

    pub fn put_backfilled_ranges(&self, ranges: &[BackfilledRange]) -> Result<(), Error> {
        self.db.put_bytes(
            DBColumn::BeaconMeta,
            Self::BACKFILLED_RANGES_KEY,
            &ranges.to_vec().as_ssz_bytes(),
        )
    }

    /// Atomically persist a block along with its resolved sidecars.
    pub fn put_block_and_sidecars(
        &self,
        block_root: &Hash256,
        block: &SignedBeaconBlock<E>,
        blobs: Option<&BlobSidecarList<E>>,
        data_columns: Option<&DataColumnSidecarList<E>>,
    ) -> Result<(), Error> {
        let key = slot_root_key(block.slot(), block_root);
        let mut batch = vec![KeyValueStoreOp::PutKeyValue(
            DBColumn::BeaconBlock,
            key.clone(),
            block.as_ssz_bytes(),
        )];

        if let Some(blobs) = blobs.filter(|blobs| !blobs.is_empty()) {
            let ssz_blobs: Vec<_> = blobs.iter().map(|blob| (**blob).clone()).collect();
            batch.push(KeyValueStoreOp::PutKeyValue(
                DBColumn::BlobSidecars,
                key.clone(),
                ssz_blobs.as_ssz_bytes(),
            ));
        }
        if let Some(columns) = data_columns.filter(|columns| !columns.is_empty()) {
            let ssz_columns: Vec<_> = columns.iter().map(|c| (**c).clone()).collect();
            batch.push(KeyValueStoreOp::PutKeyValue(
                DBColumn::DataColumnSidecars,
                key,
                ssz_columns.as_ssz_bytes(),
            ));
        }

        self.db.do_atomically(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{FixedBytesExtended, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn test_store() -> BeaconStore<E, MemoryStore> {
        BeaconStore::open(MemoryStore::default(), Arc::new(ChainSpec::mainnet())).unwrap()
    }

    #[test]
    fn anchor_info_round_trip() {
        let store = test_store();
        assert_eq!(store.get_anchor_info(), None);

        let anchor = AnchorInfo {
            anchor_slot: Slot::new(96),
            oldest_block_slot: Slot::new(96),
            oldest_block_parent: Hash256::repeat_byte(1),
            state_upper_limit: Slot::new(128),
        };
        store.put_anchor_info(anchor.clone()).unwrap();
        assert_eq!(store.get_anchor_info(), Some(anchor));
    }

    #[test]
    fn backfilled_ranges_default_empty() {
        let store = test_store();
        assert!(store.get_backfilled_ranges().unwrap().is_empty());

        let ranges = vec![BackfilledRange {
            finalized_slot: Slot::new(64),
            anchor_slot: Slot::new(0),
        }];
        store.put_backfilled_ranges(&ranges).unwrap();
        assert_eq!(store.get_backfilled_ranges().unwrap(), ranges);
    }

    #[test]
    fn slot_root_keys_sort_by_slot() {
        let low = slot_root_key(Slot::new(1), &Hash256::repeat_byte(0xff));
        let high = slot_root_key(Slot::new(256), &Hash256::repeat_byte(0x00));
        assert!(low < high);
        assert_eq!(low.len(), SLOT_ROOT_KEY_LEN);
    }
}
