use alloy_primitives::B256;

/// A single observed (number, hash) pair on the chain.
///
/// Immutable once recorded for a given number unless a reorg replaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// Block number.
    pub number: u64,
    /// Block hash at that number.
    pub hash: B256,
}

impl BlockKey {
    /// Creates a new block key.
    pub const fn new(number: u64, hash: B256) -> Self {
        Self { number, hash }
    }
}

impl std::fmt::Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.number, self.hash)
    }
}

/// A window of recently observed blocks, strictly descending by number.
///
/// Produced fresh on every new head; subscribers must always trust the latest
/// snapshot they received, since intermediate snapshots may be dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHistory(Vec<BlockKey>);

impl BlockHistory {
    /// Creates a history from blocks already sorted in descending order.
    pub fn new(blocks: Vec<BlockKey>) -> Self {
        debug_assert!(
            blocks.windows(2).all(|w| w[0].number > w[1].number),
            "block history must be strictly descending"
        );
        Self(blocks)
    }

    /// The most recent block in the window, if any.
    pub fn latest(&self) -> Option<BlockKey> {
        self.0.first().copied()
    }

    /// Number of blocks in the window.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The blocks in descending order.
    pub fn as_slice(&self) -> &[BlockKey] {
        &self.0
    }
}

impl IntoIterator for BlockHistory {
    type Item = BlockKey;
    type IntoIter = std::vec::IntoIter<BlockKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A new chain head notification together with its bounded parent chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainHead {
    /// The head block itself.
    pub block: BlockKey,
    /// Ancestors in descending order, starting at `block.number - 1`.
    ///
    /// The chain is bounded: deep reorgs beyond the broadcast depth are not
    /// visible through a single notification.
    pub parents: Vec<BlockKey>,
}

impl ChainHead {
    /// The head and its ancestors in descending order.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockKey> {
        std::iter::once(&self.block).chain(self.parents.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_latest_is_first() {
        let history = BlockHistory::new(vec![
            BlockKey::new(5, B256::with_last_byte(5)),
            BlockKey::new(4, B256::with_last_byte(4)),
        ]);
        assert_eq!(history.latest(), Some(BlockKey::new(5, B256::with_last_byte(5))));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn empty_history_has_no_latest() {
        assert_eq!(BlockHistory::default().latest(), None);
        assert!(BlockHistory::default().is_empty());
    }

    #[test]
    fn chain_head_blocks_walk_head_first() {
        let head = ChainHead {
            block: BlockKey::new(10, B256::with_last_byte(10)),
            parents: vec![
                BlockKey::new(9, B256::with_last_byte(9)),
                BlockKey::new(8, B256::with_last_byte(8)),
            ],
        };
        let numbers: Vec<_> = head.blocks().map(|b| b.number).collect();
        assert_eq!(numbers, vec![10, 9, 8]);
    }
}
