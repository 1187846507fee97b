//! An in-memory [`BlockSource`] that yields a scripted sequence of blocks,
//! for driving scheduler tests without a real chain client.

use async_trait::async_trait;
use parking_lot::Mutex;
use tkms_node::ports::{Block, BlockSource};

/// Replays a fixed, scripted sequence of blocks, one per [`BlockSource::next_block`]
/// call. Exhausting the script makes every subsequent call return an error,
/// so a test driving a finite scenario notices if it asks for more blocks
/// than it scripted.
pub struct ScriptedBlockSource {
    remaining: Mutex<std::collections::VecDeque<Block>>,
}

impl ScriptedBlockSource {
    /// Builds a source from a literal block-number sequence, synthesising a
    /// timestamp of `number` seconds and a hash of `blake3(number)` for
    /// each one.
    pub fn from_numbers(numbers: impl IntoIterator<Item = u64>) -> Self {
        let blocks = numbers
            .into_iter()
            .map(|number| Block {
                number,
                timestamp: number as i64,
                hash: *blake3::hash(&number.to_be_bytes()).as_bytes(),
            })
            .collect();
        Self {
            remaining: Mutex::new(blocks),
        }
    }
}

#[async_trait]
impl BlockSource for ScriptedBlockSource {
    async fn next_block(&self) -> eyre::Result<Block> {
        self.remaining
            .lock()
            .pop_front()
            .ok_or_else(|| eyre::eyre!("scripted block source exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_blocks_in_order_then_errors() {
        let source = ScriptedBlockSource::from_numbers([5, 10, 15]);
        assert_eq!(source.next_block().await.unwrap().number, 5);
        assert_eq!(source.next_block().await.unwrap().number, 10);
        assert_eq!(source.next_block().await.unwrap().number, 15);
        assert!(source.next_block().await.is_err());
    }
}
