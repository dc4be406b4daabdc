use std::collections::VecDeque;

use fixedbitset::FixedBitSet;

/// FIFO of nodes waiting to be visited; a node is queued at most once at a time.
#[derive(Debug)]
pub(crate) struct VertexQueue {
    queue: VecDeque<u32>,
    queued: FixedBitSet, // Membership bit of every node currently in `queue`.
}

impl VertexQueue {
    /// Queue holding `order`, which must list distinct nodes below `node_count`.
    pub(crate) fn with_order(node_count: usize, order: &[u32]) -> VertexQueue {
        let mut queued = FixedBitSet::with_capacity(node_count);
        for &node in order {
            queued.insert(node as usize);
        }
        VertexQueue {
            queue: order.iter().copied().collect(),
            queued,
        }
    }

    /// Enqueue `node` unless it is already waiting. Returns whether it was added.
    pub(crate) fn push(&mut self, node: u32) -> bool {
        if self.queued.put(node as usize) {
            return false;
        }
        self.queue.push_back(node);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<u32> {
        let node = self.queue.pop_front()?;
        self.queued.set(node as usize, false);
        Some(node)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
