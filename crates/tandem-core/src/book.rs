//! Heap-backed priority book for one side of one instrument.
//!
//! The top of a bid book is the highest price, the top of an ask book the
//! lowest; equal prices are served in timestamp order, and an insertion
//! sequence number breaks any remaining tie so FIFO is strict.
//!
//! Dead orders (remaining quantity zero) are not removed when they die.
//! They stay in the heap until a scan reaches them and pops them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::fixed::Price;
use crate::order::{Order, Side};
use crate::pool::{OrderHandle, OrderPool};

/// Heap entry. Only the ordering keys live here; the order itself is in the pool.
#[derive(Clone, Copy, Debug)]
struct Entry {
    /// Price mapped so that "better" is always larger.
    rank: i64,
    timestamp: u64,
    seq: u64,
    handle: OrderHandle,
}

impl Entry {
    #[inline(always)]
    fn rank(side: Side, price: Price) -> i64 {
        match side {
            // For bids: higher price is better
            Side::Buy => i64::from(price.0),
            // For asks: lower price is better
            Side::Sell => -i64::from(price.0),
        }
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// Priority queue of resting orders for one side.
///
/// Has exactly one owner; nothing here is synchronized.
#[derive(Debug)]
pub struct PriorityBook {
    /// Side of the orders this book holds.
    side: Side,
    heap: BinaryHeap<Entry>,
    pool: OrderPool,
    next_seq: u64,
}

impl PriorityBook {
    /// Create an empty book for resting orders of `side`.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            heap: BinaryHeap::new(),
            pool: OrderPool::new(),
            next_seq: 0,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Insert a resting order. Its `timestamp` must already be assigned.
    pub fn push(&mut self, order: Order) -> OrderHandle {
        debug_assert_eq!(order.side, self.side, "Order pushed into wrong book");
        let entry = Entry {
            rank: Entry::rank(self.side, order.price),
            timestamp: order.timestamp,
            seq: self.next_seq,
            handle: OrderHandle(0),
        };
        self.next_seq += 1;
        let handle = self.pool.insert(order);
        self.heap.push(Entry { handle, ..entry });
        handle
    }

    /// Best entry by price/time, dead or alive.
    #[inline]
    pub fn peek_top(&self) -> Option<&Order> {
        self.heap.peek().and_then(|e| self.pool.get(e.handle))
    }

    #[inline]
    pub fn peek_top_mut(&mut self) -> Option<&mut Order> {
        let handle = self.heap.peek()?.handle;
        self.pool.get_mut(handle)
    }

    /// Remove the top entry and release its slot.
    #[inline]
    pub fn pop(&mut self) -> Option<Order> {
        let entry = self.heap.pop()?;
        self.pool.remove(entry.handle)
    }

    /// Mutable access for in-place cancellation. Ordering keys must not change.
    #[inline]
    pub fn get_mut(&mut self, handle: OrderHandle) -> Option<&mut Order> {
        self.pool.get_mut(handle)
    }

    /// Heap entries, including lazily deleted ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of orders with quantity left.
    pub fn live_len(&self) -> usize {
        self.heap
            .iter()
            .filter_map(|e| self.pool.get(e.handle))
            .filter(|o| !o.is_done())
            .count()
    }

    /// Live orders, best first.
    pub fn live_orders(&self) -> Vec<Order> {
        let mut entries: Vec<Entry> = self.heap.iter().copied().collect();
        entries.sort_unstable_by(|a, b| b.cmp(a));
        entries
            .into_iter()
            .filter_map(|e| self.pool.get(e.handle).copied())
            .filter(|o| !o.is_done())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::Quantity;
    use crate::order::{Instrument, OrderId};
    use proptest::prelude::*;

    fn resting(side: Side, id: u32, price: u32, timestamp: u64) -> Order {
        let mut order = Order::new(
            OrderId(id),
            Instrument::new("AAPL").unwrap(),
            side,
            Price(price),
            Quantity(10),
        );
        order.timestamp = timestamp;
        order
    }

    fn drain_ids(book: &mut PriorityBook) -> Vec<u32> {
        let mut ids = Vec::new();
        while let Some(order) = book.pop() {
            ids.push(order.order_id.0);
        }
        ids
    }

    #[test]
    fn test_bid_book_order() {
        let mut book = PriorityBook::new(Side::Buy);
        book.push(resting(Side::Buy, 0, 1, 1));
        book.push(resting(Side::Buy, 1, 2, 1));
        book.push(resting(Side::Buy, 2, 2, 2));

        assert_eq!(drain_ids(&mut book), vec![1, 2, 0]);
    }

    #[test]
    fn test_ask_book_order() {
        let mut book = PriorityBook::new(Side::Sell);
        book.push(resting(Side::Sell, 3, 0, 1));
        book.push(resting(Side::Sell, 5, 2, 2));
        book.push(resting(Side::Sell, 4, 2, 1));

        assert_eq!(drain_ids(&mut book), vec![3, 4, 5]);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let mut book = PriorityBook::new(Side::Sell);
        for id in 0..5 {
            book.push(resting(Side::Sell, id, 50, 7));
        }
        assert_eq!(drain_ids(&mut book), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_mutating_quantity_keeps_position() {
        let mut book = PriorityBook::new(Side::Sell);
        let h = book.push(resting(Side::Sell, 1, 10, 1));
        book.push(resting(Side::Sell, 2, 11, 2));

        if let Some(top) = book.peek_top_mut() {
            top.remaining = Quantity(100);
        }
        assert_eq!(book.peek_top().map(|o| o.order_id), Some(OrderId(1)));

        if let Some(order) = book.get_mut(h) {
            order.remaining = Quantity::ZERO;
        }
        // Dead order stays physically present until popped
        assert_eq!(book.len(), 2);
        assert_eq!(book.live_len(), 1);
        assert_eq!(book.peek_top().map(|o| o.is_done()), Some(true));
    }

    #[test]
    fn test_live_orders_best_first() {
        let mut book = PriorityBook::new(Side::Buy);
        book.push(resting(Side::Buy, 1, 90, 1));
        let dead = book.push(resting(Side::Buy, 2, 120, 2));
        book.push(resting(Side::Buy, 3, 100, 3));
        if let Some(order) = book.get_mut(dead) {
            order.remaining = Quantity::ZERO;
        }

        let ids: Vec<u32> = book.live_orders().iter().map(|o| o.order_id.0).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    proptest! {
        #[test]
        fn prop_pop_order_is_price_then_time(
            entries in prop::collection::vec((0u32..50, 0u64..20), 1..200),
            bids in any::<bool>(),
        ) {
            let side = if bids { Side::Buy } else { Side::Sell };
            let mut book = PriorityBook::new(side);
            for (i, (price, ts)) in entries.iter().enumerate() {
                book.push(resting(side, i as u32, *price, *ts));
            }

            let mut popped = Vec::new();
            while let Some(order) = book.pop() {
                popped.push(order);
            }
            prop_assert_eq!(popped.len(), entries.len());

            for pair in popped.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.price == b.price {
                    prop_assert!(
                        a.timestamp < b.timestamp
                            || (a.timestamp == b.timestamp && a.order_id.0 < b.order_id.0)
                    );
                } else if bids {
                    prop_assert!(a.price > b.price);
                } else {
                    prop_assert!(a.price < b.price);
                }
            }
        }
    }
}
