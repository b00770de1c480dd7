//! Slot storage for resting orders.
//!
//! Heap entries refer to orders by handle so a cancel can zero an order's
//! quantity in place without touching the heap. Freed slots are reused
//! through a LIFO free list; the pool grows when the free list is empty.

use crate::order::Order;

/// Index into the order pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OrderHandle(pub u32);

impl OrderHandle {
    /// Get raw index.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Growable pool of orders.
#[derive(Debug, Default)]
pub struct OrderPool {
    slots: Vec<Option<Order>>,
    /// LIFO free list for O(1) alloc/dealloc.
    free_list: Vec<u32>,
}

impl OrderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an order and return its handle.
    #[inline]
    pub fn insert(&mut self, order: Order) -> OrderHandle {
        match self.free_list.pop() {
            Some(idx) => {
                debug_assert!(self.slots[idx as usize].is_none(), "Free slot occupied");
                self.slots[idx as usize] = Some(order);
                OrderHandle(idx)
            }
            None => {
                debug_assert!(self.slots.len() < u32::MAX as usize, "Order pool overflow");
                let idx = self.slots.len() as u32;
                self.slots.push(Some(order));
                OrderHandle(idx)
            }
        }
    }

    /// Release a slot, returning the order it held.
    #[inline]
    pub fn remove(&mut self, handle: OrderHandle) -> Option<Order> {
        let order = self.slots.get_mut(handle.index())?.take()?;
        self.free_list.push(handle.0);
        Some(order)
    }

    #[inline(always)]
    pub fn get(&self, handle: OrderHandle) -> Option<&Order> {
        self.slots.get(handle.index()).and_then(Option::as_ref)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, handle: OrderHandle) -> Option<&mut Order> {
        self.slots.get_mut(handle.index()).and_then(Option::as_mut)
    }

    /// Number of occupied slots.
    #[inline(always)]
    pub fn active(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Number of slots ever allocated.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.active() == 0
    }
}
