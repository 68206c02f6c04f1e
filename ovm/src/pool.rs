use log::error;

use crate::{ObjRef, Payload};

#[derive(Debug, Default)]
pub struct Slot {
    pub ref_cnt: u32,
    pub payload: Payload,
}

#[derive(Debug, Copy, Clone)]
struct Link {
    prev: u32,
    next: u32,
}

const ALLOCATED: usize = 0;
const FREE: usize = 1;

/// Fixed-capacity object arena.
///
/// Every slot sits on exactly one of two circular doubly-linked lists,
/// threaded through `links` by index. The two list heads are sentinel
/// links stored after the last slot.
pub struct Pool {
    slots: Box<[Slot]>,
    links: Box<[Link]>,
    used: usize,
}

impl Pool {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity < u32::MAX as usize - 2, "pool capacity too large");
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        let links = (0..capacity + 2)
            .map(|i| {
                let i = i as u32;
                Link { prev: i, next: i }
            })
            .collect();
        let mut pool = Self {
            slots,
            links,
            used: 0,
        };
        for i in 0..capacity {
            pool.link_last(i, FREE);
        }
        pool
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity() - self.used
    }

    fn head(&self, list: usize) -> usize {
        self.slots.len() + list
    }

    fn unlink(&mut self, i: usize) {
        let Link { prev, next } = self.links[i];
        self.links[prev as usize].next = next;
        self.links[next as usize].prev = prev;
        self.links[i] = Link {
            prev: i as u32,
            next: i as u32,
        };
    }

    fn link_last(&mut self, i: usize, list: usize) {
        let head = self.head(list);
        let last = self.links[head].prev;
        self.links[i] = Link {
            prev: last,
            next: head as u32,
        };
        self.links[last as usize].next = i as u32;
        self.links[head].prev = i as u32;
    }

    /// Takes the first free slot, gives it count 1 and the payload.
    ///
    /// # Panics
    /// When the free list is empty; the pool never grows.
    pub fn alloc(&mut self, payload: Payload) -> ObjRef {
        let head = self.head(FREE);
        let first = self.links[head].next as usize;
        if first == head {
            error!("object pool exhausted ({} slots)", self.capacity());
            panic!("object pool exhausted");
        }
        self.unlink(first);
        self.link_last(first, ALLOCATED);
        self.slots[first] = Slot {
            ref_cnt: 1,
            payload,
        };
        self.used += 1;
        ObjRef(first as u32)
    }

    /// Returns a dead slot to the free list, handing back its payload.
    pub(crate) fn recycle(&mut self, r: ObjRef) -> Payload {
        let i = r.index();
        debug_assert_eq!(self.slots[i].ref_cnt, 0);
        let payload = std::mem::take(&mut self.slots[i].payload);
        self.unlink(i);
        self.link_last(i, FREE);
        self.used -= 1;
        payload
    }

    /// Drops one reference; returns the remaining count.
    pub(crate) fn dec_ref(&mut self, r: ObjRef) -> u32 {
        let slot = &mut self.slots[r.index()];
        assert!(slot.ref_cnt != 0, "release of a dead object");
        slot.ref_cnt -= 1;
        slot.ref_cnt
    }

    pub(crate) fn inc_ref(&mut self, r: ObjRef) {
        let slot = &mut self.slots[r.index()];
        assert!(slot.ref_cnt != 0, "retain of a dead object");
        slot.ref_cnt += 1;
    }

    #[must_use]
    pub fn slot(&self, r: ObjRef) -> &Slot {
        let slot = &self.slots[r.index()];
        debug_assert!(slot.ref_cnt != 0, "access to a dead object");
        slot
    }

    #[must_use]
    pub fn payload(&self, r: ObjRef) -> &Payload {
        &self.slot(r).payload
    }

    pub fn payload_mut(&mut self, r: ObjRef) -> &mut Payload {
        let slot = &mut self.slots[r.index()];
        debug_assert!(slot.ref_cnt != 0, "access to a dead object");
        &mut slot.payload
    }

    fn walk(&self, list: usize) -> impl Iterator<Item = usize> + '_ {
        let head = self.head(list);
        std::iter::successors(Some(self.links[head].next as usize), move |&i| {
            Some(self.links[i].next as usize)
        })
        .take_while(move |&i| i != head)
    }

    /// Live objects in allocation order.
    pub fn allocated(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.walk(ALLOCATED).map(|i| ObjRef(i as u32))
    }

    /// Indices on the free list, in reuse order.
    pub fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.walk(FREE)
    }
}
