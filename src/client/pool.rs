//! Fixed-size slot arena with a free list and a most-recently-used list
//!
//! Items are addressed by slot index, which is stable while the item is
//! in the pool.

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    /// Head of the singly-linked free list (uses `next`)
    free: usize,
    /// Most recently used item
    head: usize,
    /// Least recently used item
    tail: usize,
    len: usize,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize) -> Pool<T> {
        let slots = (0..capacity).map(|i| Slot {
            item: None,
            prev: NIL,
            next: if i + 1 < capacity { i + 1 } else { NIL },
        }).collect();
        Pool {
            slots: slots,
            free: if capacity > 0 { 0 } else { NIL },
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn is_full(&self) -> bool {
        self.free == NIL
    }
    /// Puts item into a free slot and marks it most recently used
    ///
    /// Returns the item back when the pool is full.
    pub fn insert(&mut self, item: T) -> Result<usize, T> {
        let idx = self.free;
        if idx == NIL {
            return Err(item);
        }
        self.free = self.slots[idx].next;
        self.slots[idx].item = Some(item);
        self.link_front(idx);
        self.len += 1;
        Ok(idx)
    }
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        let item = self.slots.get_mut(idx).and_then(|s| s.item.take())?;
        self.unlink(idx);
        self.slots[idx].next = self.free;
        self.free = idx;
        self.len -= 1;
        Some(item)
    }
    /// Marks item as most recently used
    pub fn touch(&mut self, idx: usize) {
        if self.get(idx).is_some() && self.head != idx {
            self.unlink(idx);
            self.link_front(idx);
        }
    }
    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx).and_then(|s| s.item.as_ref())
    }
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx).and_then(|s| s.item.as_mut())
    }
    /// Item at a slot known to be occupied
    pub fn at(&mut self, idx: usize) -> &mut T {
        self.get_mut(idx).expect("slot is occupied")
    }
    pub fn lru(&self) -> Option<usize> {
        if self.tail == NIL { None } else { Some(self.tail) }
    }
    /// Snapshot of occupied slots, most recently used first
    pub fn order(&self) -> Vec<usize> {
        let mut result = Vec::with_capacity(self.len);
        let mut idx = self.head;
        while idx != NIL {
            result.push(idx);
            idx = self.slots[idx].next;
        }
        result
    }
    fn link_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev != NIL {
            self.slots[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else {
            self.tail = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }
}


#[cfg(test)]
mod test {
    use super::Pool;

    #[test]
    fn insert_until_full() {
        let mut pool = Pool::new(2);
        assert!(pool.is_empty());
        let a = pool.insert(1u32).unwrap();
        let b = pool.insert(2).unwrap();
        assert!(pool.is_full());
        assert_eq!(pool.insert(3), Err(3));
        assert_eq!(pool.order(), vec![b, a]);
        assert_eq!(pool.lru(), Some(a));
    }

    #[test]
    fn touch_reorders() {
        let mut pool = Pool::new(4);
        let a = pool.insert(1u32).unwrap();
        let b = pool.insert(2).unwrap();
        let c = pool.insert(3).unwrap();
        pool.touch(a);
        assert_eq!(pool.order(), vec![a, c, b]);
        pool.touch(b);
        assert_eq!(pool.order(), vec![b, a, c]);
        assert_eq!(pool.lru(), Some(c));
        pool.touch(b);
        assert_eq!(pool.order(), vec![b, a, c]);
    }

    #[test]
    fn remove_reuses_slot() {
        let mut pool = Pool::new(3);
        let a = pool.insert(1u32).unwrap();
        let b = pool.insert(2).unwrap();
        let c = pool.insert(3).unwrap();
        assert_eq!(pool.remove(b), Some(2));
        assert_eq!(pool.remove(b), None);
        assert_eq!(pool.order(), vec![c, a]);
        assert_eq!(pool.len(), 2);
        let d = pool.insert(4).unwrap();
        assert_eq!(d, b);
        assert_eq!(pool.order(), vec![d, c, a]);
        assert_eq!(pool.remove(a), Some(1));
        assert_eq!(pool.lru(), Some(c));
        *pool.at(c) += 10;
        assert_eq!(pool.get(c), Some(&13));
        assert_eq!(pool.get(a), None);
    }

    #[test]
    fn empty() {
        let mut pool = Pool::<u32>::new(1);
        assert_eq!(pool.lru(), None);
        let a = pool.insert(5).unwrap();
        assert_eq!(pool.remove(a), Some(5));
        assert!(pool.order().is_empty());
        assert_eq!(pool.get_mut(7), None);
    }
}
