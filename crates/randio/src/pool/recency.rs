/* 📖 # How does the pool find the least recently used slot?

Open slots are kept in a doubly linked list ordered from least to most
recently used. The links live in a `Vec` indexed by slot index, so touching
a slot (unlink, relink at the back) and picking the eviction victim (the
front) are both O(1), without scanning every slot.

Ties cannot happen: every touch moves exactly one slot to the back, so two
slots never share a position. Slots opened in the same round therefore leave
in the order they were opened, which for a round-robin over increasing
indices is lowest index first.
*/

#[derive(Clone, Copy, Debug, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    linked: bool,
}

/// Slot indices ordered from least to most recently used.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecencyList {
    links: Vec<Link>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl RecencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `index` to the most recently used end, inserting it if needed.
    pub fn push_back(&mut self, index: usize) {
        if index >= self.links.len() {
            self.links.resize(index + 1, Link::default());
        }
        self.remove(index);
        self.links[index] = Link {
            prev: self.tail,
            next: None,
            linked: true,
        };
        match self.tail {
            Some(tail) => self.links[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
    }

    /// Unlinks `index`. Returns whether it was present.
    pub fn remove(&mut self, index: usize) -> bool {
        let Some(link) = self.links.get(index).copied().filter(|link| link.linked) else {
            return false;
        };
        match link.prev {
            Some(prev) => self.links[prev].next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => self.links[next].prev = link.prev,
            None => self.tail = link.prev,
        }
        self.links[index] = Link::default();
        self.len -= 1;
        true
    }

    /// The least recently used index.
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    pub fn contains(&self, index: usize) -> bool {
        self.links.get(index).is_some_and(|link| link.linked)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head, move |&index| self.links[index].next)
    }
}
