// RingBuffer - fixed-capacity circular container
//
// Shared by the diagnostic sample window, the current history and the
// learning history. Slots are appended until capacity is reached; after that
// every push overwrites the oldest slot and the buffer stays full until an
// explicit clear.

/// Fixed-capacity circular buffer with "filled at least once" tracking
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Slot the next push writes to once the buffer is full
    next: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity is bumped to one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    /// Append a value, returning the overwritten one when the buffer is full
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
            self.next = self.slots.len() % self.capacity;
            return None;
        }

        let evicted = std::mem::replace(&mut self.slots[self.next], value);
        self.next = (self.next + 1) % self.capacity;
        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once every slot has been written; stays true until `clear`
    pub fn is_filled(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let split = if self.is_filled() { self.next } else { 0 };
        self.slots[split..].iter().chain(self.slots[..split].iter())
    }

    /// Most recently pushed value
    pub fn latest(&self) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (self.next + self.capacity - 1) % self.capacity;
        self.slots.get(idx)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
    }
}

impl RingBuffer<f32> {
    /// Mean and population variance of the stored values
    pub fn mean_variance(&self) -> Option<(f32, f32)> {
        if self.slots.is_empty() {
            return None;
        }
        let n = self.slots.len() as f32;
        let mean = self.slots.iter().sum::<f32>() / n;
        let variance = self
            .slots
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f32>()
            / n;
        Some((mean, variance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut ring = RingBuffer::new(3);
        assert!(ring.is_empty());
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert!(!ring.is_filled());
        assert_eq!(ring.push(3), None);
        assert!(ring.is_filled());
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_overwrites_oldest_first() {
        let mut ring = RingBuffer::new(3);
        for v in 1..=3 {
            ring.push(v);
        }
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.push(5), Some(2));
        let ordered: Vec<i32> = ring.iter().copied().collect();
        assert_eq!(ordered, vec![3, 4, 5]);
        assert_eq!(ring.latest(), Some(&5));
        assert!(ring.is_filled());
    }

    #[test]
    fn test_iter_before_wrap_preserves_order() {
        let mut ring = RingBuffer::new(4);
        ring.push(10);
        ring.push(20);
        let ordered: Vec<i32> = ring.iter().copied().collect();
        assert_eq!(ordered, vec![10, 20]);
        assert_eq!(ring.latest(), Some(&20));
    }

    #[test]
    fn test_clear_resets_filled() {
        let mut ring = RingBuffer::new(2);
        ring.push(1);
        ring.push(2);
        ring.clear();
        assert!(ring.is_empty());
        assert!(!ring.is_filled());
        assert_eq!(ring.latest(), None);
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.push(7);
        assert_eq!(ring.push(8), Some(7));
    }

    #[test]
    fn test_constant_values_have_zero_variance() {
        let mut ring = RingBuffer::new(50);
        for _ in 0..60 {
            ring.push(3.0_f32);
        }
        let (mean, variance) = ring.mean_variance().unwrap();
        assert!((mean - 3.0).abs() < 1e-5);
        assert!(variance.abs() < 1e-5);
    }
}
