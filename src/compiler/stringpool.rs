use serde::Serialize;

use super::LimitError;

/// Longest string the pool can hold: the length of each record is stored
/// in a single byte.
pub const MAX_STRING_LEN: usize = 255;

/**
Stores the text of every identifier which the compiler has seen in a single
append only byte arena. Each string is stored as a record made of a length
byte followed by the bytes of the string:

```text
 0   1 2 3 4 5 6 7   8 9 10 11 12 13 14 15
[7 | I N T E G E R ][4 | R  E  A  L ] ...
```

The position of the length byte is the [`PoolIndex`] of the string. Indices
are never invalidated: when the arena is full its capacity doubles, and a
record is never moved relative to the start of the arena.
 */
#[derive(Debug)]
pub struct StringPool {
    pool: Vec<u8>,

    /// Logical capacity of the arena. Doubles whenever an insert would
    /// exceed it.
    capacity: usize,
    max_capacity: usize,
}

impl StringPool {
    pub fn new(base_size: usize, max_size: usize) -> StringPool {
        StringPool {
            pool: Vec::with_capacity(base_size),
            capacity: base_size.max(1),
            max_capacity: max_size,
        }
    }

    /// Append a string to the pool and return the index of its record. This
    /// does not check whether the string is already in the pool, use
    /// [`StringPool::find`] for that.
    pub fn install(&mut self, s: &str) -> Result<PoolIndex, LimitError> {
        let len = s.len();
        if len > MAX_STRING_LEN {
            return Err(LimitError::StringTooLong(len));
        }

        let needed = self.pool.len() + len + 1;
        while needed > self.capacity {
            if self.capacity * 2 > self.max_capacity {
                return Err(LimitError::PoolExhausted(self.max_capacity));
            }
            self.capacity *= 2;
            self.pool.reserve(self.capacity - self.pool.len());
        }

        let idx = PoolIndex(self.pool.len());
        self.pool.push(len as u8);
        self.pool.extend_from_slice(s.as_bytes());
        Ok(idx)
    }

    /// Return the string stored at the given index.
    pub fn lookup(&self, idx: PoolIndex) -> &str {
        let bytes = self.record(idx);
        std::str::from_utf8(bytes).unwrap_or_default()
    }

    /// Search the pool for a record holding exactly the given string.
    pub fn find(&self, s: &str) -> Option<PoolIndex> {
        self.iter().find(|(_, text)| *text == s).map(|(idx, _)| idx)
    }

    /// Returns true if the two records hold the same string.
    pub fn compare(&self, a: PoolIndex, b: PoolIndex) -> bool {
        self.record(a) == self.record(b)
    }

    /// Remove the last record from the pool. Only the most recently installed
    /// string can be forgotten; for any other index this returns `false`
    /// and leaves the pool unchanged.
    pub fn forget(&mut self, idx: PoolIndex) -> bool {
        let is_last = idx.0 < self.pool.len()
            && idx.0 + 1 + self.pool[idx.0] as usize == self.pool.len();
        if is_last {
            self.pool.truncate(idx.0);
        }
        is_last
    }

    /// The first unused byte of the arena.
    pub fn position(&self) -> usize {
        self.pool.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over every record in insertion order.
    pub fn iter(&self) -> PoolIter {
        PoolIter { pool: self, pos: 0 }
    }

    fn record(&self, idx: PoolIndex) -> &[u8] {
        match self.pool.get(idx.0) {
            Some(&len) => {
                let start = idx.0 + 1;
                let end = (start + len as usize).min(self.pool.len());
                &self.pool[start..end]
            }
            None => &[],
        }
    }
}

pub struct PoolIter<'a> {
    pool: &'a StringPool,
    pos: usize,
}

impl<'a> Iterator for PoolIter<'a> {
    type Item = (PoolIndex, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.pool.pool.len() {
            return None;
        }

        let idx = PoolIndex(self.pos);
        self.pos += 1 + self.pool.pool[self.pos] as usize;
        Some((idx, self.pool.lookup(idx)))
    }
}

/// Index of a record in the [`StringPool`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize)]
pub struct PoolIndex(usize);

impl PoolIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PoolIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

/// Identifiers are case insensitive and are stored upper cased.
pub fn capitalize(s: &str) -> String {
    s.to_ascii_uppercase()
}

/// The x33 string hash: `h = h * 33 + c` over every byte, reduced to a
/// bucket index.
pub fn hash(s: &str, buckets: usize) -> usize {
    let h = s
        .bytes()
        .fold(0u32, |h, c| (h << 5).wrapping_add(h).wrapping_add(c as u32));
    h as usize % buckets
}
