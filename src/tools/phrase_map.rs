//! Open addressed phrase dictionary.
//!
//! Keys are short byte sequences (2 to 255 bytes) hashed with 64 bit FNV-1a
//! and probed linearly.  A slot stores a length byte (0 marks an empty slot)
//! followed by the key bytes.  The table is purely additive during a pass:
//! entries are never removed or rewritten, so a slot index is a stable
//! identifier and doubles as a Huffman leaf label.

use crate::Error;

const SLOT: usize = 256;
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in data {
        hash = (hash ^ *b as u64).wrapping_mul(FNV_PRIME);
    }
    hash
}

pub struct PhraseMap {
    /// `n` slots of `SLOT` bytes each in one flat allocation
    slot: Vec<u8>,
    n: usize,
    entries: usize,
    max_chain: usize,
    max_bytes: usize
}

impl PhraseMap {
    /// `n` must be a power of two greater than 16
    pub fn create(n: usize) -> Result<Self,Error> {
        assert!(n > 16 && n & (n - 1) == 0 && n <= 1 << 20);
        let mut slot: Vec<u8> = Vec::new();
        slot.try_reserve_exact(n * SLOT).map_err(|_| Error::OutOfMemory)?;
        slot.resize(n * SLOT,0);
        Ok(Self { slot, n, entries: 0, max_chain: 0, max_bytes: 0 })
    }
    pub fn entries(&self) -> usize {
        self.entries
    }
    pub fn max_chain(&self) -> usize {
        self.max_chain
    }
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
    /// heap bytes a table of `n` slots occupies
    pub fn footprint(n: usize) -> usize {
        n * SLOT
    }
    fn key_len(&self,i: usize) -> usize {
        self.slot[i * SLOT] as usize
    }
    /// the key stored at `slot`, empty if the slot is unoccupied
    pub fn key_of(&self,i: usize) -> &[u8] {
        assert!(i < self.n);
        let len = self.key_len(i);
        &self.slot[i*SLOT + 1 .. i*SLOT + 1 + len]
    }
    /// probe chain for `key` starting from its hash; an empty slot ends the
    /// chain, and the 3/4 load cap guarantees one always exists
    fn probe(&self,hash: u64,key: &[u8]) -> Option<usize> {
        let mut i = hash as usize & (self.n - 1);
        while self.key_len(i) > 0 {
            if self.key_of(i) == key {
                return Some(i);
            }
            i = (i + 1) & (self.n - 1);
        }
        None
    }
    pub fn get(&self,key: &[u8]) -> Option<usize> {
        assert!(key.len() >= 2 && key.len() < SLOT);
        self.probe(fnv1a(key),key)
    }
    /// insert `key` and return its slot; returns the existing slot for a
    /// repeated key, or `None` once the table holds 3/4 of its capacity
    pub fn put(&mut self,key: &[u8]) -> Option<usize> {
        assert!(key.len() >= 2 && key.len() < SLOT);
        if self.entries >= self.n * 3 / 4 {
            return None;
        }
        let hash = fnv1a(key);
        let mut i = hash as usize & (self.n - 1);
        let mut chain = 0;
        while self.key_len(i) > 0 {
            if self.key_of(i) == key {
                return Some(i);
            }
            chain += 1;
            i = (i + 1) & (self.n - 1);
        }
        if chain > self.max_chain {
            self.max_chain = chain;
        }
        if key.len() > self.max_bytes {
            self.max_bytes = key.len();
        }
        self.slot[i * SLOT] = key.len() as u8;
        self.slot[i*SLOT + 1 .. i*SLOT + 1 + key.len()].copy_from_slice(key);
        self.entries += 1;
        Some(i)
    }
    /// slot of the longest key that prefixes `bytes`.
    ///
    /// The rolling hash extends the query one byte at a time; the scan stops
    /// at the first miss that follows a hit.  Keys are not prefix closed, so
    /// a miss before any hit keeps scanning.  Best effort, not exhaustive.
    pub fn best_prefix(&self,bytes: &[u8]) -> Option<usize> {
        let max_len = bytes.len().min(SLOT - 1);
        let mut best = None;
        let mut hash = FNV_OFFSET;
        for k in 0..max_len {
            hash = (hash ^ bytes[k] as u64).wrapping_mul(FNV_PRIME);
            let len = k + 1;
            if len < 2 {
                continue;
            }
            match self.probe(hash,&bytes[..len]) {
                Some(slot) => best = Some(slot),
                None => {
                    if best.is_some() {
                        break;
                    }
                }
            }
        }
        best
    }
    pub fn clear(&mut self) {
        for i in 0..self.n {
            self.slot[i * SLOT] = 0;
        }
        self.entries = 0;
        self.max_chain = 0;
    }
}

#[test]
fn put_get_stability() {
    let mut map = PhraseMap::create(64).expect("create failed");
    let s1 = map.put(b"the ").expect("table full");
    let s2 = map.put(b"quick ").expect("table full");
    assert_ne!(s1,s2);
    assert_eq!(map.get(b"the "),Some(s1));
    assert_eq!(map.get(b"quick "),Some(s2));
    assert_eq!(map.key_of(s1),b"the ");
    // repeated put returns the slot it already has
    assert_eq!(map.put(b"the "),Some(s1));
    assert_eq!(map.entries(),2);
    assert_eq!(map.get(b"lazy "),None);
}

#[test]
fn load_cap_refuses_insertion() {
    let mut map = PhraseMap::create(32).expect("create failed");
    let mut keys = Vec::new();
    for i in 0..24u8 {
        let key = [b'k',i,i.wrapping_mul(3)];
        assert!(map.put(&key).is_some());
        keys.push(key);
    }
    assert_eq!(map.entries(),24);
    // 3/4 of 32 slots are in use, the next insertion is dropped
    assert_eq!(map.put(b"overflow"),None);
    assert_eq!(map.entries(),24);
    assert_eq!(map.get(b"overflow"),None);
    for key in &keys {
        let slot = map.get(key).expect("key lost");
        assert_eq!(map.key_of(slot),key);
    }
}

#[test]
fn best_prefix_takes_longest_hit() {
    let mut map = PhraseMap::create(64).expect("create failed");
    let abc = map.put(b"abc").expect("table full");
    map.put(b"abcde").expect("table full");
    // "ab" was never inserted, the scan keeps going and lands on "abc";
    // "abcd" misses after that hit, so "abcde" is never reached
    assert_eq!(map.best_prefix(b"abcdefgh"),Some(abc));
}

#[test]
fn best_prefix_reaches_past_early_misses() {
    let mut map = PhraseMap::create(64).expect("create failed");
    let abcd = map.put(b"abcd").expect("table full");
    assert_eq!(map.best_prefix(b"abcdxyz"),Some(abcd));
    assert_eq!(map.best_prefix(b"zzzz"),None);
    assert_eq!(map.best_prefix(b"a"),None);
}

#[test]
fn clear_empties_the_table() {
    let mut map = PhraseMap::create(32).expect("create failed");
    map.put(b"abc").expect("table full");
    map.clear();
    assert_eq!(map.entries(),0);
    assert_eq!(map.get(b"abc"),None);
}
