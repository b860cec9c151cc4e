//! Adaptive Huffman coding over a fixed power-of-two alphabet.
//!
//! The tree starts balanced with every leaf frequency at 1 and is rebalanced
//! online as frequencies accrue.  Squeezer and expander perform the identical
//! update after every emitted or consumed code, which keeps the two trees in
//! lockstep; the update must happen *after* the bits move, never before.

use crate::Error;
use crate::tools::bitstream::{BitReader,BitWriter,WordSink,WordSource};

const NIL: u32 = u32::MAX;

#[derive(Clone,Copy,Default,PartialEq,Eq,Debug)]
struct Node {
    freq: u64,
    /// bit pattern from the root, LSB is the first edge, left=0 right=1
    path: u64,
    /// path length in bits, 0 for the root
    bits: u32,
    parent: u32,
    left: u32,
    right: u32
}

/// Rebalancing counters, reported at debug level after a pass.
#[derive(Clone,Copy,Default)]
pub struct TreeStats {
    pub updates: u64,
    pub swaps: u64,
    pub moves: u64
}

/// Prefix code tree over `n` leaves stored in a flat slab of `2n-1` nodes.
/// Leaves are indices `0..n`, the root is `2n-2`.
pub struct AdaptiveHuffman {
    node: Vec<Node>,
    n: usize,
    /// max leaf depth seen
    depth: u32,
    /// latched when the tree is too deep or a frequency is near the limit,
    /// all further updates are ignored
    complete: bool,
    stats: TreeStats
}

impl AdaptiveHuffman {
    /// Build the balanced starting tree for an alphabet of `n` leaves.
    /// `n` must be a power of two, at least 8.
    pub fn create(n: usize) -> Result<Self,Error> {
        assert!(n >= 8 && n & (n - 1) == 0);
        let m = 2*n - 1;
        let bits_per_symbol = n.ilog2();
        let mut node: Vec<Node> = Vec::new();
        node.try_reserve_exact(m).map_err(|_| Error::OutOfMemory)?;
        node.resize(m,Node::default());
        for i in 0..n {
            node[i] = Node {
                freq: 1,
                path: 0,
                bits: bits_per_symbol,
                parent: (n + i/2) as u32,
                left: NIL,
                right: NIL
            };
        }
        // Internal rows are built bottom up: n/2 nodes over the leaves,
        // then n/4, and so on down to the root.
        let mut ix = n;
        let mut lix = 0;
        let mut rix = 1;
        let mut n2 = n/2;
        let mut bits = bits_per_symbol - 1;
        while n2 > 0 {
            let mut pix = ix + n2;
            for i in 0..n2 {
                node[ix] = Node {
                    freq: node[lix].freq + node[rix].freq,
                    path: 0,
                    bits,
                    parent: pix as u32,
                    left: lix as u32,
                    right: rix as u32
                };
                lix += 2;
                rix += 2;
                if i % 2 == 1 {
                    pix += 1;
                }
                ix += 1;
            }
            n2 /= 2;
            if n2 > 0 {
                bits -= 1;
            }
        }
        node[m-1].parent = NIL;
        node[m-1].path = 0;
        let mut tree = Self { node, n, depth: bits_per_symbol, complete: false, stats: TreeStats::default() };
        tree.update_paths(m-1);
        Ok(tree)
    }
    pub fn is_complete(&self) -> bool {
        self.complete
    }
    pub fn stats(&self) -> TreeStats {
        self.stats
    }
    /// heap bytes a tree over `n` leaves occupies
    pub fn footprint(n: usize) -> usize {
        (2*n - 1) * std::mem::size_of::<Node>()
    }
    /// emit the leaf's path root-to-leaf, then update the tree
    pub fn encode<S: WordSink>(&mut self,symbol: usize,w: &mut BitWriter<S>) -> Result<(),Error> {
        assert!(symbol < self.n);
        let bits = self.node[symbol].bits;
        let path = self.node[symbol].path;
        for k in 0..bits {
            w.write_bit(path & (1 << k) != 0)?;
        }
        self.inc_frequency(symbol);
        Ok(())
    }
    /// walk root-to-leaf on the incoming bits, then update the tree
    pub fn decode<S: WordSource>(&mut self,r: &mut BitReader<S>) -> Result<usize,Error> {
        let mut i = 2*self.n - 2;
        while self.node[i].left != NIL {
            i = match r.read_bit()? {
                false => self.node[i].left as usize,
                true => self.node[i].right as usize
            };
        }
        self.inc_frequency(i);
        Ok(i)
    }
    /// increment the leaf frequency and restore the tree invariants,
    /// unless the completion latch has tripped
    pub fn inc_frequency(&mut self,i: usize) {
        assert!(i < self.n);
        if !self.complete {
            if self.depth < 63 && self.node[i].freq < u64::MAX - 1 {
                self.node[i].freq += 1;
                self.frequency_changed(i);
            } else {
                self.complete = true;
            }
        }
    }
    /// recompute paths and depths of the subtree under `i`
    fn update_paths(&mut self,i: usize) {
        self.stats.updates += 1;
        let m = 2*self.n - 1;
        if i == m - 1 {
            self.depth = 0;
        }
        let bits = self.node[i].bits;
        let path = self.node[i].path;
        debug_assert!(bits < 63);
        let left = self.node[i].left;
        let right = self.node[i].right;
        if left != NIL {
            let l = left as usize;
            let r = right as usize;
            self.node[l].bits = bits + 1;
            self.node[l].path = path;
            self.node[r].bits = bits + 1;
            self.node[r].path = path | (1 << bits);
            self.update_paths(l);
            self.update_paths(r);
        } else if bits > self.depth {
            self.depth = bits;
        }
    }
    /// restore `freq(left) <= freq(right)` at the parent of `ix`;
    /// returns the index now occupying `ix`'s former role
    fn swap_siblings_if_necessary(&mut self,ix: usize) -> usize {
        let m = 2*self.n - 1;
        if ix < m - 1 {
            let pix = self.node[ix].parent as usize;
            let lix = self.node[pix].left as usize;
            let rix = self.node[pix].right as usize;
            if self.node[lix].freq > self.node[rix].freq {
                self.stats.swaps += 1;
                self.node[pix].left = rix as u32;
                self.node[pix].right = lix as u32;
                self.update_paths(pix);
                return match ix == lix {
                    true => rix,
                    false => lix
                };
            }
        }
        ix
    }
    fn update_freq(&mut self,i: usize) {
        let lix = self.node[i].left as usize;
        let rix = self.node[i].right as usize;
        self.node[i].freq = self.node[lix].freq + self.node[rix].freq;
    }
    /// promote `i` past its aunt/uncle when its frequency outgrew it
    fn move_up(&mut self,i: usize) {
        let pix = self.node[i].parent as usize;
        let gix = self.node[pix].parent as usize;
        debug_assert_eq!(self.node[pix].right as usize,i);
        let parent_is_left_child = pix == self.node[gix].left as usize;
        let psx = match parent_is_left_child {
            true => self.node[gix].right as usize,
            false => self.node[gix].left as usize
        };
        if self.node[i].freq > self.node[psx].freq {
            self.stats.moves += 1;
            self.node[i].parent = gix as u32;
            if parent_is_left_child {
                self.node[gix].right = i as u32;
            } else {
                self.node[gix].left = i as u32;
            }
            self.node[pix].right = psx as u32;
            self.node[psx].parent = pix as u32;
            self.update_freq(pix);
            self.update_freq(gix);
            self.swap_siblings_if_necessary(i);
            self.swap_siblings_if_necessary(psx);
            self.swap_siblings_if_necessary(pix);
            self.update_paths(gix);
            self.frequency_changed(gix);
        }
    }
    /// walk the parent chain re-establishing sums, sibling order,
    /// and move-up opportunities
    fn frequency_changed(&mut self,i: usize) {
        let pix = self.node[i].parent;
        let i = match pix == NIL {
            true => {
                self.update_freq(i);
                self.swap_siblings_if_necessary(i)
            },
            false => {
                self.update_freq(pix as usize);
                let moved = self.swap_siblings_if_necessary(i);
                self.frequency_changed(pix as usize);
                moved
            }
        };
        if pix != NIL && self.node[pix as usize].parent != NIL && i == self.node[pix as usize].right as usize {
            self.move_up(i);
        }
    }
}

#[cfg(test)]
fn check_invariants(t: &AdaptiveHuffman) {
    let m = 2*t.n - 1;
    for i in 0..m {
        let node = t.node[i];
        if node.left != NIL {
            let l = node.left as usize;
            let r = node.right as usize;
            assert_eq!(node.freq,t.node[l].freq + t.node[r].freq,"bad sum at {}",i);
            assert!(t.node[l].freq <= t.node[r].freq,"bad sibling order at {}",i);
            assert_eq!(t.node[l].parent as usize,i);
            assert_eq!(t.node[r].parent as usize,i);
            assert_eq!(t.node[l].bits,node.bits + 1);
            assert_eq!(t.node[l].path,node.path);
            assert_eq!(t.node[r].path,node.path | (1 << node.bits));
        }
    }
    // leaf paths must form a prefix free code
    for i in 0..t.n {
        for j in 0..t.n {
            if i != j {
                let short = t.node[i].bits.min(t.node[j].bits);
                let mask = (1u64 << short) - 1;
                assert!(t.node[i].path & mask != t.node[j].path & mask,
                    "prefix collision between {} and {}",i,j);
            }
        }
    }
}

#[test]
fn balanced_start() {
    let t = AdaptiveHuffman::create(8).expect("create failed");
    for i in 0..8 {
        assert_eq!(t.node[i].bits,3);
        assert_eq!(t.node[i].freq,1);
    }
    assert_eq!(t.node[14].freq,8);
    assert_eq!(t.node[14].bits,0);
    check_invariants(&t);
}

#[test]
fn invariants_hold_under_updates() {
    let mut t = AdaptiveHuffman::create(16).expect("create failed");
    for i in 0..2000usize {
        t.inc_frequency(i * 7 % 16);
        t.inc_frequency(i % 3);
    }
    check_invariants(&t);
}

#[test]
fn encode_decode_lockstep() {
    use crate::tools::bitstream::{MemSink,MemSource};
    let symbols: Vec<usize> = (0..500).map(|i| (i * i + i / 5) % 16).collect();
    let mut buf = [0u8;2048];
    let mut w = BitWriter::new(MemSink::new(&mut buf));
    let mut enc = AdaptiveHuffman::create(16).expect("create failed");
    for s in &symbols {
        enc.encode(*s,&mut w).expect("encode failed");
    }
    w.flush().expect("flush failed");
    let mut r = BitReader::new(MemSource::new(&buf));
    let mut dec = AdaptiveHuffman::create(16).expect("create failed");
    for s in &symbols {
        assert_eq!(dec.decode(&mut r).expect("decode failed"),*s);
    }
    check_invariants(&dec);
}

#[test]
fn latch_is_idempotent() {
    let mut t = AdaptiveHuffman::create(8).expect("create failed");
    t.node[0].freq = u64::MAX - 1;
    t.inc_frequency(0);
    assert!(t.is_complete());
    let frozen = t.node.clone();
    t.inc_frequency(0);
    t.inc_frequency(5);
    assert_eq!(frozen,t.node);
}

#[test]
fn depth_latch() {
    let mut t = AdaptiveHuffman::create(8).expect("create failed");
    t.depth = 63;
    t.inc_frequency(3);
    assert!(t.is_complete());
    assert_eq!(t.node[3].freq,1);
}
