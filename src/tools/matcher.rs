//! Longest match search over the sliding window.
//!
//! The window is implicit: both sides of the codec index into their own
//! contiguous buffer, so the searcher just walks offsets behind the current
//! position.  Offsets are tried nearest first and only a strictly longer
//! candidate replaces the best one, so equal lengths resolve to the
//! smallest offset.

/// A back reference: copy `len` bytes from `pos` bytes behind the cursor.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct Match {
    pub pos: usize,
    pub len: usize
}

/// Longest earlier occurrence of the suffix starting at `i`, with the
/// offset constrained to `0 < pos < min(i,window)`.  The matched run may
/// extend past its own source (overlap), which is how runs compress.
pub fn longest_match(data: &[u8],i: usize,window: usize) -> Option<Match> {
    let mut best = Match { pos: 0, len: 0 };
    if i >= 1 {
        let n = data.len() - i;
        for pos in 1..i.min(window) {
            let j = i - pos;
            let mut k = 0;
            while k < n && data[j + k] == data[i + k] {
                k += 1;
            }
            if k > best.len {
                best = Match { pos, len: k };
                if best.len == n {
                    break;
                }
            }
        }
    }
    match best.len > 0 {
        true => Some(best),
        false => None
    }
}

#[test]
fn finds_longest_run() {
    let data = b"abcabcabcabc";
    // the offset 3 repeat is only visible once the cursor is past it
    assert_eq!(longest_match(data,4,1024),Some(Match { pos: 3, len: 8 }));
}

#[test]
fn nothing_behind_the_first_position() {
    let data = b"aaaa";
    assert_eq!(longest_match(data,0,1024),None);
    // at i=1 the only candidate offset would be the excluded i itself
    assert_eq!(longest_match(data,1,1024),None);
}

#[test]
fn overlapping_source_is_legal() {
    let data = b"aaaaaa";
    assert_eq!(longest_match(data,2,1024),Some(Match { pos: 1, len: 4 }));
}

#[test]
fn equal_lengths_prefer_the_nearest() {
    let data = b"abXabYab";
    assert_eq!(longest_match(data,6,1024),Some(Match { pos: 3, len: 2 }));
}

#[test]
fn window_limits_the_reach() {
    let mut data = vec![0u8;40];
    data[2..6].copy_from_slice(b"wxyz");
    data[30..34].copy_from_slice(b"wxyz");
    // with a big window the early occurrence is reachable, and the zero
    // tails keep matching past the marker
    assert_eq!(longest_match(&data,30,1024),Some(Match { pos: 28, len: 10 }));
    // with a window of 16 the repeat at distance 28 is out of reach
    assert_eq!(longest_match(&data,30,16),None);
}
