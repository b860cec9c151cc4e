//! LZ77 compression with adaptive Huffman coding and a phrase dictionary.
//!
//! A compressed stream starts with an 88 bit header: the decoded byte count
//! (64 bits), then `win_bits`, `map_bits` and `len_bits` (8 bits each), all
//! big endian.  The body is a token stream:
//!
//! * `0`  - literal byte with the high bit clear, coded with the `sym` tree
//! * `10` - literal byte with the high bit set, coded with the `sym` tree
//! * `11` - a length symbol from the `len` tree dispatches further:
//!   symbol 1 is a dictionary hit and a slot index from the `dic` tree
//!   follows; symbol 0 escapes to a number coded length followed by an
//!   offset from the `pos` tree; any other symbol *is* the match length,
//!   followed by the offset.
//!
//! Every tree update happens after the corresponding bits were written or
//! read, and the phrase dictionary grows identically on both sides, so the
//! expander replays the squeezer's state transitions exactly.

use std::io::{Read,Write};
use crate::{Error,Params};
use crate::tools::adaptive_huff::AdaptiveHuffman;
use crate::tools::bitstream::{BitReader,BitWriter,IoSink,IoSource,MemSink,MemSource,WordSink,WordSource};
use crate::tools::matcher;
use crate::tools::phrase_map::PhraseMap;

/// length symbol reserved for escaped (number coded) lengths
const LEN_ESCAPE: usize = 0;
/// length symbol reserved for dictionary hits
const LEN_DICT: usize = 1;
/// back references shorter than this lose to literal coding
const MIN_MATCH: usize = 3;
/// dictionary hits shorter than this are not worth a token
const MIN_PHRASE: usize = 3;
/// longest key the dictionary will hold
const MAX_PHRASE: usize = 255;

/// Token counters for one pass, reported at debug level.
#[derive(Clone,Copy,Default)]
pub struct PassStats {
    pub literals: u64,
    pub matches: u64,
    pub phrases: u64
}

/// One compression or expansion session.  Owns the phrase dictionary and
/// the four adaptive trees: `sym` over byte values, `pos` over window
/// offsets, `len` over match lengths, `dic` over dictionary slots.
pub struct Squeeze {
    params: Params,
    map: PhraseMap,
    sym: AdaptiveHuffman,
    pos: AdaptiveHuffman,
    len: AdaptiveHuffman,
    dic: AdaptiveHuffman,
    stats: PassStats
}

impl Squeeze {
    pub fn new(params: &Params) -> Result<Self,Error> {
        params.validate()?;
        Ok(Self {
            params: *params,
            map: PhraseMap::create(params.map_slots())?,
            sym: AdaptiveHuffman::create(256)?,
            pos: AdaptiveHuffman::create(params.window())?,
            len: AdaptiveHuffman::create(params.len_symbols())?,
            dic: AdaptiveHuffman::create(params.map_slots())?,
            stats: PassStats::default()
        })
    }
    /// deterministic heap size of a session with these parameters
    pub fn footprint(params: &Params) -> usize {
        std::mem::size_of::<Self>()
            + PhraseMap::footprint(params.map_slots())
            + AdaptiveHuffman::footprint(256)
            + AdaptiveHuffman::footprint(params.window())
            + AdaptiveHuffman::footprint(params.len_symbols())
            + AdaptiveHuffman::footprint(params.map_slots())
    }
    pub fn stats(&self) -> PassStats {
        self.stats
    }
    /// Encode `data` as a token stream and flush the trailing bits.
    /// The header is the caller's business, see `write_header`.
    pub fn compress<S: WordSink>(&mut self,data: &[u8],w: &mut BitWriter<S>) -> Result<(),Error> {
        let window = self.params.window();
        let base = self.params.number_base();
        let len_symbols = self.params.len_symbols();
        let mut i = 0;
        while i < data.len() {
            if let Some(hit) = matcher::longest_match(data,i,window) {
                if hit.len >= MIN_MATCH {
                    w.write_bits(0b11,2)?;
                    if hit.len < len_symbols {
                        self.len.encode(hit.len,w)?;
                    } else {
                        self.len.encode(LEN_ESCAPE,w)?;
                        w.write_number(hit.len as u64,base)?;
                    }
                    self.pos.encode(hit.pos,w)?;
                    self.note_phrase(&data[i..i + hit.len]);
                    self.stats.matches += 1;
                    i += hit.len;
                    continue;
                }
            }
            if let Some(slot) = self.map.best_prefix(&data[i..]) {
                let klen = self.map.key_of(slot).len();
                if klen >= MIN_PHRASE {
                    w.write_bits(0b11,2)?;
                    self.len.encode(LEN_DICT,w)?;
                    self.dic.encode(slot,w)?;
                    self.stats.phrases += 1;
                    i += klen;
                    continue;
                }
            }
            let b = data[i];
            if b < 0x80 {
                w.write_bit(false)?;
            } else {
                w.write_bits(0b10,2)?;
            }
            self.sym.encode(b as usize,w)?;
            self.stats.literals += 1;
            i += 1;
        }
        w.flush()?;
        self.log_pass("compress");
        Ok(())
    }
    /// Decode tokens until `out` is full.  `out` must be sized from the
    /// header's byte count, see `read_header`.
    pub fn decompress<S: WordSource>(&mut self,out: &mut [u8],r: &mut BitReader<S>) -> Result<(),Error> {
        let window = self.params.window();
        let base = self.params.number_base();
        let mut i = 0;
        while i < out.len() {
            if !r.read_bit()? {
                out[i] = self.sym.decode(r)? as u8;
                self.stats.literals += 1;
                i += 1;
            } else if !r.read_bit()? {
                out[i] = self.sym.decode(r)? as u8;
                self.stats.literals += 1;
                i += 1;
            } else {
                let len_sym = self.len.decode(r)?;
                if len_sym == LEN_DICT {
                    let slot = self.dic.decode(r)?;
                    let key = self.map.key_of(slot);
                    let klen = key.len();
                    if klen == 0 {
                        // the squeezer never points at an empty slot
                        return Err(Error::CorruptStream);
                    }
                    if i + klen > out.len() {
                        return Err(Error::CorruptStream);
                    }
                    out[i..i + klen].copy_from_slice(key);
                    self.stats.phrases += 1;
                    i += klen;
                } else {
                    let len = match len_sym {
                        LEN_ESCAPE => r.read_number(base)?,
                        _ => len_sym as u64
                    };
                    if len == 0 || len > (out.len() - i) as u64 {
                        return Err(Error::CorruptStream);
                    }
                    let len = len as usize;
                    let pos = self.pos.decode(r)?;
                    debug_assert!(pos < window);
                    if pos == 0 || pos >= i {
                        return Err(Error::CorruptStream);
                    }
                    // the source may overlap the destination, so the copy
                    // must run byte by byte
                    for k in 0..len {
                        out[i + k] = out[i + k - pos];
                    }
                    self.note_phrase(&out[i..i + len]);
                    self.stats.matches += 1;
                    i += len;
                }
            }
        }
        self.log_pass("expand");
        Ok(())
    }
    /// Both sides insert the span behind a back reference, clamped to the
    /// slot width, so the dictionaries grow in lockstep.
    fn note_phrase(&mut self,bytes: &[u8]) {
        if bytes.len() >= 2 {
            let clamped = bytes.len().min(MAX_PHRASE);
            self.map.put(&bytes[..clamped]);
        }
    }
    fn log_pass(&self,what: &str) {
        log::debug!("{}: {} literals, {} back references, {} phrase hits",
            what,self.stats.literals,self.stats.matches,self.stats.phrases);
        log::debug!("dictionary: {} entries, max chain {}, max bytes {}",
            self.map.entries(),self.map.max_chain(),self.map.max_bytes());
        for (name,tree) in [("sym",&self.sym),("pos",&self.pos),("len",&self.len),("dic",&self.dic)] {
            let stats = tree.stats();
            log::debug!("{} tree: {} path updates, {} swaps, {} moves{}",
                name,stats.updates,stats.swaps,stats.moves,
                match tree.is_complete() { true => ", complete", false => "" });
        }
    }
}

/// Write the 88 bit stream header.
pub fn write_header<S: WordSink>(w: &mut BitWriter<S>,byte_count: u64,params: &Params) -> Result<(),Error> {
    params.validate()?;
    w.write_bits(byte_count,64)?;
    w.write_bits(params.win_bits as u64,8)?;
    w.write_bits(params.map_bits as u64,8)?;
    w.write_bits(params.len_bits as u64,8)?;
    Ok(())
}

/// Read the 88 bit stream header and validate the parameter triple.
pub fn read_header_from<S: WordSource>(r: &mut BitReader<S>) -> Result<(u64,Params),Error> {
    let byte_count = r.read_bits(64)?;
    let win_bits = r.read_bits(8)? as u8;
    let map_bits = r.read_bits(8)? as u8;
    let len_bits = r.read_bits(8)? as u8;
    let params = Params { win_bits, map_bits, len_bits };
    params.validate()?;
    Ok((byte_count,params))
}

/// Peek at the header of a compressed buffer.
pub fn read_header(data: &[u8]) -> Result<(u64,Params),Error> {
    let mut r = BitReader::new(MemSource::new(data));
    read_header_from(&mut r)
}

/// Compress a buffer into a fresh `Vec`.
pub fn compress_slice(data: &[u8],params: &Params) -> Result<Vec<u8>,Error> {
    let mut out: Vec<u8> = Vec::new();
    let mut w = BitWriter::new(IoSink::new(&mut out));
    write_header(&mut w,data.len() as u64,params)?;
    let mut sq = Squeeze::new(params)?;
    sq.compress(data,&mut w)?;
    drop(w);
    Ok(out)
}

/// Compress a buffer into a caller owned buffer of fixed capacity.
/// Returns the number of bytes written.
pub fn compress_into(data: &[u8],out: &mut [u8],params: &Params) -> Result<usize,Error> {
    let mut w = BitWriter::new(MemSink::new(out));
    write_header(&mut w,data.len() as u64,params)?;
    let mut sq = Squeeze::new(params)?;
    sq.compress(data,&mut w)?;
    Ok(w.into_sink().len())
}

/// Expand a compressed buffer into a fresh `Vec` sized from its header.
pub fn expand_slice(data: &[u8]) -> Result<Vec<u8>,Error> {
    let mut r = BitReader::new(MemSource::new(data));
    let (byte_count,params) = read_header_from(&mut r)?;
    let mut out: Vec<u8> = Vec::new();
    out.try_reserve_exact(byte_count as usize).map_err(|_| Error::OutOfMemory)?;
    out.resize(byte_count as usize,0);
    let mut sq = Squeeze::new(&params)?;
    sq.decompress(&mut out,&mut r)?;
    Ok(out)
}

/// Streamed compression: buffer the reader, write 64 bit blocks to the
/// writer.  Returns `(bytes_in,bytes_out)`.
pub fn compress<R,W>(input: &mut R,output: &mut W,params: &Params) -> Result<(u64,u64),Error>
where R: Read, W: Write {
    let mut data = Vec::new();
    input.read_to_end(&mut data)?;
    let mut w = BitWriter::new(IoSink::new(output));
    write_header(&mut w,data.len() as u64,params)?;
    let mut sq = Squeeze::new(params)?;
    sq.compress(&data,&mut w)?;
    let written = w.bytes_written();
    Ok((data.len() as u64,written))
}

/// Streamed expansion: read 64 bit blocks, write the reconstructed bytes.
/// Returns `(bytes_in,bytes_out)`.
pub fn expand<R,W>(input: &mut R,output: &mut W) -> Result<(u64,u64),Error>
where R: Read, W: Write {
    let mut r = BitReader::new(IoSource::new(input));
    let (byte_count,params) = read_header_from(&mut r)?;
    let mut out: Vec<u8> = Vec::new();
    out.try_reserve_exact(byte_count as usize).map_err(|_| Error::OutOfMemory)?;
    out.resize(byte_count as usize,0);
    let mut sq = Squeeze::new(&params)?;
    sq.decompress(&mut out,&mut r)?;
    output.write_all(&out)?;
    Ok((r.bytes_read(),out.len() as u64))
}

#[cfg(test)]
const TEST_PARAMS: Params = Params { win_bits: 11, map_bits: 12, len_bits: 6 };

#[cfg(test)]
fn round_trip(data: &[u8],params: &Params) -> Vec<u8> {
    let compressed = compress_slice(data,params).expect("compression failed");
    let expanded = expand_slice(&compressed).expect("expansion failed");
    assert_eq!(expanded,data,"round trip mismatch");
    compressed
}

#[test]
fn round_trip_small_text() {
    let test_data = "Hello World Hello.World Hello World".as_bytes();
    round_trip(test_data,&TEST_PARAMS);
}

#[test]
fn round_trip_empty() {
    let compressed = round_trip(b"",&TEST_PARAMS);
    assert_eq!(compressed.len(),16);
}

#[test]
fn round_trip_zero_run() {
    let data = vec![0u8;4096];
    let compressed = round_trip(&data,&TEST_PARAMS);
    assert!(compressed.len() < 1024,"zero run should squeeze well, got {}",compressed.len());
}

#[test]
fn round_trip_overlapped_pattern() {
    let mut data = Vec::new();
    for _i in 0..1024 {
        data.extend_from_slice(b"\x01\x02\x03\x04");
    }
    let compressed = round_trip(&data,&TEST_PARAMS);
    assert!(compressed.len() < data.len() / 4);
}

#[test]
fn round_trip_high_bit_payload() {
    let data: Vec<u8> = (0..2048u32)
        .map(|i| match i % 7 {
            0 => b'a',
            _ => 0x80 | (i.wrapping_mul(31) % 128) as u8
        })
        .collect();
    round_trip(&data,&TEST_PARAMS);
}

#[test]
fn round_trip_parameter_extremes() {
    let mut data = Vec::new();
    for _i in 0..90 {
        data.extend_from_slice(b"the quick brown fox jumps over the lazy dog. ");
    }
    round_trip(&data,&Params { win_bits: 10, map_bits: 8, len_bits: 4 });
    round_trip(&data,&Params { win_bits: 20, map_bits: 10, len_bits: 8 });
}

#[test]
fn phrase_dictionary_reaches_past_the_window() {
    // a phrase with an internal repeat, far filler, then the phrase again;
    // the second occurrence is outside the window and only the dictionary
    // can see it
    let phrase = b"abcdefghij abcdefghij abcdefghij ";
    let params = Params { win_bits: 10, map_bits: 12, len_bits: 6 };
    let mut data = phrase.to_vec();
    for i in 0..1200u32 {
        data.push(((i % 251) as u8) ^ 0x55);
    }
    data.extend_from_slice(phrase);

    let mut out: Vec<u8> = Vec::new();
    let mut w = BitWriter::new(IoSink::new(&mut out));
    write_header(&mut w,data.len() as u64,&params).expect("header failed");
    let mut sq = Squeeze::new(&params).expect("session failed");
    sq.compress(&data,&mut w).expect("compression failed");
    assert!(sq.stats().phrases > 0,"expected at least one phrase hit");
    assert!(sq.map.entries() > 0);
    drop(w);

    let expanded = expand_slice(&out).expect("expansion failed");
    assert_eq!(data,expanded);
}

#[test]
fn header_echo() {
    let params = Params { win_bits: 13, map_bits: 9, len_bits: 5 };
    let compressed = compress_slice(b"abc",&params).expect("compression failed");
    let (byte_count,echoed) = read_header(&compressed).expect("header read failed");
    assert_eq!(byte_count,3);
    assert_eq!(echoed,params);
}

#[test]
fn header_layout() {
    let params = Params { win_bits: 11, map_bits: 10, len_bits: 6 };
    let compressed = compress_slice(b"",&params).expect("compression failed");
    assert_eq!(compressed,hex::decode("00000000000000000b0a060000000000").unwrap());
}

#[test]
fn bad_header_parameters_are_rejected() {
    // byte count 0, win_bits 9
    let mut bad = vec![0u8;16];
    bad[8] = 9;
    bad[9] = 19;
    bad[10] = 6;
    assert!(matches!(expand_slice(&bad),Err(Error::InvalidParameter)));
    // len_bits 9
    let mut bad = vec![0u8;16];
    bad[8] = 11;
    bad[9] = 19;
    bad[10] = 9;
    assert!(matches!(expand_slice(&bad),Err(Error::InvalidParameter)));
    // the compressor checks the same ranges up front
    let params = Params { win_bits: 9, map_bits: 19, len_bits: 6 };
    assert!(matches!(compress_slice(b"x",&params),Err(Error::InvalidParameter)));
}

#[test]
fn truncated_body_is_detected() {
    let data = vec![0u8;4096];
    let compressed = compress_slice(&data,&TEST_PARAMS).expect("compression failed");
    for cut in [16,17,compressed.len() - 1] {
        match expand_slice(&compressed[..cut]) {
            Err(Error::EndOfStream) | Err(Error::CorruptStream) => {},
            other => panic!("cut at {} produced {:?}",cut,other.map(|v| v.len()))
        }
    }
}

// The corruption tests below hand roll token streams.  The trees are still
// in their balanced starting state when the offending token arrives, so
// every codeword is the leaf index in plain binary: 6 bits for the `len`
// tree (len_bits 6), 11 for `pos` (win_bits 11), 12 for `dic` (map_bits
// 12), 8 for `sym`.  `TEST_BASE` is the number coding base for win_bits 11.
#[cfg(test)]
const TEST_BASE: u32 = 3;

#[cfg(test)]
fn crafted_stream(byte_count: u64,fields: &[(u64,u32)]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut w = BitWriter::new(IoSink::new(&mut out));
    write_header(&mut w,byte_count,&TEST_PARAMS).expect("header failed");
    for (value,bits) in fields {
        w.write_bits(*value,*bits).expect("write failed");
    }
    w.flush().expect("flush failed");
    drop(w);
    out
}

#[test]
fn empty_dictionary_slot_is_corrupt() {
    // a dictionary hit pointing at slot 0, which was never inserted
    let crafted = crafted_stream(4,&[
        (0b11,2),
        (LEN_DICT as u64,6),
        (0,12)
    ]);
    assert!(matches!(expand_slice(&crafted),Err(Error::CorruptStream)));
}

#[test]
fn out_of_range_offset_is_corrupt() {
    // a back reference of length 3, offset 5, before any output exists
    let crafted = crafted_stream(8,&[
        (0b11,2),
        (3,6),
        (5,11)
    ]);
    assert!(matches!(expand_slice(&crafted),Err(Error::CorruptStream)));
    // a zero offset behind one literal
    let crafted = crafted_stream(8,&[
        (0,1),
        (b'A' as u64,8),
        (0b11,2),
        (3,6),
        (0,11)
    ]);
    assert!(matches!(expand_slice(&crafted),Err(Error::CorruptStream)));
}

#[test]
fn bad_escape_length_is_corrupt() {
    // an escaped length of zero: one base-3 digit group, no continuation
    let crafted = crafted_stream(8,&[
        (0b11,2),
        (LEN_ESCAPE as u64,6),
        (0,TEST_BASE),
        (0,1)
    ]);
    assert!(matches!(expand_slice(&crafted),Err(Error::CorruptStream)));
    // an escaped length past the declared output size:
    // 100 = 0b001_100_100 in continuation coded groups, low group first
    let crafted = crafted_stream(8,&[
        (0b11,2),
        (LEN_ESCAPE as u64,6),
        (0b100,TEST_BASE),(1,1),
        (0b100,TEST_BASE),(1,1),
        (0b001,TEST_BASE),(0,1)
    ]);
    let mut prefixed: Vec<u8> = Vec::new();
    let mut w = BitWriter::new(IoSink::new(&mut prefixed));
    write_header(&mut w,8,&TEST_PARAMS).expect("header failed");
    w.write_bits(0b11,2).expect("write failed");
    w.write_bits(LEN_ESCAPE as u64,6).expect("write failed");
    w.write_number(100,TEST_BASE).expect("write failed");
    w.flush().expect("flush failed");
    drop(w);
    assert_eq!(prefixed,crafted,"number coding drifted from the hand rolled form");
    assert!(matches!(expand_slice(&crafted),Err(Error::CorruptStream)));
}

#[test]
fn bounded_sink_reports_capacity() {
    let data = vec![0u8;4096];
    let mut small = [0u8;8];
    assert!(matches!(compress_into(&data,&mut small,&TEST_PARAMS),Err(Error::CapacityExceeded)));
    let mut roomy = vec![0u8;8192];
    let n = compress_into(&data,&mut roomy,&TEST_PARAMS).expect("compression failed");
    let reference = compress_slice(&data,&TEST_PARAMS).expect("compression failed");
    assert_eq!(&roomy[..n],&reference[..]);
}

#[test]
fn streamed_round_trip() {
    use std::io::Cursor;
    let mut data = Vec::new();
    for i in 0..400u32 {
        data.extend_from_slice(format!("record {:06} looks much like the others\n",i).as_bytes());
    }
    let mut input = Cursor::new(data.clone());
    let mut compressed: Vec<u8> = Vec::new();
    let (bytes_in,bytes_out) = compress(&mut input,&mut compressed,&TEST_PARAMS).expect("compression failed");
    assert_eq!(bytes_in,data.len() as u64);
    assert_eq!(bytes_out,compressed.len() as u64);
    let mut expanded: Vec<u8> = Vec::new();
    let (read,wrote) = expand(&mut Cursor::new(compressed.clone()),&mut expanded).expect("expansion failed");
    assert_eq!(read,compressed.len() as u64);
    assert_eq!(wrote,data.len() as u64);
    assert_eq!(data,expanded);
}

#[test]
fn footprint_is_deterministic() {
    let small = Squeeze::footprint(&Params { win_bits: 10, map_bits: 8, len_bits: 4 });
    let large = Squeeze::footprint(&Params { win_bits: 12, map_bits: 10, len_bits: 6 });
    assert!(small > PhraseMap::footprint(256));
    assert!(large > small);
    assert_eq!(small,Squeeze::footprint(&Params { win_bits: 10, map_bits: 8, len_bits: 4 }));
}
