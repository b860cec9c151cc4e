//! # SQZ Library
//!
//! Compress or expand byte buffers with a combination of LZ77 back-references,
//! adaptive Huffman coding, and a phrase dictionary.
//! * `squeeze` contains the codec and the wire format
//! * the compressed stream is self-describing: an 88 bit header carries the
//!   decoded length and the parameter triple, the body is a bit-packed token
//!   stream, and the whole stream is zero-padded to a 64 bit boundary
//!
//! The codec transforms buffers, not files (we expect files that are easily
//! buffered).  There are streamed variants that move 64 bit blocks through
//! `Read`/`Write` trait objects for callers that want to plug in their own I/O.
//!
//! ## Buffer Example
//!
//! ```rs
//! use sqz::*;
//! let test_data = "Hello World Hello.World Hello World".as_bytes();
//! let compressed = squeeze::compress_slice(test_data,&STD_PARAMS).expect("compression failed");
//! let expanded = squeeze::expand_slice(&compressed).expect("expansion failed");
//! assert_eq!(test_data,expanded);
//! ```
//!
//! ## File Example
//!
//! ```rs
//! use sqz::*;
//! let mut in_file = std::fs::File::open("some_input_path").expect("open failed");
//! let mut out_file = std::fs::File::create("some_output_path").expect("create failed");
//! let (in_size,out_size) = squeeze::compress(&mut in_file,&mut out_file,&STD_PARAMS)
//!     .expect("compression failed");
//! eprintln!("squeezed {} into {}",in_size,out_size);
//! ```

mod tools;
pub mod squeeze;
pub use tools::bitstream;

/// Codec Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("sink capacity exceeded")]
    CapacityExceeded,
    #[error("end of stream")]
    EndOfStream,
    #[error("i/o failed")]
    Io(#[from] std::io::Error),
    #[error("corrupt stream")]
    CorruptStream,
    #[error("out of memory")]
    OutOfMemory
}

impl Error {
    /// fresh copy for re-surfacing from a poisoned stream; the wrapped
    /// `std::io::Error` is not clonable, so only its kind survives
    pub(crate) fn again(&self) -> Error {
        match self {
            Error::InvalidParameter => Error::InvalidParameter,
            Error::CapacityExceeded => Error::CapacityExceeded,
            Error::EndOfStream => Error::EndOfStream,
            Error::Io(e) => Error::Io(std::io::Error::from(e.kind())),
            Error::CorruptStream => Error::CorruptStream,
            Error::OutOfMemory => Error::OutOfMemory
        }
    }
}

/// Parameters controlling compression.
/// The triple is negotiated through the stream header, so the expander
/// always recovers the values the squeezer used.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct Params {
    /// log2 of the sliding window size in bytes, in 10..=20
    pub win_bits: u8,
    /// log2 of the phrase dictionary slot count, in 8..=20
    pub map_bits: u8,
    /// log2 of the match length alphabet, in 4..=8; length symbols 0 and 1
    /// are reserved for the escape and dictionary-hit sentinels
    pub len_bits: u8
}

pub const STD_PARAMS: Params = Params {
    win_bits: 11,
    map_bits: 19,
    len_bits: 6
};

impl Params {
    pub fn validate(&self) -> Result<(),Error> {
        if self.win_bits < 10 || self.win_bits > 20 {
            return Err(Error::InvalidParameter);
        }
        if self.map_bits < 8 || self.map_bits > 20 {
            return Err(Error::InvalidParameter);
        }
        if self.len_bits < 4 || self.len_bits > 8 {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
    /// size of the sliding window in bytes
    pub fn window(&self) -> usize {
        1 << self.win_bits
    }
    /// number of slots in the phrase dictionary
    pub fn map_slots(&self) -> usize {
        1 << self.map_bits
    }
    /// number of leaves in the match length alphabet
    pub fn len_symbols(&self) -> usize {
        1 << self.len_bits
    }
    /// base used for variable width number coding of escaped lengths
    pub fn number_base(&self) -> u32 {
        ((self.win_bits - 4) / 2) as u32
    }
}

#[test]
fn params_validation() {
    assert!(STD_PARAMS.validate().is_ok());
    let bad = Params { win_bits: 9, ..STD_PARAMS };
    assert!(matches!(bad.validate(),Err(Error::InvalidParameter)));
    let bad = Params { win_bits: 21, ..STD_PARAMS };
    assert!(matches!(bad.validate(),Err(Error::InvalidParameter)));
    let bad = Params { map_bits: 7, ..STD_PARAMS };
    assert!(matches!(bad.validate(),Err(Error::InvalidParameter)));
    let bad = Params { len_bits: 9, ..STD_PARAMS };
    assert!(matches!(bad.validate(),Err(Error::InvalidParameter)));
}

#[test]
fn number_base() {
    assert_eq!(Params { win_bits: 10, ..STD_PARAMS }.number_base(),3);
    assert_eq!(Params { win_bits: 11, ..STD_PARAMS }.number_base(),3);
    assert_eq!(Params { win_bits: 20, ..STD_PARAMS }.number_base(),8);
}
