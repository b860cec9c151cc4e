pub mod bitstream;
pub mod adaptive_huff;
pub mod phrase_map;
pub mod matcher;
