mod bitpacking;

pub use bitpacking::{
    bitpack_read, bitpack_write, bits_needed_u64, bits_required, packed_len, zigzag_decode,
    zigzag_encode,
};
