//! fastdbg-codec — wire encoding for the target's native values.
//!
//! Everything on the debug channel is little-endian. Floats use the
//! target's 6-byte packed BCD layout and strings are length-prefixed.

pub mod bcd;
pub mod error;
pub mod value;

pub use bcd::{decode_float, encode_float, FLOAT_LEN};
pub use error::CodecError;
pub use value::{
    decode_string, decode_value, encode_string, encode_value, put_word, read_byte, read_bytes,
    read_word, Value, VarType, MAX_STRING_LEN,
};
