//! The nImO value model: a closed, self-describing tagged union with a
//! compact binary wire format (§4.A).

mod codec;
mod text;
mod value;

pub use codec::{
    decode, encode, encode_to_vec, DecodeError, END_OF_MESSAGE, ESCAPE, START_OF_MESSAGE,
};
pub use value::{Flaw, Key, KeyKind, KeyKindMismatch, Map, Set, Value};
