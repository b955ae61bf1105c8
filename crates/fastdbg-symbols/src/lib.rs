//! fastdbg-symbols — memory layout recovery from compiler artifacts.
//!
//! Reads the assembler listing and the label file the compiler leaves
//! next to the program and produces the variable table, the
//! line/address maps and the addresses of the debug hooks.

pub mod error;
pub mod labels;
pub mod listing;
pub mod resolve;
pub mod variable;

pub use error::ResolveError;
pub use labels::{ControlAddresses, LineMap};
pub use resolve::{resolve, Symbols};
pub use variable::{VarValue, Variable, LARGE_ARRAY_THRESHOLD};
