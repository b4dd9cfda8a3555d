//! Program-file handling: the `.ls8` textual image loader and the
//! disassembler. The CPU core only ever sees raw bytes; everything here
//! exists to get bytes in and readable text out.

pub mod disasm;
pub mod image;

pub use disasm::disassemble;
pub use image::{load_image, parse_image, ImageError, ProgramImage};
