//! Pipeline stages for converting one file to UTF-8.
//!
//! Each submodule implements exactly one step and is testable on its own;
//! [`crate::convert::convert_file`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! io::read ──▶ encoding ──▶ repair ──▶ io::backup/write ──▶ language ──▶ rename
//!  (bytes)     (decode)    (mojibake)    (UTF-8 on disk)     (tag)      (-fra.txt)
//! ```
//!
//! 1. [`io`]: target placement, whole-file read, `.bak` copy, atomic write
//! 2. [`encoding`]: BOM / forced label / `chardetng` guess, lossy decode
//! 3. [`repair`]: deterministic mojibake and control-character cleanup
//! 4. [`language`]: `lingua`-backed identification gated by a probability
//! 5. [`rename`]: collision-free `-<suffix>` rename that never overwrites

pub mod encoding;
pub mod io;
pub mod language;
pub mod rename;
pub mod repair;
