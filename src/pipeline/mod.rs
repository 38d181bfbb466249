//! Pipeline stages for construction-data extraction.
//!
//! Each submodule implements exactly one step. Everything except [`llm`]
//! is deterministic and can be tested without a network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ normalize ──▶ llm ──▶ recover ──▶ validate
//! (URL/path) (pdfium) (cleanup)   (1 call) (fallbacks) (shape)
//! ```
//!
//! 1. [`input`]: canonicalise the path, URL or byte buffer to a local
//!    PDF, checking magic bytes and size
//! 2. [`text`]: pull the text layer out with pdfium, in
//!    `spawn_blocking`
//! 3. [`normalize`]: strip layout noise and cap the character budget
//! 4. [`llm`]: one prompt, one answer; the only stage with network I/O
//! 5. [`recover`]: turn a messy answer into a JSON object, falling back
//!    through repair strategies to a fixed placeholder
//! 6. [`validate`]: check the object's shape and type it

pub mod input;
pub mod llm;
pub mod normalize;
pub mod recover;
pub mod text;
pub mod validate;
