//! # Holographic Binding
//!
//! Distributed representations via holographic reduced representations
//! (HRR) over complex vectors. Binding spreads the association of two
//! vectors across the whole spectrum: every component of the result carries
//! information about both operands.
//!
//! ## Key Concepts
//!
//! - **Bind (⊗)**: Circular convolution, combines a role and a filler
//! - **Unbind (⊘)**: Circular correlation, recovers a filler from a trace
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jules_coder::holographic::*;
//!
//! let binder = HolographicBinder::new(64)?;
//! let bound = binder.bind(&role, &filler)?;
//! let recovered = binder.unbind(&bound, &role)?;
//! // recovered ≈ filler
//! ```
//!
//! ## Reference
//!
//! Tony Plate, "Holographic Reduced Representations" (1995)

pub mod ops;

pub use ops::{cosine_similarity, HolographicBinder};
