//! Pipeline stages for restoring images to reader pages.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! mapping ──▶ job ──▶ markup ──▶ patch
//! (archive)  (soffice) (cleanup)  (splice + copy)
//!              ▲         ▲
//!           profile    naming
//! ```
//!
//! 1. [`mapping`]: pair reader pages with their source documents and build
//!    the work list
//! 2. [`profile`]: lend each running converter its own user profile
//! 3. [`job`]:     run one converter process with a timeout and collect
//!    its HTML and images
//! 4. [`naming`]:  deterministic `imgNNN.ext` names
//! 5. [`markup`]:  regex cleanup of the converter's HTML body
//! 6. [`patch`]:   copy images and splice the fragment into the page

pub mod job;
pub mod mapping;
pub mod markup;
pub mod naming;
pub mod patch;
pub mod profile;
