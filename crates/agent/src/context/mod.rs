//! Retrieval-augmented context for one turn.
//!
//! | Step | Collaborator | Failure |
//! |------|--------------|---------|
//! | Standalone-question rewrite | rewrite model | fails the turn |
//! | Embedding | embedding provider | fails the turn |
//! | Per-knowledge-base search | vector store, via bounded fan-out | isolated, see [`FailurePolicy`](ragrelay_config::FailurePolicy) |
//! | File resolution | file store | fails the turn |
//! | Rendering | none | infallible |

pub mod assembler;
pub mod render;
pub mod standalone;

pub use assembler::ContextAssembler;
pub use render::render_context;
