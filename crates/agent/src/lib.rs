//! Turn execution — the heart of RagRelay.
//!
//! One chat turn flows through:
//!
//! 1. **Load** the agent config and bind its toolsets as tool adapters
//! 2. **Assemble context**: standalone-question rewrite, embedding, bounded
//!    fan-out search over the agent's knowledge bases, rendering
//! 3. **Call the model** with the agent prompt plus context, dispatching
//!    requested tool calls and looping until a text answer arrives
//! 4. **Deliver** either a final [`ExecutionResult`](ragrelay_core::ExecutionResult)
//!    or a stream of [`StreamEvent`]s ending in exactly one `end_turn`

pub mod context;
pub mod engine;
pub mod fanout;
pub mod orchestrator;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ContextAssembler, render_context};
pub use engine::{CompletionHook, ExecutionEngine, TurnStream};
pub use fanout::{FanOutResults, bounded_fan_out};
pub use orchestrator::TurnOrchestrator;
pub use stream_event::{StreamEvent, StreamMessage};
