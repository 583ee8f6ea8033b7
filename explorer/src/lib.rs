//! Autonomous UI exploration agent.
//!
//! The explorer drives a device round by round: it observes the screen,
//! asks a reasoning service for one interaction, performs it, and asks the
//! service to judge the effect. Useful interactions are written to a
//! per-element documentation store that outlives the session.
//!
//! - **[`core`]**: Pure, deterministic logic (element extraction, reply
//!   grammars, session state). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (device, reasoning service,
//!   images, filesystem). Hidden behind traits to enable scripting in tests.
//! - **[`agents`]**: Planner and reflector exchanges with the reasoning service.
//!
//! [`explore`] coordinates all three to run one exploration session.

pub mod agents;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod explore;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
