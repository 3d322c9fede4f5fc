//! # Frame-Exchange Test Suite
//!
//! Cross-component tests that wire the coordinator, Dispatcher, router and
//! registry together the way a connection does.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs      # Simulated device and service builders
//!     ├── scenarios.rs     # Basic success / supersession / timeout scenarios
//!     ├── supersession.rs  # Same-key races and cancellation
//!     ├── transport.rs     # FIFO, write failures, disconnects, backpressure
//!     └── stress.rs        # Many senders over few keys
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fx-tests
//! cargo test -p fx-tests integration::stress::
//! ```

#![allow(dead_code)]
