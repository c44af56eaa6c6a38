//! # Quantum-Chain Test Suite
//!
//! Cross-chain integration tests for interchain accounts.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs    # Controller and host chains wired through a relayer
//!     └── ica_flows.rs  # End-to-end registration, execution and timeout flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

#![allow(dead_code)]

pub mod integration;
