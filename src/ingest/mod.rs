//! Input side of the pipeline.
//!
//! Everything that has to be loaded before any detection work starts:
//!
//! 1. **Ledger**: which recordings were already processed
//! 2. **Environment**: telemetry indexed by corrected capture time
//! 3. **Scanner**: discovers recordings and derives their capture times
//!
//! ```text
//! analysis_tracker.txt → Ledger ─┐
//!                                ├→ Scanner → pending files
//! recordings/**/*.WAV ───────────┘
//! SUMMARY.csv → EnvironmentIndex
//! ```

pub mod environment;
pub mod ledger;
pub mod scanner;

// Re-export key types
pub use environment::{EnvironmentError, EnvironmentIndex};
pub use ledger::{Ledger, LedgerError};
pub use scanner::{ScanError, ScanResult, Scanner, ScannerConfig};
