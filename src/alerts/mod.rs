//! Debounced alert lifecycle
//!
//! ```text
//!            anomalous                 elapsed >= window
//!   idle ───────────────▶ pending ───────────────────────▶ notified
//!    ▲                       │                                 │
//!    └──── normal reading ───┴──────── normal reading ─────────┘
//! ```

pub mod engine;
pub mod state;

pub use engine::{AlertEngine, Evaluation, Reading};
pub use state::{AlertKey, AlertRecord, AlertStateStore, AlertStatus, Transition};
