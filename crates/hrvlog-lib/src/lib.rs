pub mod config;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod session;
pub mod signal;
pub mod stats;
pub mod status;
pub mod store;

pub use config::*;
pub use error::{HrvError, Result};
pub use metrics::frequency::{frequency_domain, FrequencyDomainMetrics};
pub use metrics::spectral::{estimate_psd, Psd};
pub use metrics::time::{time_domain, TimeDomainMetrics};
pub use pipeline::{analyze, analyze_batch, SessionInput};
pub use session::*;
pub use signal::*;
pub use status::*;
pub use store::{SessionLog, SessionStore};
