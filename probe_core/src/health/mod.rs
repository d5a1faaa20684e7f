pub mod checker;
pub mod checks;
pub mod probe;
pub mod registry;
pub mod results;


pub use checker::{HealthChecker, RunOptions};
pub use checks::{DatabaseProbe, DiskSpaceProbe, FilesystemProbe, TcpProbe};
pub use probe::{CallableProbe, CheckOutcome, IntoCheckOutcome, Probe, Verdict};
pub use registry::{Groups, ProbeOptions, ProbeRegistry};
pub use results::{HealthCheckResult, Info, ProbeResult};
