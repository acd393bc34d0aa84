pub mod access;
pub mod domain;
pub mod flow;
pub mod format;
pub mod offline;
pub mod ports;
pub mod progress;
pub mod report;
pub mod session;

pub use domain::{
    AlertLevel, AnalysisResult, CoverageAlert, DocumentType, FrequencyLimit, LabCharge, LineItem,
    NearbyLab, SessionToken, Upload, UsState, UsageCounters,
};
pub use flow::{AccessStage, FlowError, FlowPorts, FlowResult, ScanFlow, Screen, ScreenKind, ShareStatus};
pub use ports::{AnalysisService, AuthService, BillingService, PortError, PortResult, SessionStore,
    ShareService};
pub use session::MemorySessionStore;
