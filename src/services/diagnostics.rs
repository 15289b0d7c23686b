use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Debug,
    Warn,
}

/// Where the asset-data engine reports recovered and propagated failures.
pub trait Diagnostics: Send + Sync {
    fn record(&self, level: DiagnosticLevel, message: &str, error: &AppError);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&self, level: DiagnosticLevel, message: &str, error: &AppError) {
        match level {
            DiagnosticLevel::Debug => tracing::debug!("{} {}", message, error),
            DiagnosticLevel::Warn => tracing::warn!("{} {}", message, error),
        }
    }
}
