//! Severity derivation fallback: used only when no enhanced severity model
//! is present in the loaded bundle.

use logintel_core::{Level, Severity};

/// `FATAL | (is_anomaly AND anomaly_score > 0.9) -> critical`;
/// `ERROR -> high`; `WARN -> medium`; else `low`.
pub fn derive_severity(level: Level, is_anomaly: bool, anomaly_score: f64) -> Severity {
    if matches!(level, Level::Fatal) || (is_anomaly && anomaly_score > 0.9) {
        Severity::Critical
    } else {
        match level {
            Level::Error => Severity::High,
            Level::Warn => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_is_always_critical() {
        assert_eq!(derive_severity(Level::Fatal, false, 0.0), Severity::Critical);
    }

    #[test]
    fn high_confidence_anomaly_is_critical_regardless_of_level() {
        assert_eq!(derive_severity(Level::Info, true, 0.95), Severity::Critical);
    }

    #[test]
    fn low_confidence_anomaly_does_not_escalate() {
        assert_eq!(derive_severity(Level::Info, true, 0.5), Severity::Low);
    }

    #[test]
    fn error_without_anomaly_is_high() {
        assert_eq!(derive_severity(Level::Error, false, 0.0), Severity::High);
    }

    #[test]
    fn warn_without_anomaly_is_medium() {
        assert_eq!(derive_severity(Level::Warn, false, 0.0), Severity::Medium);
    }

    #[test]
    fn debug_and_info_default_to_low() {
        assert_eq!(derive_severity(Level::Debug, false, 0.0), Severity::Low);
        assert_eq!(derive_severity(Level::Info, false, 0.0), Severity::Low);
    }
}
