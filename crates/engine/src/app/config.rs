use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("buffer_size must be within 1..={max}, got {value}")]
    BufferSize { value: usize, max: usize },
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        value: f64,
        min: f64,
    },
    #[error("key mapping for action {action:?} has no valid key identifiers")]
    EmptyMapping { action: String },
    #[error("canvas size must be non-zero, got {width}x{height}")]
    CanvasSize { width: u32, height: u32 },
}

pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_positive_rejects_zero_negative_and_nan() {
        assert!(require_positive("step", 0.0).is_err());
        assert!(require_positive("step", -1.0).is_err());
        assert!(require_positive("step", f64::NAN).is_err());
        assert_eq!(require_positive("step", 2.5), Ok(2.5));
    }
}
