use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core.
///
/// Out-of-range indices and rejected parameters are reported here instead of
/// panicking on raw indexed access. Numerical blow-up is not an error: the
/// affected mass is deleted and the event is logged.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Mass index outside the mass array.
    #[error("no mass with index {0}")]
    NoSuchMass(usize),

    /// Spring index outside the spring array.
    #[error("no spring with index {0}")]
    NoSuchSpring(usize),

    /// The reserved drag mass cannot take part in this operation.
    #[error("operation not allowed on the drag mass")]
    SentinelMass,

    /// The reserved drag spring cannot take part in this operation.
    #[error("operation not allowed on the drag spring")]
    SentinelSpring,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::InvalidParam("time_step must be > 0".to_string());
        let msg = format!("{e}");
        assert!(msg.contains("invalid parameter"));
        assert!(msg.contains("time_step"));

        let e = Error::NoSuchMass(42);
        assert!(e.to_string().contains("42"));
    }

    #[test]
    fn result_type_alias_compiles() -> Result<()> {
        Ok(())
    }
}
