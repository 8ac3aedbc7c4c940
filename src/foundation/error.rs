pub type CelResult<T> = Result<T, CelError>;

#[derive(thiserror::Error, Debug)]
pub enum CelError {
    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("surface size mismatch: {0}")]
    SizeMismatch(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("allocation overflow: {0}")]
    AllocationOverflow(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CelError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn surface_unavailable(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(msg.into())
    }

    pub fn size_mismatch(msg: impl Into<String>) -> Self {
        Self::SizeMismatch(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn allocation_overflow(msg: impl Into<String>) -> Self {
        Self::AllocationOverflow(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CelError::geometry("x")
                .to_string()
                .contains("invalid geometry:")
        );
        assert!(
            CelError::surface_unavailable("x")
                .to_string()
                .contains("surface unavailable:")
        );
        assert!(
            CelError::size_mismatch("x")
                .to_string()
                .contains("size mismatch:")
        );
        assert!(CelError::cancelled("x").to_string().contains("cancelled:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CelError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
