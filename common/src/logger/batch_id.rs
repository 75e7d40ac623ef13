use uuid::Uuid;

/// Correlation ID that follows one evaluation batch through the pipeline.
#[derive(Clone, Debug)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.as_hyphenated().fmt(f)
    }
}
