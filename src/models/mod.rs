//! Per-model trait table, derived from the model id string.

/// Static traits of a model id that the pipeline branches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTraits {
    /// Fast/flash-tier models get one automatic continuation instead of an
    /// empty-response error.
    pub fast_tier: bool,
    /// Models that accept a raw-completion opening turn.
    pub supports_raw_mode: bool,
    /// Explicit reasoning delimiter pair, for models that wrap thoughts in
    /// tags rather than using structured thought parts.
    pub reasoning_delimiter: Option<ReasoningDelimiter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasoningDelimiter {
    pub open: &'static str,
    pub close: &'static str,
}

const THINK_DELIMITER: ReasoningDelimiter = ReasoningDelimiter {
    open: "<think>\n",
    close: "</think>",
};

/// Look up traits for a model id.
pub fn traits_for(model_id: &str) -> ModelTraits {
    let id = model_id.to_ascii_lowercase();
    let uses_think_tags = id.ends_with("-think") || id.contains("-raw");
    ModelTraits {
        fast_tier: id.contains("flash") || id.contains("-lite"),
        supports_raw_mode: uses_think_tags,
        reasoning_delimiter: uses_think_tags.then_some(THINK_DELIMITER),
    }
}

/// The continuation seed for resuming an in-progress model message: the
/// reasoning-close delimiter when the model uses one, otherwise a single
/// space so the provider resumes rather than opening a new turn.
pub fn continuation_seed(traits: &ModelTraits) -> &'static str {
    match traits.reasoning_delimiter {
        Some(d) => d.close,
        None => " ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_models_are_fast_tier() {
        assert!(traits_for("gemini-2.5-flash").fast_tier);
        assert!(traits_for("gemini-flash-lite-latest").fast_tier);
        assert!(!traits_for("gemini-2.5-pro").fast_tier);
    }

    #[test]
    fn raw_mode_requires_declared_support() {
        assert!(traits_for("local-qwq-think").supports_raw_mode);
        assert!(!traits_for("gemini-2.5-pro").supports_raw_mode);
    }

    #[test]
    fn continuation_seed_prefers_close_delimiter() {
        assert_eq!(continuation_seed(&traits_for("local-qwq-think")), "</think>");
        assert_eq!(continuation_seed(&traits_for("gemini-2.5-pro")), " ");
    }
}
