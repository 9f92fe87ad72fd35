//! Run, span, and request id generation.
//!
//! Ids are short, log-friendly strings: a type prefix plus a random suffix.
//! Run ids use a UUID for global uniqueness; span and request ids use a
//! compact random suffix since they only need to be unique within one run.

use rand::Rng;
use rand::distr::Alphanumeric;
use uuid::Uuid;

const SPAN_SUFFIX_LEN: usize = 8;

/// Generator for the id families used by the engine.
///
/// ```
/// use warpline::utils::id_generator::IdGenerator;
///
/// let ids = IdGenerator::new();
/// let run_id = ids.generate_run_id();
/// assert!(run_id.starts_with("run-"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Globally unique run identifier.
    #[must_use]
    pub fn generate_run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }

    /// Span identifier for one branch of execution.
    #[must_use]
    pub fn generate_span_id(&self) -> String {
        format!("span-{}", self.random_suffix())
    }

    /// Identifier for one step-protocol request.
    #[must_use]
    pub fn generate_request_id(&self) -> String {
        format!("step-{}", self.random_suffix())
    }

    fn random_suffix(&self) -> String {
        let mut rng = rand::rng();
        (0..SPAN_SUFFIX_LEN)
            .map(|_| rng.sample(Alphanumeric) as char)
            .collect()
    }
}
