//! Engine boundary + EngineLoader
//!
//! The text-analysis engine is an external collaborator with three stateless
//! operations. Every call site gets a `Result<_, AnalysisError>` so a single
//! bad text leaf can be logged and skipped by the walker.
//!
//! Loading never fails loudly: a loader reports [`Loaded::Unavailable`] when
//! the engine cannot be instantiated in the current context (a restrictive
//! page CSP blocking WebAssembly, typically).

pub mod remote;

pub use remote::{EngineRequest, EngineResponse, RemoteEngine};

use std::fmt;

use crate::diagnostic::Diagnostic;
use crate::protocol::DeliveryError;
use crate::rules::RuleStates;

/// Failure of one engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The engine threw for this input
    Engine(String),
    /// Engine output did not match the expected shape
    Decode(String),
    /// Remote engine could not be reached
    Delivery(DeliveryError),
    /// Remote engine is not instantiated either
    Unavailable(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Engine(msg) => write!(f, "Engine error: {}", msg),
            AnalysisError::Decode(msg) => write!(f, "Malformed engine output: {}", msg),
            AnalysisError::Delivery(e) => write!(f, "Remote engine unreachable: {}", e),
            AnalysisError::Unavailable(reason) => write!(f, "Engine unavailable: {}", reason),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<DeliveryError> for AnalysisError {
    fn from(e: DeliveryError) -> Self {
        AnalysisError::Delivery(e)
    }
}

/// External text-analysis engine
#[allow(async_fn_in_trait)]
pub trait Engine {
    async fn scan(&self, text: &str, rules: &RuleStates) -> Result<Vec<Diagnostic>, AnalysisError>;

    async fn fix(&self, text: &str, rules: &RuleStates) -> Result<String, AnalysisError>;

    /// Whole-text monotonic transform
    async fn normalize(&self, text: &str) -> Result<String, AnalysisError>;
}

/// Result of trying to instantiate an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded<E> {
    Ready(E),
    Unavailable(String),
}

impl<E> Loaded<E> {
    pub fn ready(self) -> Option<E> {
        match self {
            Loaded::Ready(engine) => Some(engine),
            Loaded::Unavailable(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Loaded::Ready(_))
    }
}

/// Instantiates the engine in the current context
#[allow(async_fn_in_trait)]
pub trait EngineLoader {
    type Engine: Engine;

    /// Never retries; failures become `Loaded::Unavailable`
    async fn load(&self) -> Loaded<Self::Engine>;
}

/// Either a locally instantiated engine or the background fallback
pub enum ActiveEngine<'a, E, B> {
    Local(E),
    Remote(RemoteEngine<'a, B>),
}

impl<E, B> Engine for ActiveEngine<'_, E, B>
where
    E: Engine,
    B: crate::protocol::MessageBus,
{
    async fn scan(&self, text: &str, rules: &RuleStates) -> Result<Vec<Diagnostic>, AnalysisError> {
        match self {
            ActiveEngine::Local(engine) => engine.scan(text, rules).await,
            ActiveEngine::Remote(engine) => engine.scan(text, rules).await,
        }
    }

    async fn fix(&self, text: &str, rules: &RuleStates) -> Result<String, AnalysisError> {
        match self {
            ActiveEngine::Local(engine) => engine.fix(text, rules).await,
            ActiveEngine::Remote(engine) => engine.fix(text, rules).await,
        }
    }

    async fn normalize(&self, text: &str) -> Result<String, AnalysisError> {
        match self {
            ActiveEngine::Local(engine) => engine.normalize(text).await,
            ActiveEngine::Remote(engine) => engine.normalize(text).await,
        }
    }
}
