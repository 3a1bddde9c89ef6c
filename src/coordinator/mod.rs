//! ContentCoordinator: action dispatch for a page's content context
//!
//! # Pipelines
//! Every action clears existing markers before touching text, which makes
//! each one idempotent at the document level. The engine is acquired first so
//! an unavailable engine leaves the document untouched:
//! - `Scan`:      load engine → clear → read config → scan + render each text leaf
//! - `Normalize`: load engine → clear → rewrite each leaf with `normalize` → scan
//! - `Fix`:       load engine → clear → read rules → rewrite each leaf with `fix` → scan
//! - `SetRule`:   persist the rule's new state → scan
//!
//! # Engine fallback
//! When the local loader reports the engine unavailable and a message bus to
//! the background worker is configured, engine calls are proxied there
//! through [`RemoteEngine`]. Without a fallback the pipeline stops before any
//! engine call and acknowledges `unavailable`.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::{ConfigStore, Configuration, KeyValueStore, StoreError};
use crate::diagnostic::Diagnostic;
use crate::dom::{Document, DomError};
use crate::engine::{ActiveEngine, Engine, EngineLoader, Loaded, RemoteEngine};
use crate::protocol::{Ack, ActionMessage, MessageBus, NoBus};
use crate::remove::remove_highlights;
use crate::render::render_diagnostics;
use crate::rules::RuleCode;
use crate::walker::{walk, NodeError, WalkReport};

// =============================================================================
// Types
// =============================================================================

/// Observability counters for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Scan traversal
    pub walk: WalkReport,
    /// Text rewrite traversal (Normalize/Fix only)
    pub rewrite: Option<WalkReport>,
    pub markers: usize,
    /// Diagnostic groups dropped as malformed or overlapping
    pub dropped: usize,
    /// Diagnostics returned per kind
    pub counts: BTreeMap<RuleCode, usize>,
    pub elapsed_us: u64,
}

impl ScanReport {
    pub fn total_diagnostics(&self) -> usize {
        self.counts.values().sum()
    }
}

/// How a pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Completed(ScanReport),
    /// No engine in this context nor in the background
    Unavailable(String),
}

/// Failure that aborts a whole pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Existing markers could not be cleared
    Clear(DomError),
    /// Rule state could not be persisted
    Store(StoreError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Clear(e) => write!(f, "Could not clear highlights: {}", e),
            PipelineError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::Store(e)
    }
}

// =============================================================================
// ContentCoordinator
// =============================================================================

/// Owns a document and runs action pipelines against it
pub struct ContentCoordinator<D: Document, L, S, B = NoBus> {
    document: D,
    root: D::Node,
    loader: L,
    config: ConfigStore<S>,
    fallback: Option<B>,
    last_report: Option<ScanReport>,
}

impl<D, L, S> ContentCoordinator<D, L, S, NoBus>
where
    D: Document,
    L: EngineLoader,
    S: KeyValueStore,
{
    /// Coordinator scanning everything under `root`, without background fallback
    pub fn new(document: D, root: D::Node, loader: L, store: S) -> Self {
        Self {
            document,
            root,
            loader,
            config: ConfigStore::new(store),
            fallback: None,
            last_report: None,
        }
    }
}

impl<D, L, S, B> ContentCoordinator<D, L, S, B>
where
    D: Document,
    L: EngineLoader,
    S: KeyValueStore,
    B: MessageBus,
{
    /// Proxy engine calls to the background when local loading fails
    pub fn with_fallback<B2: MessageBus>(self, bus: B2) -> ContentCoordinator<D, L, S, B2> {
        ContentCoordinator {
            document: self.document,
            root: self.root,
            loader: self.loader,
            config: self.config,
            fallback: Some(bus),
            last_report: self.last_report,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn root(&self) -> &D::Node {
        &self.root
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn config(&self) -> &ConfigStore<S> {
        &self.config
    }

    /// Counters of the last completed pipeline
    pub fn last_report(&self) -> Option<&ScanReport> {
        self.last_report.as_ref()
    }

    /// Decode and dispatch a raw message
    pub async fn handle_message(&mut self, message: serde_json::Value) -> Ack {
        match ActionMessage::from_value(message) {
            Ok(action) => self.dispatch(action).await,
            Err(name) => {
                log::warn!("[coordinator] Unknown action received: {}", name);
                Ack::unknown(&name)
            }
        }
    }

    pub async fn dispatch(&mut self, message: ActionMessage) -> Ack {
        let kind = message.kind();
        log::info!("[coordinator] Running {}...", kind);

        let status = match message {
            ActionMessage::Scan => self.scan().await,
            ActionMessage::Normalize => self.normalize().await,
            ActionMessage::Fix => self.fix().await,
            ActionMessage::SetRule { rule, enabled } => self.set_rule(rule, enabled).await,
        };

        match status {
            Ok(PipelineStatus::Completed(report)) => {
                self.last_report = Some(report);
                Ack::finished(kind)
            }
            Ok(PipelineStatus::Unavailable(reason)) => {
                log::warn!("[coordinator] {} skipped, engine unavailable: {}", kind, reason);
                Ack::unavailable(kind, &reason)
            }
            Err(e) => {
                log::error!("[coordinator] {} failed: {}", kind, e);
                Ack::failed(kind, e)
            }
        }
    }

    /// Remove every marker under the root
    pub fn clear(&mut self) -> Result<usize, PipelineError> {
        clear_markers(&mut self.document, &self.root)
    }

    pub async fn scan(&mut self) -> Result<PipelineStatus, PipelineError> {
        let engine = match acquire(&self.loader, self.fallback.as_ref()).await {
            Loaded::Ready(engine) => engine,
            Loaded::Unavailable(reason) => return Ok(PipelineStatus::Unavailable(reason)),
        };
        clear_markers(&mut self.document, &self.root)?;
        let config = self.config.load_or_default().await;
        let report = scan_pass(&mut self.document, &self.root, &engine, &config).await;
        Ok(PipelineStatus::Completed(report))
    }

    pub async fn normalize(&mut self) -> Result<PipelineStatus, PipelineError> {
        let engine = match acquire(&self.loader, self.fallback.as_ref()).await {
            Loaded::Ready(engine) => engine,
            Loaded::Unavailable(reason) => return Ok(PipelineStatus::Unavailable(reason)),
        };
        clear_markers(&mut self.document, &self.root)?;

        let engine_ref = &engine;
        let rewrite = rewrite_pass(&mut self.document, &self.root, move |text: String| async move {
            engine_ref.normalize(&text).await
        })
        .await;

        let config = self.config.load_or_default().await;
        let mut report = scan_pass(&mut self.document, &self.root, &engine, &config).await;
        report.rewrite = Some(rewrite);
        Ok(PipelineStatus::Completed(report))
    }

    pub async fn fix(&mut self) -> Result<PipelineStatus, PipelineError> {
        let engine = match acquire(&self.loader, self.fallback.as_ref()).await {
            Loaded::Ready(engine) => engine,
            Loaded::Unavailable(reason) => return Ok(PipelineStatus::Unavailable(reason)),
        };
        clear_markers(&mut self.document, &self.root)?;

        let rules = self.config.load_or_default().await.rule_states;
        let (engine_ref, rules_ref) = (&engine, &rules);
        let rewrite = rewrite_pass(&mut self.document, &self.root, move |text: String| async move {
            engine_ref.fix(&text, rules_ref).await
        })
        .await;

        let config = self.config.load_or_default().await;
        let mut report = scan_pass(&mut self.document, &self.root, &engine, &config).await;
        report.rewrite = Some(rewrite);
        Ok(PipelineStatus::Completed(report))
    }

    /// Persist a rule state (toggle when `enabled` is absent), then rescan
    pub async fn set_rule(
        &mut self,
        rule: RuleCode,
        enabled: Option<bool>,
    ) -> Result<PipelineStatus, PipelineError> {
        let enabled = match enabled {
            Some(enabled) => {
                self.config.set_rule(rule, enabled).await?;
                enabled
            }
            None => self.config.toggle_rule(rule).await?,
        };
        log::info!("[coordinator] Rule {} set to {}", rule, enabled);
        self.scan().await
    }
}

// =============================================================================
// Pipeline steps
// =============================================================================

fn clear_markers<D: Document>(doc: &mut D, root: &D::Node) -> Result<usize, PipelineError> {
    remove_highlights(doc, root).map_err(PipelineError::Clear)
}

/// Local engine, else the background one, else the reason neither works
async fn acquire<'a, L, B>(
    loader: &L,
    fallback: Option<&'a B>,
) -> Loaded<ActiveEngine<'a, L::Engine, B>>
where
    L: EngineLoader,
    B: MessageBus,
{
    let reason = match loader.load().await {
        Loaded::Ready(engine) => return Loaded::Ready(ActiveEngine::Local(engine)),
        Loaded::Unavailable(reason) => reason,
    };
    log::warn!(
        "[coordinator] Failed to init engine in content context ({}). Probably CSP of the page has restricted wasm loading.",
        reason
    );

    let Some(bus) = fallback else {
        return Loaded::Unavailable(reason);
    };
    match RemoteEngine::connect(bus).await {
        Loaded::Ready(remote) => {
            log::info!("[coordinator] Using background engine");
            Loaded::Ready(ActiveEngine::Remote(remote))
        }
        Loaded::Unavailable(remote_reason) => {
            Loaded::Unavailable(format!("{}; background: {}", reason, remote_reason))
        }
    }
}

/// Scan every text leaf and render its diagnostics
async fn scan_pass<D: Document, E: Engine>(
    doc: &mut D,
    root: &D::Node,
    engine: &E,
    config: &Configuration,
) -> ScanReport {
    let started = instant::Instant::now();
    log::info!("[coordinator] Running scan with color: {}", config.selected_color);

    let rules = &config.rule_states;
    let color = &config.selected_color;
    let mut report = ScanReport::default();
    let counts = &mut report.counts;
    let mut markers = 0;
    let mut dropped = 0;

    let walked = walk(
        doc,
        root,
        move |text: String| async move { engine.scan(&text, rules).await },
        |doc: &mut D, node: &D::Node, diagnostics: Vec<Diagnostic>| -> Result<(), NodeError> {
            for diagnostic in &diagnostics {
                *counts.entry(diagnostic.kind).or_insert(0) += 1;
            }
            if diagnostics.is_empty() {
                return Ok(());
            }
            let rendered = render_diagnostics(doc, node, color, &diagnostics)?;
            markers += rendered.markers;
            dropped += rendered.dropped;
            Ok(())
        },
    )
    .await;

    report.walk = walked;
    report.markers = markers;
    report.dropped = dropped;
    report.elapsed_us = started.elapsed().as_micros() as u64;
    log::info!("[coordinator] Diagnostic counter {:?}", report.counts);
    report
}

/// Replace every text leaf with the engine's rewritten text
async fn rewrite_pass<D, A, Fut>(doc: &mut D, root: &D::Node, rewrite: A) -> WalkReport
where
    D: Document,
    A: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<String, crate::engine::AnalysisError>>,
{
    walk(doc, root, rewrite, |doc: &mut D, node: &D::Node, text: String| -> Result<(), NodeError> {
        if doc.text_content(node) != text {
            doc.set_text_content(node, &text)?;
        }
        Ok(())
    })
    .await
}
