//! Pipeline builder with validation.

use super::Pipeline;
use crate::config::PipelineConfig;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::handlers::HandlerRegistry;
use crate::interceptors::{
    ExecutionInterceptor, Interceptor, InterceptorChain, ObservabilityInterceptor,
    RouterInterceptor, ValidationInterceptor,
};
use crate::observability::{MetricsSink, NoOpMetricsSink};
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Interceptors run in the order they are added. `build()` checks that the
/// chain ends in exactly one terminal interceptor.
#[derive(Clone)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    ///
    /// Interceptors added by hand carry their own settings: the config's
    /// timeout, sampling rate and strictness only take effect through
    /// [`standard`](Self::standard). For a hand-built chain the config is
    /// validated and exposed by [`Pipeline::config`], nothing more.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            interceptors: Vec::new(),
        }
    }

    /// Creates a builder with the standard chain and no metrics sink.
    ///
    /// Observability, router, validation, execution.
    #[must_use]
    pub fn standard(config: PipelineConfig, registry: Arc<dyn HandlerRegistry>) -> Self {
        Self::standard_with_metrics(config, registry, Arc::new(NoOpMetricsSink))
    }

    /// Creates a builder with the standard chain reporting to `sink`.
    #[must_use]
    pub fn standard_with_metrics(
        config: PipelineConfig,
        registry: Arc<dyn HandlerRegistry>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let execution = ExecutionInterceptor::new(config.timeout());
        let sampling_rate = config.sampling_rate;
        let strict = config.strict_validation;

        Self::new(config)
            .add_interceptor(Arc::new(ObservabilityInterceptor::new(sampling_rate, sink)))
            .add_interceptor(Arc::new(RouterInterceptor::new(registry)))
            .add_interceptor(Arc::new(ValidationInterceptor::new(strict)))
            .add_interceptor(Arc::new(execution))
    }

    /// Appends an interceptor.
    #[must_use]
    pub fn add_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Inserts an interceptor immediately before the terminal one.
    ///
    /// Appends if no terminal interceptor has been added yet.
    #[must_use]
    pub fn insert_before_terminal(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        match self.interceptors.iter().position(|i| i.is_terminal()) {
            Some(index) => self.interceptors.insert(index, interceptor),
            None => self.interceptors.push(interceptor),
        }
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the number of interceptors added so far.
    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    fn names(&self) -> Vec<String> {
        self.interceptors.iter().map(|i| i.name().to_string()).collect()
    }

    fn validate(&self) -> Result<(), PipelineValidationError> {
        if let Err(error) = self.config.validate() {
            return Err(PipelineValidationError::new(format!("Invalid configuration: {error}"))
                .with_error_info(
                    ContractErrorInfo::new("PIPELINE-CONFIG-INVALID", error.to_string())
                        .with_fix_hint("Use a positive timeout_ms and a sampling_rate within [0, 1]."),
                ));
        }

        if self.interceptors.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no interceptors")
                .with_error_info(
                    ContractErrorInfo::new("PIPELINE-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add interceptors ending with an execution stage."),
                ));
        }

        let terminals: Vec<usize> = self
            .interceptors
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_terminal())
            .map(|(index, _)| index)
            .collect();

        match terminals.as_slice() {
            [] => Err(PipelineValidationError::new("Pipeline has no terminal interceptor")
                .with_interceptors(self.names())
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-NO-TERMINAL",
                        "No interceptor produces a response without calling next",
                    )
                    .with_fix_hint("Add an ExecutionInterceptor as the last interceptor."),
                )),
            [index] if *index + 1 != self.interceptors.len() => {
                let name = self.interceptors[*index].name().to_string();
                Err(PipelineValidationError::new(format!(
                    "Terminal interceptor '{name}' must be last"
                ))
                .with_interceptors(vec![name.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-TERMINAL-NOT-LAST",
                        format!("Interceptors after '{name}' would never run"),
                    )
                    .with_fix_hint("Move the terminal interceptor to the end of the chain.")
                    .with_context_entry("position", index.to_string()),
                ))
            }
            [_] => Ok(()),
            many => {
                let names: Vec<String> = many
                    .iter()
                    .map(|index| self.interceptors[*index].name().to_string())
                    .collect();
                Err(PipelineValidationError::new(format!(
                    "Pipeline has {} terminal interceptors",
                    many.len()
                ))
                .with_interceptors(names)
                .with_error_info(
                    ContractErrorInfo::new(
                        "PIPELINE-MULTIPLE-TERMINALS",
                        "Only one interceptor may end the chain",
                    )
                    .with_fix_hint("Keep a single terminal interceptor at the end."),
                ))
            }
        }
    }

    /// Builds the pipeline.
    ///
    /// The pipeline reports timed-out calls through the terminal
    /// interceptor's orphan tracker, when it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the chain is empty,
    /// or the chain does not end in exactly one terminal interceptor.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        self.validate()?;
        let orphans = self
            .interceptors
            .last()
            .and_then(|terminal| terminal.orphan_tracker());
        Ok(Pipeline::new(
            InterceptorChain::new(self.interceptors),
            self.config,
            orphans,
        ))
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("config", &self.config)
            .field("interceptors", &self.names())
            .finish()
    }
}
