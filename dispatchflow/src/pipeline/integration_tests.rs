//! End-to-end tests for pipeline dispatch.

#[cfg(test)]
mod tests {
    use crate::config::PipelineConfig;
    use crate::context::{keys, Parameters, RequestContext, ResponseContext};
    use crate::core::ErrorKind;
    use crate::errors::ResponseError;
    use crate::handlers::{HandlerDescriptor, InMemoryHandlerRegistry, ParamType, ParameterSchema};
    use crate::interceptors::{ExecutionInterceptor, Interceptor, Next, RetryInterceptor};
    use crate::observability::{InMemoryMetrics, UNRESOLVED_HANDLER};
    use crate::pipeline::{Pipeline, PipelineBuilder};
    use crate::testing::{
        assert_error_kind, assert_metadata, assert_success, assert_violations, echo_handler,
        FailingHandler, RecordingHandler, SlowHandler,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => Parameters::new(),
        }
    }

    fn request(handler: &str, parameters: Value) -> RequestContext {
        RequestContext::new(handler, params(parameters)).unwrap()
    }

    fn standard(registry: InMemoryHandlerRegistry, config: PipelineConfig) -> Pipeline {
        PipelineBuilder::standard(config, Arc::new(registry))
            .build()
            .unwrap()
    }

    fn echo_pipeline() -> Pipeline {
        let registry = InMemoryHandlerRegistry::new();
        registry.register(echo_handler());
        standard(registry, PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_echo_success() {
        let pipeline = echo_pipeline();
        let ctx = request("echo", json!({"text": "hi"}));
        let id = ctx.id().to_string();

        let response = pipeline.dispatch(ctx).await;

        assert_eq!(assert_success(&response), &json!("hi"));
        assert_eq!(response.request_id(), id);
        assert_eq!(response.metadata_value(keys::RESOLVED_HANDLER), Some(&json!("echo")));
        assert_eq!(response.metadata_value(keys::VALIDATION), Some(&json!("passed")));
        assert_eq!(response.metadata_value(keys::OUTCOME), Some(&json!("success")));
        assert_metadata(&response, keys::TRACE_ID);
        assert_metadata(&response, keys::DURATION_MS);
        assert!(response.metadata_value(keys::FAILED_STAGE).is_none());
    }

    #[tokio::test]
    async fn test_echo_missing_text() {
        let pipeline = echo_pipeline();

        let response = pipeline.dispatch(request("echo", json!({}))).await;

        assert_violations(&response, &["text"]);
        assert_eq!(response.error().unwrap().error_name(), "ValidationError");
        assert_eq!(response.metadata_value(keys::FAILED_STAGE), Some(&json!("validating")));
        assert_eq!(response.metadata_value(keys::OUTCOME), Some(&json!("validation")));
    }

    #[tokio::test]
    async fn test_echo_unknown_handler() {
        let pipeline = echo_pipeline();

        let response = pipeline.dispatch(request("missing", json!({}))).await;

        assert_error_kind(&response, ErrorKind::NotFound);
        assert_eq!(response.error().unwrap().error_name(), "RoutingError");
        assert_eq!(response.metadata_value(keys::FAILED_STAGE), Some(&json!("routing")));
    }

    #[tokio::test]
    async fn test_rejected_requests_never_invoke_handler() {
        let handler = RecordingHandler::new();
        let registry = InMemoryHandlerRegistry::new();
        registry.register(handler.descriptor(
            "rec",
            ParameterSchema::new().required("n", ParamType::Integer),
        ));
        let pipeline = standard(registry, PipelineConfig::default());

        let bad_type = pipeline.dispatch(request("rec", json!({"n": "one"}))).await;
        let unknown = pipeline.dispatch(request("other", json!({"n": 1}))).await;

        assert_error_kind(&bad_type, ErrorKind::Validation);
        assert_error_kind(&unknown, ErrorKind::NotFound);
        assert_eq!(handler.call_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_validation_from_config() {
        let registry = InMemoryHandlerRegistry::new();
        registry.register(echo_handler());
        let pipeline = standard(registry, PipelineConfig::default().with_strict_validation(true));

        let response = pipeline
            .dispatch(request("echo", json!({"text": "hi", "loud": true})))
            .await;

        assert_violations(&response, &["loud"]);
    }

    #[tokio::test]
    async fn test_alias_and_pattern_routing() {
        let registry = InMemoryHandlerRegistry::new();
        registry.register(echo_handler());
        registry.register_alias("say", "echo").unwrap();
        registry.register_pattern(r"echo\.v[0-9]+", "echo").unwrap();
        let pipeline = standard(registry, PipelineConfig::default());

        for name in ["say", "echo.v2"] {
            let response = pipeline.dispatch(request(name, json!({"text": name}))).await;
            assert_eq!(assert_success(&response), &json!(name));
            assert_eq!(response.metadata_value(keys::RESOLVED_HANDLER), Some(&json!("echo")));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatches_do_not_cross_contaminate() {
        let pipeline = echo_pipeline();

        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    let text = format!("message-{i}");
                    let trace = format!("trace-{i}");
                    let ctx = request("echo", json!({"text": text}))
                        .with_metadata(keys::TRACE_ID, json!(trace));
                    let id = ctx.id().to_string();
                    let response = pipeline.dispatch(ctx).await;
                    (id, text, trace, response)
                })
            })
            .collect();

        for task in tasks {
            let (id, text, trace, response) = task.await.unwrap();
            assert_eq!(response.request_id(), id);
            assert_eq!(response.payload(), Some(&json!(text)));
            assert_eq!(response.trace_id(), Some(trace.as_str()));
        }
    }

    #[tokio::test]
    async fn test_timeout_within_deadline() {
        let slow = SlowHandler::new(Duration::from_millis(500));
        let registry = InMemoryHandlerRegistry::new();
        registry.register(slow.descriptor("slow"));
        let pipeline = standard(registry, PipelineConfig::default().with_timeout_ms(50));

        let started = Instant::now();
        let response = pipeline.dispatch(request("slow", json!({}))).await;
        let elapsed = started.elapsed();

        assert_error_kind(&response, ErrorKind::Timeout);
        assert_eq!(response.error().unwrap().error_name(), "TimeoutError");
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");
        assert_eq!(response.metadata_value(keys::FAILED_STAGE), Some(&json!("executing")));
    }

    #[tokio::test]
    async fn test_orphaned_handler_is_tracked_until_it_finishes() {
        let slow = SlowHandler::new(Duration::from_millis(150));
        let registry = InMemoryHandlerRegistry::new();
        registry.register(slow.descriptor("slow"));
        let pipeline = standard(registry, PipelineConfig::default().with_timeout_ms(20));
        let orphans = pipeline.orphans().unwrap();

        let response = pipeline.dispatch(request("slow", json!({}))).await;

        assert_error_kind(&response, ErrorKind::Timeout);
        assert_eq!(orphans.in_flight(), 1);
        assert_eq!(slow.finished(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(slow.finished(), 1);
        assert_eq!(orphans.in_flight(), 0);
        assert_eq!(orphans.total_settled(), 1);
    }

    #[tokio::test]
    async fn test_retried_timeouts_are_tracked_separately() {
        let slow = SlowHandler::new(Duration::from_millis(150));
        let registry = InMemoryHandlerRegistry::new();
        registry.register(slow.descriptor("slow"));
        let pipeline = PipelineBuilder::standard(
            PipelineConfig::default().with_timeout_ms(20),
            Arc::new(registry),
        )
        .insert_before_terminal(Arc::new(RetryInterceptor::constant(2, Duration::from_millis(1))))
        .build()
        .unwrap();
        let orphans = pipeline.orphans().unwrap();

        let response = pipeline.dispatch(request("slow", json!({}))).await;

        assert_error_kind(&response, ErrorKind::Timeout);
        assert_eq!(response.metadata_value(keys::ATTEMPTS), Some(&json!(2)));
        assert_eq!(slow.started(), 2);
        assert_eq!(orphans.total_orphaned(), 2);
        assert_eq!(orphans.in_flight(), 2);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(slow.finished(), 2);
        assert_eq!(orphans.in_flight(), 0);
        assert_eq!(orphans.total_settled(), 2);
    }

    #[tokio::test]
    async fn test_dropped_dispatch_cancels_handler() {
        let slow = SlowHandler::cooperative(Duration::from_millis(300));
        let registry = InMemoryHandlerRegistry::new();
        registry.register(slow.descriptor("coop"));
        let pipeline = standard(registry, PipelineConfig::default().with_timeout_ms(5000));
        let orphans = pipeline.orphans().unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            pipeline.dispatch(request("coop", json!({}))),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(slow.started(), 1);
        assert_eq!(slow.finished(), 0);
        assert_eq!(orphans.total_orphaned(), 1);
        assert_eq!(orphans.in_flight(), 0);

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(slow.finished(), 0);
    }

    #[tokio::test]
    async fn test_routing_misses_do_not_grow_handler_counts() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let registry = InMemoryHandlerRegistry::new();
        registry.register(echo_handler());
        let pipeline = PipelineBuilder::standard_with_metrics(
            PipelineConfig::default(),
            Arc::new(registry),
            metrics.clone(),
        )
        .build()
        .unwrap();

        for i in 0..20 {
            let response = pipeline.dispatch(request(&format!("ghost-{i}"), json!({}))).await;
            assert_error_kind(&response, ErrorKind::NotFound);
        }
        pipeline.dispatch(request("echo", json!({"text": "a"}))).await;

        assert_eq!(metrics.count_for(UNRESOLVED_HANDLER), 20);
        assert_eq!(metrics.count_for("ghost-3"), 0);
        assert_eq!(metrics.count_for("echo"), 1);
    }

    #[tokio::test]
    async fn test_cooperative_handler_stops_on_timeout() {
        let slow = SlowHandler::cooperative(Duration::from_secs(10));
        let registry = InMemoryHandlerRegistry::new();
        registry.register(slow.descriptor("coop"));
        let pipeline = standard(registry, PipelineConfig::default().with_timeout_ms(20));

        let response = pipeline.dispatch(request("coop", json!({}))).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_error_kind(&response, ErrorKind::Timeout);
        assert_eq!(slow.started(), 1);
        assert_eq!(slow.finished(), 0);
        assert_eq!(pipeline.orphans().unwrap().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_all_calling_conventions() {
        let registry = InMemoryHandlerRegistry::new();
        registry.register(HandlerDescriptor::blocking("sync", ParameterSchema::new(), |_, _| {
            Ok(json!("blocking"))
        }));
        registry.register(HandlerDescriptor::suspendable("async", ParameterSchema::new(), |_, _| async {
            tokio::task::yield_now().await;
            Ok::<_, anyhow::Error>(json!("suspendable"))
        }));
        registry.register(RecordingHandler::returning(json!("stateful")).descriptor("object", ParameterSchema::new()));
        let pipeline = standard(registry, PipelineConfig::default());

        for (name, expected) in [
            ("sync", "blocking"),
            ("async", "suspendable"),
            ("object", "stateful"),
        ] {
            let response = pipeline.dispatch(request(name, json!({}))).await;
            assert_eq!(assert_success(&response), &json!(expected));
        }
    }

    #[tokio::test]
    async fn test_handler_error_carries_cause() {
        let registry = InMemoryHandlerRegistry::new();
        registry.register(FailingHandler::with_context("connection reset", "upstream call failed").descriptor("flaky"));
        let pipeline = standard(registry, PipelineConfig::default());

        let response = pipeline.dispatch(request("flaky", json!({}))).await;

        assert_error_kind(&response, ErrorKind::Execution);
        let error = response.error().unwrap();
        assert_eq!(error.message, "upstream call failed");
        assert_eq!(error.cause.as_deref(), Some("upstream call failed: connection reset"));
        assert_eq!(
            response.metadata_value(keys::CAUSE),
            Some(&json!(["upstream call failed", "connection reset"]))
        );
    }

    #[tokio::test]
    async fn test_metrics_recorded_for_every_outcome() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let registry = InMemoryHandlerRegistry::new();
        registry.register(echo_handler());
        let pipeline = PipelineBuilder::standard_with_metrics(
            PipelineConfig::default().with_sampling_rate(0.0),
            Arc::new(registry),
            metrics.clone(),
        )
        .build()
        .unwrap();

        pipeline.dispatch(request("echo", json!({"text": "a"}))).await;
        pipeline.dispatch(request("echo", json!({}))).await;
        pipeline.dispatch(request("nope", json!({}))).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.failed(ErrorKind::Validation), 1);
        assert_eq!(snapshot.failed(ErrorKind::NotFound), 1);
        assert_eq!(snapshot.sampled, 0);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_timeout() {
        let calls = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&calls);
        let registry = InMemoryHandlerRegistry::new();
        registry.register(HandlerDescriptor::suspendable("once_slow", ParameterSchema::new(), move |_, _| {
            let counter = Arc::clone(&counter);
            async move {
                let attempt = {
                    let mut calls = counter.lock();
                    *calls += 1;
                    *calls
                };
                if attempt == 1 {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Ok::<_, anyhow::Error>(json!(attempt))
            }
        }));
        let pipeline = PipelineBuilder::standard(
            PipelineConfig::default().with_timeout_ms(30),
            Arc::new(registry),
        )
        .insert_before_terminal(Arc::new(RetryInterceptor::constant(3, Duration::from_millis(1))))
        .build()
        .unwrap();

        let response = pipeline.dispatch(request("once_slow", json!({}))).await;

        assert_eq!(assert_success(&response), &json!(2));
        assert_eq!(response.metadata_value(keys::ATTEMPTS), Some(&json!(2)));
        assert_eq!(*calls.lock(), 2);
    }

    /// Records `>name` before calling next and `<name` after.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        short_circuit: bool,
    }

    #[async_trait]
    impl Interceptor for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn intercept(&self, ctx: RequestContext, next: Next<'_>) -> ResponseContext {
            self.log.lock().push(format!(">{}", self.name));
            if self.short_circuit {
                return ResponseContext::failure(
                    ctx.id(),
                    ResponseError::new(ErrorKind::Validation, format!("stopped by {}", self.name)),
                );
            }
            let response = next.run(ctx).await;
            self.log.lock().push(format!("<{}", self.name));
            response
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, short_circuit: bool) -> Arc<dyn Interceptor> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            short_circuit,
        })
    }

    fn custom(interceptors: Vec<Arc<dyn Interceptor>>) -> Pipeline {
        interceptors
            .into_iter()
            .fold(PipelineBuilder::new(PipelineConfig::default()), PipelineBuilder::add_interceptor)
            .add_interceptor(Arc::new(ExecutionInterceptor::new(Duration::from_secs(1))))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_stack_discipline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = custom(vec![
            recorder("a", &log, false),
            recorder("b", &log, false),
            recorder("c", &log, false),
        ]);

        let response = pipeline.dispatch(request("h", json!({}))).await;

        // No router ran, so execution reports the missing descriptor.
        assert_error_kind(&response, ErrorKind::Execution);
        assert_eq!(*log.lock(), vec![">a", ">b", ">c", "<c", "<b", "<a"]);
    }

    #[tokio::test]
    async fn test_first_short_circuit_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = custom(vec![
            recorder("outer", &log, false),
            recorder("first", &log, true),
            recorder("second", &log, true),
        ]);

        let response = pipeline.dispatch(request("h", json!({}))).await;

        assert_eq!(response.error().unwrap().message, "stopped by first");
        assert_eq!(*log.lock(), vec![">outer", ">first", "<outer"]);
    }

    struct Panicking;

    #[async_trait]
    impl Interceptor for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn intercept(&self, _ctx: RequestContext, _next: Next<'_>) -> ResponseContext {
            panic!("interceptor bug")
        }
    }

    #[tokio::test]
    async fn test_panicking_interceptor_is_contained() {
        let pipeline = custom(vec![Arc::new(Panicking)]);
        let ctx = request("h", json!({}));
        let id = ctx.id().to_string();

        let response = pipeline.dispatch(ctx).await;

        assert_error_kind(&response, ErrorKind::Execution);
        assert_eq!(response.request_id(), id);
        assert_eq!(response.error().unwrap().cause.as_deref(), Some("interceptor bug"));
    }

    struct WrongId;

    #[async_trait]
    impl Interceptor for WrongId {
        fn name(&self) -> &str {
            "wrong_id"
        }

        async fn intercept(&self, _ctx: RequestContext, _next: Next<'_>) -> ResponseContext {
            ResponseContext::success("someone-else", json!(null))
        }
    }

    #[tokio::test]
    async fn test_foreign_request_id_is_restamped() {
        let pipeline = custom(vec![Arc::new(WrongId)]);
        let ctx = request("h", json!({}));
        let id = ctx.id().to_string();

        let response = pipeline.dispatch(ctx).await;

        assert_eq!(response.request_id(), id);
    }
}
