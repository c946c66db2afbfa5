//! Checks request parameters against the resolved handler's schema.

use super::{Interceptor, Next};
use crate::context::{keys, Parameters, RequestContext, ResponseContext};
use crate::errors::{FieldViolation, ResponseError};
use crate::handlers::{ParamType, ParameterSchema};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Field name used when there is no descriptor to validate against.
pub const HANDLER_FIELD: &str = "<handler>";

/// Rejects requests whose parameters do not satisfy the handler schema.
///
/// All violations are reported together, sorted by field name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationInterceptor {
    strict: bool,
}

impl ValidationInterceptor {
    /// Creates a validator. In strict mode undeclared parameters are rejected.
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Returns true if undeclared parameters are rejected.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

/// Validates `params` against `schema`.
///
/// Returns every violation, ordered by field name. An empty result means the
/// parameters are acceptable.
#[must_use]
pub fn validate_parameters(
    schema: &ParameterSchema,
    params: &Parameters,
    strict: bool,
) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    for (name, spec) in schema.iter() {
        match params.get(name) {
            None if spec.required => {
                violations.push(FieldViolation::new(name, "required parameter is missing"));
            }
            None => {}
            Some(value) if !spec.param_type.accepts(value) => {
                violations.push(FieldViolation::new(
                    name,
                    format!(
                        "expected {}, got {}",
                        spec.param_type,
                        ParamType::name_of(value)
                    ),
                ));
            }
            Some(_) => {}
        }
    }

    if strict {
        violations.extend(
            params
                .keys()
                .filter(|name| !schema.contains(name))
                .map(|name| FieldViolation::new(name, "unknown parameter")),
        );
    }

    violations.sort_by(|a, b| a.field.cmp(&b.field));
    violations
}

fn report(violations: &[FieldViolation]) -> Value {
    json!({
        "passed": false,
        "violations": violations,
    })
}

#[async_trait]
impl Interceptor for ValidationInterceptor {
    fn name(&self) -> &str {
        "validation"
    }

    async fn intercept(&self, ctx: RequestContext, next: Next<'_>) -> ResponseContext {
        let violations = match ctx.resolved_handler() {
            Some(descriptor) => {
                validate_parameters(descriptor.parameter_schema(), ctx.parameters(), self.strict)
            }
            None => vec![FieldViolation::new(
                HANDLER_FIELD,
                "no resolved handler to validate against",
            )],
        };

        if !violations.is_empty() {
            debug!(
                request_id = %ctx.id(),
                handler = %ctx.handler_name(),
                violations = violations.len(),
                "parameter validation failed"
            );
            let annotation = report(&violations);
            return ResponseContext::failure(ctx.id(), ResponseError::validation(violations))
                .with_metadata(keys::VALIDATION, annotation);
        }

        next.run(ctx)
            .await
            .with_metadata(keys::VALIDATION, Value::String("passed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::handlers::HandlerDescriptor;
    use crate::interceptors::InterceptorChain;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn schema() -> ParameterSchema {
        ParameterSchema::new()
            .required("text", ParamType::String)
            .required("count", ParamType::Integer)
            .optional("ratio", ParamType::Number)
    }

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_valid_parameters() {
        let violations = validate_parameters(
            &schema(),
            &params(json!({"text": "hi", "count": 2, "ratio": 3})),
            false,
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_all_violations_sorted() {
        let violations = validate_parameters(
            &schema(),
            &params(json!({"count": "two", "ratio": true})),
            false,
        );
        assert_eq!(
            violations,
            vec![
                FieldViolation::new("count", "expected integer, got string"),
                FieldViolation::new("ratio", "expected number, got boolean"),
                FieldViolation::new("text", "required parameter is missing"),
            ]
        );
    }

    #[test]
    fn test_unknown_fields_tolerated_unless_strict() {
        let input = params(json!({"text": "hi", "count": 1, "extra": 1}));
        assert!(validate_parameters(&schema(), &input, false).is_empty());
        assert_eq!(
            validate_parameters(&schema(), &input, true),
            vec![FieldViolation::new("extra", "unknown parameter")]
        );
    }

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Interceptor for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn is_terminal(&self) -> bool {
            true
        }

        async fn intercept(&self, ctx: RequestContext, _next: Next<'_>) -> ResponseContext {
            self.0.fetch_add(1, Ordering::SeqCst);
            ResponseContext::success(ctx.id(), Value::Null)
        }
    }

    fn chain(calls: &Arc<AtomicUsize>) -> InterceptorChain {
        InterceptorChain::new(vec![
            Arc::new(ValidationInterceptor::new(false)),
            Arc::new(Counter(Arc::clone(calls))),
        ])
    }

    fn resolved(parameters: Value) -> RequestContext {
        let descriptor = HandlerDescriptor::blocking("echo", schema(), |_, _| Ok(Value::Null));
        RequestContext::new("echo", params(parameters))
            .unwrap()
            .with_resolved_handler(Arc::new(descriptor))
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_next() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = chain(&calls).entry().run(resolved(json!({"count": 1}))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.error_kind(), Some(ErrorKind::Validation));
        let error = response.error().unwrap();
        assert_eq!(error.violations, vec![FieldViolation::new("text", "required parameter is missing")]);
        assert_eq!(
            response.metadata_value(keys::VALIDATION).unwrap()["passed"],
            json!(false)
        );
    }

    #[tokio::test]
    async fn test_valid_request_is_annotated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = chain(&calls)
            .entry()
            .run(resolved(json!({"text": "hi", "count": 1})))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(response.is_success());
        assert_eq!(response.metadata_value(keys::VALIDATION), Some(&json!("passed")));
    }

    #[tokio::test]
    async fn test_missing_descriptor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = RequestContext::new("echo", Parameters::new()).unwrap();
        let response = chain(&calls).entry().run(ctx).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(response.error().unwrap().violations[0].field, HANDLER_FIELD);
    }
}
