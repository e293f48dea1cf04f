#![forbid(unsafe_code)]

//! The math engine capability and worker-side request handling.

use crate::protocol::{
    AngleUnit, CalcRequest, CalcResponse, EngineError, NumeralBase, RequestKind,
};

/// An opaque symbolic/numeric math engine.
///
/// Implementations are stateful: unit setters affect every later call.
pub trait MathEngine {
    fn set_angle_units(&mut self, unit: AngleUnit);

    fn set_numeral_base(&mut self, base: NumeralBase);

    /// Normalize user input into engine syntax.
    fn process_expr(&mut self, expr: &str) -> Result<String, EngineError>;

    fn evaluate(&mut self, expr: &str) -> Result<String, EngineError>;

    fn simplify(&mut self, expr: &str) -> Result<String, EngineError>;
}

impl<E: MathEngine + ?Sized> MathEngine for Box<E> {
    fn set_angle_units(&mut self, unit: AngleUnit) {
        (**self).set_angle_units(unit);
    }

    fn set_numeral_base(&mut self, base: NumeralBase) {
        (**self).set_numeral_base(base);
    }

    fn process_expr(&mut self, expr: &str) -> Result<String, EngineError> {
        (**self).process_expr(expr)
    }

    fn evaluate(&mut self, expr: &str) -> Result<String, EngineError> {
        (**self).evaluate(expr)
    }

    fn simplify(&mut self, expr: &str) -> Result<String, EngineError> {
        (**self).simplify(expr)
    }
}

fn try_evaluate<E: MathEngine + ?Sized>(engine: &mut E, expr: &str) -> Result<String, EngineError> {
    let processed = engine.process_expr(expr)?;
    engine.evaluate(&processed)
}

fn try_simplify<E: MathEngine + ?Sized>(engine: &mut E, expr: &str) -> Result<String, EngineError> {
    let processed = engine.process_expr(expr)?;
    engine.simplify(&processed)
}

/// Answer one request.
///
/// The request's angle unit and numeral base are applied first. A combined
/// request evaluates, falls back to simplification on failure, and reports
/// which attempt produced the outcome in `resultType`.
pub fn handle_request<E: MathEngine + ?Sized>(engine: &mut E, request: &CalcRequest) -> CalcResponse {
    engine.set_angle_units(request.angle_unit);
    engine.set_numeral_base(request.numeral_base);

    let response = match request.kind {
        RequestKind::Evaluate => match try_evaluate(engine, &request.expr) {
            Ok(result) => CalcResponse::succeeded(request, result),
            Err(error) => CalcResponse::failed(request, Some(error), None),
        },
        RequestKind::Simplify => match try_simplify(engine, &request.expr) {
            Ok(result) => CalcResponse::succeeded(request, result),
            Err(error) => CalcResponse::failed(request, None, Some(error)),
        },
        RequestKind::EvaluateOrSimplify => match try_evaluate(engine, &request.expr) {
            Ok(result) => {
                CalcResponse::succeeded(request, result).with_result_type(RequestKind::Evaluate)
            }
            Err(evaluate_error) => match try_simplify(engine, &request.expr) {
                Ok(result) => CalcResponse::succeeded(request, result)
                    .with_result_type(RequestKind::Simplify)
                    .with_evaluate_error(evaluate_error),
                Err(simplify_error) => {
                    CalcResponse::failed(request, Some(evaluate_error), Some(simplify_error))
                        .with_result_type(RequestKind::Simplify)
                }
            },
        },
    };

    tracing::debug!(
        target: "calcpp.worker",
        uid = request.uid,
        kind = %request.kind,
        success = response.success,
        "handled request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ParseException;
    use pretty_assertions::assert_eq;

    /// Engine answering from fixed tables and recording calls.
    #[derive(Default)]
    struct TableEngine {
        evaluations: Vec<(&'static str, Result<&'static str, EngineError>)>,
        simplifications: Vec<(&'static str, Result<&'static str, EngineError>)>,
        calls: Vec<String>,
    }

    fn lookup(
        table: &[(&'static str, Result<&'static str, EngineError>)],
        expr: &str,
    ) -> Result<String, EngineError> {
        table
            .iter()
            .find(|(e, _)| *e == expr)
            .map(|(_, r)| r.clone().map(str::to_string))
            .unwrap_or_else(|| Err(EngineError::message(format!("unknown: {expr}"))))
    }

    impl MathEngine for TableEngine {
        fn set_angle_units(&mut self, unit: AngleUnit) {
            self.calls.push(format!("angle:{}", unit.as_str()));
        }

        fn set_numeral_base(&mut self, base: NumeralBase) {
            self.calls.push(format!("base:{}", base.as_str()));
        }

        fn process_expr(&mut self, expr: &str) -> Result<String, EngineError> {
            self.calls.push(format!("process:{expr}"));
            if expr.contains('#') {
                return Err(EngineError::message("bad token"));
            }
            Ok(expr.to_string())
        }

        fn evaluate(&mut self, expr: &str) -> Result<String, EngineError> {
            self.calls.push(format!("evaluate:{expr}"));
            lookup(&self.evaluations, expr)
        }

        fn simplify(&mut self, expr: &str) -> Result<String, EngineError> {
            self.calls.push(format!("simplify:{expr}"));
            lookup(&self.simplifications, expr)
        }
    }

    fn request(kind: RequestKind, expr: &str) -> CalcRequest {
        CalcRequest {
            kind,
            uid: 1,
            expr: expr.into(),
            angle_unit: AngleUnit::Rad,
            numeral_base: NumeralBase::Dec,
        }
    }

    #[test]
    fn units_applied_before_processing() {
        let mut engine = TableEngine {
            evaluations: vec![("2+3", Ok("5"))],
            ..TableEngine::default()
        };
        let response = handle_request(&mut engine, &request(RequestKind::Evaluate, "2+3"));
        assert_eq!(response.result.as_deref(), Some("5"));
        assert_eq!(
            engine.calls,
            vec!["angle:rad", "base:dec", "process:2+3", "evaluate:2+3"]
        );
    }

    #[test]
    fn combined_prefers_evaluation() {
        let mut engine = TableEngine {
            evaluations: vec![("2+3", Ok("5"))],
            simplifications: vec![("2+3", Ok("5"))],
            ..TableEngine::default()
        };
        let response =
            handle_request(&mut engine, &request(RequestKind::EvaluateOrSimplify, "2+3"));
        assert!(response.success);
        assert_eq!(response.result_type, Some(RequestKind::Evaluate));
        assert_eq!(response.evaluate_error, None);
        assert!(!engine.calls.iter().any(|c| c.starts_with("simplify")));
    }

    #[test]
    fn combined_falls_back_to_simplification() {
        let mut engine = TableEngine {
            simplifications: vec![("x+x", Ok("2·x"))],
            ..TableEngine::default()
        };
        let response =
            handle_request(&mut engine, &request(RequestKind::EvaluateOrSimplify, "x+x"));
        assert!(response.success);
        assert_eq!(response.result.as_deref(), Some("2·x"));
        assert_eq!(response.result_type, Some(RequestKind::Simplify));
        assert_eq!(
            response.evaluate_error,
            Some(EngineError::message("unknown: x+x"))
        );
    }

    #[test]
    fn combined_failure_carries_both_errors() {
        let pe = EngineError::Parse(ParseException::new(2, "1/0", "msg_1"));
        let mut engine = TableEngine {
            evaluations: vec![("1/0", Err(pe.clone()))],
            simplifications: vec![("1/0", Err(EngineError::message("no")))],
            ..TableEngine::default()
        };
        let response =
            handle_request(&mut engine, &request(RequestKind::EvaluateOrSimplify, "1/0"));
        assert!(!response.success);
        assert_eq!(response.evaluate_error, Some(pe));
        assert_eq!(response.simplify_error, Some(EngineError::message("no")));
        assert_eq!(response.result_type, Some(RequestKind::Simplify));
        assert!(response.validate().is_ok());
    }

    #[test]
    fn process_failure_fails_the_attempt() {
        let mut engine = TableEngine::default();
        let response = handle_request(&mut engine, &request(RequestKind::Simplify, "1#2"));
        assert!(!response.success);
        assert_eq!(response.simplify_error, Some(EngineError::message("bad token")));
        assert_eq!(response.evaluate_error, None);
    }

    #[test]
    fn evaluate_failure_has_no_result_type() {
        let mut engine = TableEngine::default();
        let response = handle_request(&mut engine, &request(RequestKind::Evaluate, "q"));
        assert!(!response.success);
        assert_eq!(response.result_type, None);
        assert!(response.evaluate_error.is_some());
    }

    #[test]
    fn boxed_engines_delegate() {
        let mut engine: Box<dyn MathEngine> = Box::new(TableEngine {
            evaluations: vec![("1", Ok("1"))],
            ..TableEngine::default()
        });
        let response = handle_request(&mut engine, &request(RequestKind::Evaluate, "1"));
        assert!(response.success);
    }
}
