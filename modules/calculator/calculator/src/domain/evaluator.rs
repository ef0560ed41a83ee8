//! Expression evaluation.
//!
//! Evaluation never waits on a call. Each `Call` node is issued with its
//! arguments as they stand (numbers, or Values that may still be pending) and
//! its result is handed back as a pipelined Value. Only whoever finally reads
//! the Value waits for the chain to complete.

use calculator_sdk::{Argument, CalculatorError, Expression, ValueClient};

use super::value::{ForwardedRead, LiteralValue};

/// Turn `expression` into a Value capability.
///
/// # Errors
/// Returns `UnsupportedExpression` if the tree contains a node the service
/// cannot evaluate (function parameters). Failures of the issued calls are
/// not reported here; they surface when the returned Value is read.
pub fn evaluate(expression: Expression) -> Result<ValueClient, CalculatorError> {
    match expression {
        Expression::Literal(value) => Ok(LiteralValue::new(value).into_client()),
        Expression::PreviousResult(value) => Ok(ForwardedRead::start(&value).into_client()),
        Expression::Call { function, params } => {
            let args = params
                .into_iter()
                .map(argument)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(function.call(&args).pipeline())
        }
        other @ Expression::Parameter(_) => {
            Err(CalculatorError::UnsupportedExpression(other.kind().to_owned()))
        }
    }
}

fn argument(expression: Expression) -> Result<Argument, CalculatorError> {
    match expression {
        Expression::Literal(value) => Ok(Argument::Number(value)),
        Expression::PreviousResult(value) => Ok(Argument::Value(value)),
        nested => evaluate(nested).map(Argument::Value),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use calculator_sdk::{FunctionClient, Operator};

    use super::*;
    use crate::domain::operators::Registry;

    fn op(op: Operator) -> FunctionClient {
        Registry::new().lookup(op).unwrap()
    }

    fn lit(value: f64) -> Expression {
        Expression::Literal(value)
    }

    #[tokio::test]
    async fn literal_evaluates_to_itself() {
        for v in [0.0, -1.5, 1e300, f64::INFINITY] {
            assert_eq!(evaluate(lit(v)).unwrap().read().await.unwrap(), v);
        }
    }

    #[tokio::test]
    async fn nested_calls_compose() {
        let expr = Expression::call(
            op(Operator::Add),
            vec![
                Expression::call(op(Operator::Add), vec![lit(1.0), lit(2.0)]),
                lit(3.0),
            ],
        );
        assert_eq!(evaluate(expr).unwrap().read().await.unwrap(), 6.0);
    }

    #[tokio::test]
    async fn previous_result_reuses_an_earlier_value() {
        let earlier = evaluate(Expression::call(op(Operator::Multiply), vec![lit(6.0), lit(7.0)]))
            .unwrap();

        let again = evaluate(Expression::PreviousResult(earlier.clone())).unwrap();
        assert_eq!(again.read().await.unwrap(), earlier.read().await.unwrap());

        let doubled = evaluate(Expression::call(
            op(Operator::Add),
            vec![Expression::PreviousResult(earlier.clone()), Expression::PreviousResult(earlier)],
        ))
        .unwrap();
        assert_eq!(doubled.read().await.unwrap(), 84.0);
    }

    #[tokio::test]
    async fn parameter_is_unsupported_anywhere_in_the_tree() {
        let err = evaluate(Expression::Parameter(0)).unwrap_err();
        assert_eq!(err, CalculatorError::UnsupportedExpression("parameter".to_owned()));

        let nested = Expression::call(op(Operator::Add), vec![lit(1.0), Expression::Parameter(1)]);
        assert_eq!(
            evaluate(nested).unwrap_err(),
            CalculatorError::UnsupportedExpression("parameter".to_owned())
        );
    }

    #[tokio::test]
    async fn arity_errors_surface_on_read() {
        let value = evaluate(Expression::call(op(Operator::Divide), vec![lit(1.0)])).unwrap();
        assert_eq!(
            value.read().await.unwrap_err(),
            CalculatorError::ArityMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[tokio::test]
    async fn division_by_zero_is_not_an_error() {
        let value = evaluate(Expression::call(op(Operator::Divide), vec![lit(1.0), lit(0.0)]));
        assert_eq!(value.unwrap().read().await.unwrap(), f64::INFINITY);
    }

    #[tokio::test]
    async fn failed_previous_results_surface_on_read() {
        let broken = ValueClient::broken(CalculatorError::OperatorNotFound("pow".to_owned()));

        let forwarded = evaluate(Expression::PreviousResult(broken.clone())).unwrap();
        assert_eq!(
            forwarded.read().await.unwrap_err(),
            CalculatorError::OperatorNotFound("pow".to_owned())
        );

        let used = evaluate(Expression::call(
            op(Operator::Add),
            vec![lit(1.0), Expression::PreviousResult(broken)],
        ))
        .unwrap();
        assert_eq!(
            used.read().await.unwrap_err(),
            CalculatorError::OperatorNotFound("pow".to_owned())
        );
    }
}
