//! Expression engine for rule conditions

use crate::error::{ExpressionError, ExpressionResult};
use crate::functions;
use hub_core::{DeviceList, DeviceState};
use minijinja::value::ValueKind;
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

/// Everything an expression may look at during one evaluation
///
/// The rule map is a read-only copy taken before the evaluation starts;
/// expressions never see live rule objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvalSnapshot {
    /// Device state keyed by device id text (`"node.id"`)
    pub devices: BTreeMap<String, DeviceState>,
    /// Active flag keyed by rule uuid
    pub rules: BTreeMap<String, bool>,
}

impl EvalSnapshot {
    /// Capture the current state of every device
    pub fn from_devices(devices: &DeviceList) -> Self {
        let devices = devices
            .all()
            .into_iter()
            .map(|(id, dev)| (id.to_string(), dev.state))
            .collect();

        Self {
            devices,
            rules: BTreeMap::new(),
        }
    }

    /// Replace the rule-active map
    pub fn with_rules(mut self, rules: BTreeMap<String, bool>) -> Self {
        self.rules = rules;
        self
    }
}

/// Evaluates a boolean expression against a snapshot
///
/// The logic engine only depends on this trait; the expression language is
/// an implementation detail of the evaluator.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, snapshot: &EvalSnapshot) -> ExpressionResult<bool>;
}

/// Jinja expression evaluator
///
/// Undefined values are strict: referencing a device that never reported
/// is an error rather than silently false.
pub struct JinjaEvaluator {
    env: Environment<'static>,
}

impl JinjaEvaluator {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_function("daily", functions::daily);
        Self { env }
    }

    /// Check an expression for syntax errors without evaluating it
    pub fn validate(&self, expression: &str) -> ExpressionResult<()> {
        self.env.compile_expression(expression)?;
        Ok(())
    }
}

impl Default for JinjaEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator for JinjaEvaluator {
    fn evaluate(&self, expression: &str, snapshot: &EvalSnapshot) -> ExpressionResult<bool> {
        trace!(expression, "Evaluating expression");

        let expr = self.env.compile_expression(expression)?;
        let result = expr.eval(snapshot)?;

        if result.kind() != ValueKind::Bool {
            return Err(ExpressionError::NotBool {
                kind: result.kind().to_string(),
            });
        }

        Ok(result.is_true())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{device_state, Device};

    fn snapshot() -> EvalSnapshot {
        let devices = DeviceList::new();
        devices.upsert(&Device::new(
            "node.id".parse().unwrap(),
            device_state! { "on" => true, "temperature" => 21.0 },
        ));

        let mut rules = BTreeMap::new();
        rules.insert("rule1".to_string(), true);
        rules.insert("rule2".to_string(), false);

        EvalSnapshot::from_devices(&devices).with_rules(rules)
    }

    #[test]
    fn test_device_conditions() {
        let evaluator = JinjaEvaluator::new();
        let snap = snapshot();

        assert!(evaluator
            .evaluate(
                r#"devices["node.id"].on == true and devices["node.id"].temperature > 20.0"#,
                &snap
            )
            .unwrap());
        assert!(!evaluator
            .evaluate(r#"devices["node.id"].on == false"#, &snap)
            .unwrap());
    }

    #[test]
    fn test_rule_conditions() {
        let evaluator = JinjaEvaluator::new();
        let snap = snapshot();

        assert!(evaluator.evaluate(r#"rules["rule1"] == true"#, &snap).unwrap());
        assert!(!evaluator
            .evaluate(r#"rules["rule1"] and rules["rule2"]"#, &snap)
            .unwrap());
    }

    #[test]
    fn test_non_bool_result() {
        let evaluator = JinjaEvaluator::new();
        let err = evaluator.evaluate("1 + 2", &snapshot()).unwrap_err();
        assert!(matches!(err, ExpressionError::NotBool { .. }));
    }

    #[test]
    fn test_missing_device_is_error() {
        let evaluator = JinjaEvaluator::new();
        let result = evaluator.evaluate(r#"devices["other.id"].on == true"#, &snapshot());
        assert!(result.is_err());
    }

    #[test]
    fn test_syntax_error() {
        let evaluator = JinjaEvaluator::new();
        let err = evaluator.evaluate(r#"devices["node.id""#, &snapshot()).unwrap_err();
        assert!(matches!(err, ExpressionError::SyntaxError { .. }));
        assert!(evaluator.validate("devices[").is_err());
        assert!(evaluator.validate("true").is_ok());
    }

    #[test]
    fn test_daily_function() {
        let evaluator = JinjaEvaluator::new();
        let snap = snapshot();

        // A window covering the whole day except the last minute
        let always = evaluator.evaluate(r#"daily("00:00", "23:59") or daily("23:58", "00:01")"#, &snap);
        assert!(always.unwrap());
    }
}
