use std::collections::HashMap;

use serde_json::{Map, Value, json};

use crate::error::LLMError;
use crate::types::{BackendTarget, DispatchRequest};

use super::{TransportStrategy, bearer_header};

/// Batch-instances convention used by ML serving platforms.
///
/// Body is `instances` + optional `parameters` + `stream`. When the request has no
/// instances but has a prompt, the prompt is wrapped as `[{"input": prompt}]`.
#[derive(Debug, Clone, Default)]
pub struct InstancesStrategy;

impl InstancesStrategy {
    pub fn new() -> Self {
        Self
    }

    fn resolve_instances(request: &DispatchRequest) -> Result<Vec<Value>, LLMError> {
        match (&request.instances, &request.prompt) {
            (Some(instances), _) => Ok(instances.clone()),
            (None, Some(prompt)) => Ok(vec![json!({ "input": prompt })]),
            (None, None) => Err(LLMError::invalid_config(
                "instances",
                "instances-style backends require instances or a prompt",
            )),
        }
    }
}

impl TransportStrategy for InstancesStrategy {
    fn name(&self) -> &'static str {
        "instances"
    }

    fn build_headers(&self, target: &BackendTarget) -> HashMap<String, String> {
        bearer_header("Authorization", &target.api_key)
    }

    fn build_body(
        &self,
        _target: &BackendTarget,
        request: &DispatchRequest,
    ) -> Result<Value, LLMError> {
        let instances = Self::resolve_instances(request)?;

        let mut body = Map::new();
        body.insert("instances".to_string(), Value::Array(instances));
        if let Some(parameters) = request.parameters.as_ref().filter(|p| !p.is_empty()) {
            body.insert("parameters".to_string(), Value::Object(parameters.clone()));
        }
        body.insert("stream".to_string(), Value::Bool(request.stream));
        Ok(Value::Object(body))
    }
}
