//! 补全修复流水线
//! Completion repair pipeline
//!
//! 将模型原始文本转换为符合模式的值
//! Turns raw model text into a schema-conformant value.
//!
//! ```text
//! raw ─▶ strip_fencing ─▶ direct parse ─┬─▶ heuristic rules ─▶ model repair
//!                                       └─▶ model repair ─▶ heuristic rules   (ModelFirst)
//!                 every parsed candidate ─▶ sanitize ─▶ coerce
//! ```
//!
//! 每次尝试都记录在 [`RepairTrace`] 中
//! Every attempt is recorded in a [`RepairTrace`]; only exhaustion of all
//! stages surfaces as [`AiFunctionError::UnrecoverableFormat`].

pub mod fencing;
pub mod rules;
pub mod sanitize;

pub use fencing::strip_fencing;
pub use rules::{DEFAULT_RULES, RewriteRule};
pub use sanitize::{SanitizeMode, sanitize_literal};

use crate::coerce::{CARRIER_FIELD, CoerceOptions, coerce_with_carrier};
use crate::llm::RetryExecutor;
use aifunc_kernel::llm::{ChatCompletionRequest, ChatMessage};
use aifunc_kernel::{
    AiFunctionError, AiFunctionResult, RepairAttempt, RepairStage, RepairTrace, SchemaNode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// 启发式修复与模型修复的先后顺序
/// Which of the two repair stages runs first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairOrder {
    #[default]
    HeuristicFirst,
    ModelFirst,
}

/// 流水线选项
/// Pipeline options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairOptions {
    pub order: RepairOrder,
    /// 同时接受 YAML 映射或序列
    /// Also accept a YAML mapping or sequence when JSON parsing fails
    pub accept_yaml: bool,
    pub sanitize: SanitizeMode,
    /// 拒绝未声明的对象字段
    /// Reject object fields the schema does not declare
    pub deny_unknown_fields: bool,
    /// 允许模型辅助修复（需要提供者）
    /// Allow the model-assisted stage when a provider is attached
    pub model_repair: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            order: RepairOrder::HeuristicFirst,
            accept_yaml: false,
            sanitize: SanitizeMode::JsonUnicode,
            deny_unknown_fields: false,
            model_repair: true,
        }
    }
}

/// 修复成功的结果
/// Successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: Value,
    /// 产生该值的阶段
    /// Stage whose candidate produced the value
    pub stage: RepairStage,
    pub trace: RepairTrace,
}

const REPAIR_INSTRUCTION: &str = "Fix the text in the user message into valid JSON, preserving its content. \
Only respond with the corrected JSON value. Do not include code fences or any other explanatory text.";

#[derive(Clone)]
struct ModelRepairer {
    executor: Arc<RetryExecutor>,
    model: String,
}

/// 补全修复流水线
/// Completion repair pipeline
#[derive(Clone)]
pub struct RepairPipeline {
    options: RepairOptions,
    repairer: Option<ModelRepairer>,
}

impl Default for RepairPipeline {
    fn default() -> Self {
        Self::new(RepairOptions::default())
    }
}

impl std::fmt::Debug for RepairPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairPipeline")
            .field("options", &self.options)
            .field(
                "model_repair",
                &self.repairer.as_ref().map(|r| r.model.as_str()),
            )
            .finish()
    }
}

impl RepairPipeline {
    /// 创建仅包含本地阶段的流水线
    /// Create a pipeline with local stages only
    pub fn new(options: RepairOptions) -> Self {
        Self {
            options,
            repairer: None,
        }
    }

    /// 附加模型辅助修复阶段
    /// Attach the model-assisted stage
    pub fn with_model_repair(mut self, executor: Arc<RetryExecutor>, model: impl Into<String>) -> Self {
        self.repairer = Some(ModelRepairer {
            executor,
            model: model.into(),
        });
        self
    }

    pub fn options(&self) -> &RepairOptions {
        &self.options
    }

    /// 是否会执行模型辅助修复
    /// Whether the model-assisted stage will run
    pub fn has_model_repair(&self) -> bool {
        self.options.model_repair && self.repairer.is_some()
    }

    /// 仅运行本地阶段（不调用模型）
    /// Run the local stages only; never calls a model
    pub fn resolve_local(&self, raw: &str, schema: &SchemaNode) -> AiFunctionResult<Resolved> {
        let mut trace = RepairTrace::default();
        let stripped = self.strip(raw, &mut trace);

        if let Some(value) = self.try_candidate(RepairStage::DirectParse, &stripped, schema, &mut trace) {
            return Ok(resolved(value, RepairStage::DirectParse, trace));
        }
        if let Some(value) = self.rewrite(RepairStage::HeuristicRepair, &stripped, schema, &mut trace) {
            return Ok(resolved(value, RepairStage::HeuristicRepair, trace));
        }

        Err(unrecoverable(raw, trace))
    }

    /// 运行完整流水线
    /// Run the full pipeline
    pub async fn resolve(&self, raw: &str, schema: &SchemaNode) -> AiFunctionResult<Resolved> {
        let mut trace = RepairTrace::default();
        let stripped = self.strip(raw, &mut trace);

        if let Some(value) = self.try_candidate(RepairStage::DirectParse, &stripped, schema, &mut trace) {
            return Ok(resolved(value, RepairStage::DirectParse, trace));
        }

        match self.options.order {
            RepairOrder::HeuristicFirst => {
                if let Some(value) = self.rewrite(RepairStage::HeuristicRepair, &stripped, schema, &mut trace) {
                    return Ok(resolved(value, RepairStage::HeuristicRepair, trace));
                }
                if let Some(value) = self.model_repair(&stripped, schema, &mut trace, true).await? {
                    return Ok(resolved(value, RepairStage::ModelRepair, trace));
                }
            }
            RepairOrder::ModelFirst => {
                if let Some(value) = self.model_repair(&stripped, schema, &mut trace, false).await? {
                    return Ok(resolved(value, RepairStage::ModelRepair, trace));
                }
                if let Some(value) = self.rewrite(RepairStage::HeuristicRepair, &stripped, schema, &mut trace) {
                    return Ok(resolved(value, RepairStage::HeuristicRepair, trace));
                }
            }
        }

        Err(unrecoverable(raw, trace))
    }

    fn strip(&self, raw: &str, trace: &mut RepairTrace) -> String {
        let stripped = strip_fencing(raw);
        trace.push(RepairAttempt::succeeded(RepairStage::StripFencing, raw, stripped.as_str()));
        stripped
    }

    fn coerce_options(&self) -> CoerceOptions {
        CoerceOptions {
            deny_unknown_fields: self.options.deny_unknown_fields,
        }
    }

    /// Apply the rewrite rules cumulatively, trying a candidate after every change.
    fn rewrite(
        &self,
        stage: RepairStage,
        text: &str,
        schema: &SchemaNode,
        trace: &mut RepairTrace,
    ) -> Option<Value> {
        let mut candidate = text.to_string();

        for rule in DEFAULT_RULES {
            let rewritten = (rule.apply)(&candidate);
            if rewritten == candidate {
                continue;
            }
            debug!(rule = rule.name, %stage, "rewrite rule applied");
            candidate = rewritten;
            if let Some(value) = self.try_candidate(stage, &candidate, schema, trace) {
                return Some(value);
            }
        }

        None
    }

    async fn model_repair(
        &self,
        text: &str,
        schema: &SchemaNode,
        trace: &mut RepairTrace,
        is_final: bool,
    ) -> AiFunctionResult<Option<Value>> {
        if !self.options.model_repair {
            return Ok(None);
        }
        let Some(repairer) = &self.repairer else {
            return Ok(None);
        };

        let request = ChatCompletionRequest::new(repairer.model.as_str())
            .messages([
                ChatMessage::system(repair_instruction(schema)),
                ChatMessage::user(text),
            ])
            .temperature(0.0);

        debug!(model = %repairer.model, "requesting model-assisted repair");
        let fixed = match repairer.executor.chat_text(request).await {
            Ok(fixed) => fixed,
            Err(e) if is_final => return Err(AiFunctionError::Invocation(e)),
            Err(e) => {
                warn!("Model-assisted repair failed, continuing: {}", e);
                trace.push(RepairAttempt::failed(RepairStage::ModelRepair, text, e.to_string()));
                return Ok(None);
            }
        };

        let cleaned = strip_fencing(&fixed);
        if let Some(value) = self.try_candidate(RepairStage::ModelRepair, &cleaned, schema, trace) {
            return Ok(Some(value));
        }
        Ok(self.rewrite(RepairStage::ModelRepair, &cleaned, schema, trace))
    }

    /// Sanitize, parse and coerce one candidate, recording the outcome.
    fn try_candidate(
        &self,
        stage: RepairStage,
        text: &str,
        schema: &SchemaNode,
        trace: &mut RepairTrace,
    ) -> Option<Value> {
        let sanitized = sanitize_literal(text, self.options.sanitize);

        let parsed = match self.parse(&sanitized) {
            Ok(parsed) => parsed,
            Err(reason) => {
                debug!(%stage, %reason, "candidate did not parse");
                trace.push(RepairAttempt::failed(stage, text, reason));
                return None;
            }
        };

        match coerce_with_carrier(&parsed, schema, self.coerce_options()) {
            Ok(value) => {
                trace.push(RepairAttempt::succeeded(stage, text, value.to_string()));
                Some(value)
            }
            Err(e) => {
                debug!(%stage, error = %e, "candidate does not conform");
                trace.push(RepairAttempt::failed(RepairStage::Coerce, text, e.to_string()));
                None
            }
        }
    }

    fn parse(&self, text: &str) -> Result<Value, String> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Ok(value),
            Err(json_err) if self.options.accept_yaml => match serde_yaml::from_str::<Value>(text) {
                Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
                Ok(_) => Err(format!("{json_err}; YAML did not yield a mapping or sequence")),
                Err(yaml_err) => Err(format!("{json_err}; YAML: {yaml_err}")),
            },
            Err(json_err) => Err(json_err.to_string()),
        }
    }
}

fn repair_instruction(schema: &SchemaNode) -> String {
    let mut instruction = format!(
        "{REPAIR_INSTRUCTION}\nThe value must have the type `{}`.",
        schema.signature()
    );
    if schema.needs_carrier() {
        instruction.push_str(&format!(
            "\nWrap the value in an object with the single field \"{CARRIER_FIELD}\"."
        ));
    }
    instruction
}

fn resolved(value: Value, stage: RepairStage, trace: RepairTrace) -> Resolved {
    debug!(%stage, attempts = trace.len(), "completion resolved");
    Resolved { value, stage, trace }
}

fn unrecoverable(raw: &str, trace: RepairTrace) -> AiFunctionError {
    warn!("Completion could not be repaired after {} attempts", trace.len());
    AiFunctionError::UnrecoverableFormat {
        raw: raw.to_string(),
        trace,
    }
}
