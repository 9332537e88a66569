// src/flow/bedrock.rs

//! Amazon Bedrock Flows backend.
//!
//! Management calls go through the `bedrock-agent` control plane; invocation
//! goes through `bedrock-agent-runtime` and reads the response event stream
//! until it ends.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockagent::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockagent::types as agent;
use aws_sdk_bedrockagentruntime::types as runtime;
use aws_smithy_types::Document;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::flow::topology::{self, ConnectionKind, FlowConnection, FlowNode, NodeKind};
use crate::flow::{FlowDefinition, FlowInvocation, FlowInvoker, FlowOutputDocument, FlowRegistry};
use crate::models::{AliasSummary, FlowSummary, PipelineConfig, PipelineInstance};

/// Both Bedrock clients plus the settings flow creation needs.
#[derive(Clone)]
pub struct BedrockFlows {
    agent: aws_sdk_bedrockagent::Client,
    runtime: aws_sdk_bedrockagentruntime::Client,
    execution_role_arn: String,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl BedrockFlows {
    pub fn new(
        agent: aws_sdk_bedrockagent::Client,
        runtime: aws_sdk_bedrockagentruntime::Client,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            agent,
            runtime,
            execution_role_arn: config.execution_role_arn.clone(),
            poll_attempts: config.prepare_poll_attempts.max(1),
            poll_interval: Duration::from_millis(config.prepare_poll_interval_ms),
        }
    }

    pub fn from_sdk_config(sdk: &aws_config::SdkConfig, config: &PipelineConfig) -> Self {
        Self::new(
            aws_sdk_bedrockagent::Client::new(sdk),
            aws_sdk_bedrockagentruntime::Client::new(sdk),
            config,
        )
    }

    async fn wait_prepared(&self, flow_id: &str) -> Result<()> {
        for attempt in 1..=self.poll_attempts {
            let flow = self
                .agent
                .get_flow()
                .flow_identifier(flow_id)
                .send()
                .await
                .map_err(|e| service_error("get flow", e))?;

            match flow.status() {
                agent::FlowStatus::Prepared => return Ok(()),
                agent::FlowStatus::Failed => {
                    return Err(AppError::FlowValidation(format!(
                        "flow {flow_id} failed to prepare"
                    )));
                }
                status => {
                    log::debug!(
                        "Flow {flow_id} is {} (attempt {attempt}/{})",
                        status.as_str(),
                        self.poll_attempts
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(AppError::flow(format!(
            "flow {flow_id} not prepared after {} checks",
            self.poll_attempts
        )))
    }
}

/// Map an SDK failure onto the crate's upstream error variants.
fn service_error<E, R>(what: &str, err: SdkError<E, R>) -> AppError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    let message = format!("{what}: {}", DisplayErrorContext(&err));
    classify(err.code(), message)
}

fn classify(code: Option<&str>, message: String) -> AppError {
    match code {
        Some("ResourceNotFoundException") => AppError::FlowNotFound(message),
        Some("ValidationException") => AppError::FlowValidation(message),
        Some("ThrottlingException") => AppError::FlowThrottled(message),
        _ => AppError::Flow(message),
    }
}

/// Alias creation reports a name clash as `ConflictException`.
fn alias_error(flow_id: &str, code: Option<&str>, message: String) -> AppError {
    match code {
        Some("ConflictException") => AppError::AliasConflict {
            flow_id: flow_id.to_string(),
        },
        _ => classify(code, message),
    }
}

fn to_chrono(value: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn string_input(name: &str, expression: &str) -> Result<agent::FlowNodeInput> {
    agent::FlowNodeInput::builder()
        .name(name)
        .r#type(agent::FlowNodeIoDataType::String)
        .expression(expression)
        .build()
        .map_err(AppError::flow)
}

fn string_output(name: &str) -> Result<agent::FlowNodeOutput> {
    agent::FlowNodeOutput::builder()
        .name(name)
        .r#type(agent::FlowNodeIoDataType::String)
        .build()
        .map_err(AppError::flow)
}

fn node_configuration(
    kind: &NodeKind,
) -> Result<(agent::FlowNodeType, agent::FlowNodeConfiguration)> {
    let converted = match kind {
        NodeKind::Input => (
            agent::FlowNodeType::Input,
            agent::FlowNodeConfiguration::Input(agent::InputFlowNodeConfiguration::builder().build()),
        ),
        NodeKind::Output => (
            agent::FlowNodeType::Output,
            agent::FlowNodeConfiguration::Output(
                agent::OutputFlowNodeConfiguration::builder().build(),
            ),
        ),
        NodeKind::Prompt(prompt) => {
            let template = agent::TextPromptTemplateConfiguration::builder()
                .text(&prompt.template)
                .build()
                .map_err(AppError::flow)?;
            let inline = agent::PromptFlowNodeInlineConfiguration::builder()
                .template_type(agent::PromptTemplateType::Text)
                .template_configuration(agent::PromptTemplateConfiguration::Text(template))
                .model_id(&prompt.model_id)
                .inference_configuration(agent::PromptInferenceConfiguration::Text(
                    agent::PromptModelInferenceConfiguration::builder()
                        .temperature(prompt.temperature)
                        .build(),
                ))
                .build();
            let configuration = agent::PromptFlowNodeConfiguration::builder()
                .source_configuration(agent::PromptFlowNodeSourceConfiguration::Inline(inline))
                .build();
            (
                agent::FlowNodeType::Prompt,
                agent::FlowNodeConfiguration::Prompt(configuration),
            )
        }
        NodeKind::Condition { conditions } => {
            let conditions = conditions
                .iter()
                .map(|branch| {
                    agent::FlowCondition::builder()
                        .name(&branch.name)
                        .set_expression(branch.expression.clone())
                        .build()
                        .map_err(AppError::flow)
                })
                .collect::<Result<Vec<_>>>()?;
            let configuration = agent::ConditionFlowNodeConfiguration::builder()
                .set_conditions(Some(conditions))
                .build()
                .map_err(AppError::flow)?;
            (
                agent::FlowNodeType::Condition,
                agent::FlowNodeConfiguration::Condition(configuration),
            )
        }
    };
    Ok(converted)
}

fn sdk_node(node: &FlowNode) -> Result<agent::FlowNode> {
    let (node_type, configuration) = node_configuration(&node.kind)?;
    let inputs = node
        .inputs
        .iter()
        .map(|i| string_input(&i.name, &i.expression))
        .collect::<Result<Vec<_>>>()?;
    let outputs = node
        .outputs
        .iter()
        .map(|o| string_output(&o.name))
        .collect::<Result<Vec<_>>>()?;

    agent::FlowNode::builder()
        .name(&node.name)
        .r#type(node_type)
        .configuration(configuration)
        .set_inputs((!inputs.is_empty()).then_some(inputs))
        .set_outputs((!outputs.is_empty()).then_some(outputs))
        .build()
        .map_err(AppError::flow)
}

fn sdk_connection(connection: &FlowConnection) -> Result<agent::FlowConnection> {
    let (kind, configuration) = match &connection.kind {
        ConnectionKind::Data {
            source_output,
            target_input,
        } => (
            agent::FlowConnectionType::Data,
            agent::FlowConnectionConfiguration::Data(
                agent::FlowDataConnectionConfiguration::builder()
                    .source_output(source_output)
                    .target_input(target_input)
                    .build()
                    .map_err(AppError::flow)?,
            ),
        ),
        ConnectionKind::Conditional { condition } => (
            agent::FlowConnectionType::Conditional,
            agent::FlowConnectionConfiguration::Conditional(
                agent::FlowConditionalConnectionConfiguration::builder()
                    .condition(condition)
                    .build()
                    .map_err(AppError::flow)?,
            ),
        ),
    };

    agent::FlowConnection::builder()
        .name(&connection.name)
        .source(&connection.source)
        .target(&connection.target)
        .r#type(kind)
        .configuration(configuration)
        .build()
        .map_err(AppError::flow)
}

fn sdk_definition(definition: &FlowDefinition) -> Result<agent::FlowDefinition> {
    let nodes = definition
        .nodes
        .iter()
        .map(sdk_node)
        .collect::<Result<Vec<_>>>()?;
    let connections = definition
        .connections
        .iter()
        .map(sdk_connection)
        .collect::<Result<Vec<_>>>()?;

    Ok(agent::FlowDefinition::builder()
        .set_nodes(Some(nodes))
        .set_connections(Some(connections))
        .build())
}

#[async_trait]
impl FlowRegistry for BedrockFlows {
    async fn list_flows(&self) -> Result<Vec<FlowSummary>> {
        let mut flows = Vec::new();
        let mut next_token = None;
        loop {
            let page = self
                .agent
                .list_flows()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| service_error("list flows", e))?;

            flows.extend(page.flow_summaries().iter().map(|f| FlowSummary {
                id: f.id().to_string(),
                name: f.name().to_string(),
                updated_at: to_chrono(f.updated_at()),
            }));

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(flows);
            }
        }
    }

    async fn list_aliases(&self, flow_id: &str) -> Result<Vec<AliasSummary>> {
        let mut aliases = Vec::new();
        let mut next_token = None;
        loop {
            let page = self
                .agent
                .list_flow_aliases()
                .flow_identifier(flow_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| service_error("list flow aliases", e))?;

            aliases.extend(page.flow_alias_summaries().iter().map(|a| AliasSummary {
                id: a.id().to_string(),
                name: a.name().to_string(),
            }));

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(aliases);
            }
        }
    }

    async fn latest_version(&self, flow_id: &str) -> Result<Option<String>> {
        let mut latest: Option<u32> = None;
        let mut next_token = None;
        loop {
            let page = self
                .agent
                .list_flow_versions()
                .flow_identifier(flow_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| service_error("list flow versions", e))?;

            // The working draft is listed as "DRAFT" and skipped here.
            let numbered = page
                .flow_version_summaries()
                .iter()
                .filter_map(|v| v.version().parse::<u32>().ok());
            latest = latest.into_iter().chain(numbered).max();

            next_token = page.next_token().map(str::to_string);
            if next_token.is_none() {
                return Ok(latest.map(|v| v.to_string()));
            }
        }
    }

    async fn create_flow(
        &self,
        name: &str,
        description: &str,
        definition: &FlowDefinition,
    ) -> Result<String> {
        let output = self
            .agent
            .create_flow()
            .name(name)
            .description(description)
            .execution_role_arn(&self.execution_role_arn)
            .definition(sdk_definition(definition)?)
            .send()
            .await
            .map_err(|e| service_error("create flow", e))?;
        Ok(output.id().to_string())
    }

    async fn prepare_flow(&self, flow_id: &str) -> Result<()> {
        self.agent
            .prepare_flow()
            .flow_identifier(flow_id)
            .send()
            .await
            .map_err(|e| service_error("prepare flow", e))?;
        self.wait_prepared(flow_id).await
    }

    async fn create_version(&self, flow_id: &str) -> Result<String> {
        let output = self
            .agent
            .create_flow_version()
            .flow_identifier(flow_id)
            .send()
            .await
            .map_err(|e| service_error("create flow version", e))?;
        Ok(output.version().to_string())
    }

    async fn create_alias(&self, flow_id: &str, name: &str, version: &str) -> Result<String> {
        let routing = agent::FlowAliasRoutingConfigurationListItem::builder()
            .flow_version(version)
            .build();

        match self
            .agent
            .create_flow_alias()
            .flow_identifier(flow_id)
            .name(name)
            .routing_configuration(routing)
            .send()
            .await
        {
            Ok(output) => Ok(output.id().to_string()),
            Err(e) => {
                let message = format!("create flow alias: {}", DisplayErrorContext(&e));
                Err(alias_error(flow_id, e.code(), message))
            }
        }
    }

    async fn delete_alias(&self, flow_id: &str, alias_id: &str) -> Result<()> {
        self.agent
            .delete_flow_alias()
            .flow_identifier(flow_id)
            .alias_identifier(alias_id)
            .send()
            .await
            .map_err(|e| service_error("delete flow alias", e))?;
        Ok(())
    }

    async fn delete_flow(&self, flow_id: &str) -> Result<()> {
        self.agent
            .delete_flow()
            .flow_identifier(flow_id)
            .skip_resource_in_use_check(true)
            .send()
            .await
            .map_err(|e| service_error("delete flow", e))?;
        Ok(())
    }
}

#[async_trait]
impl FlowInvoker for BedrockFlows {
    async fn invoke(&self, instance: &PipelineInstance, document: &str) -> Result<FlowInvocation> {
        let input = runtime::FlowInput::builder()
            .node_name(topology::INPUT_NODE)
            .node_output_name(topology::INPUT_OUTPUT)
            .content(runtime::FlowInputContent::Document(Document::String(
                document.to_string(),
            )))
            .build()
            .map_err(AppError::flow)?;

        let mut output = self
            .runtime
            .invoke_flow()
            .flow_identifier(&instance.id)
            .flow_alias_identifier(&instance.alias_id)
            .inputs(input)
            .send()
            .await
            .map_err(|e| service_error("invoke flow", e))?;

        let mut invocation = FlowInvocation::default();
        while let Some(event) = output
            .response_stream
            .recv()
            .await
            .map_err(|e| service_error("read flow response", e))?
        {
            match event {
                runtime::FlowResponseStream::FlowOutputEvent(out) => {
                    let document = match out.content() {
                        Some(runtime::FlowOutputContent::Document(Document::String(text))) => {
                            text.clone()
                        }
                        Some(other) => format!("{other:?}"),
                        None => String::new(),
                    };
                    log::debug!("Flow output from {}", out.node_name());
                    invocation.outputs.push(FlowOutputDocument {
                        node_name: out.node_name().to_string(),
                        document,
                    });
                }
                runtime::FlowResponseStream::FlowCompletionEvent(done) => {
                    invocation.completion_reason = Some(done.completion_reason().as_str().to_string());
                }
                _ => {}
            }
        }

        Ok(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_variants() {
        let msg = || "boom".to_string();
        assert!(matches!(
            classify(Some("ResourceNotFoundException"), msg()),
            AppError::FlowNotFound(_)
        ));
        assert!(matches!(
            classify(Some("ValidationException"), msg()),
            AppError::FlowValidation(_)
        ));
        assert!(matches!(
            classify(Some("ThrottlingException"), msg()),
            AppError::FlowThrottled(_)
        ));
        assert!(matches!(classify(Some("InternalServerException"), msg()), AppError::Flow(_)));
        assert!(matches!(classify(None, msg()), AppError::Flow(m) if m == "boom"));
    }

    #[test]
    fn test_alias_conflict_is_distinguished() {
        match alias_error("FLOW1", Some("ConflictException"), "dup".into()) {
            AppError::AliasConflict { flow_id } => assert_eq!(flow_id, "FLOW1"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            alias_error("FLOW1", Some("ThrottlingException"), "slow".into()),
            AppError::FlowThrottled(_)
        ));
        assert!(matches!(alias_error("FLOW1", None, "x".into()), AppError::Flow(_)));
    }

    #[test]
    fn test_definition_converts() {
        let definition = topology::pipeline_definition(&PipelineConfig::default());
        let converted = sdk_definition(&definition).unwrap();
        assert_eq!(converted.nodes().len(), definition.nodes.len());
        assert_eq!(converted.connections().len(), definition.connections.len());

        let condition = converted
            .nodes()
            .iter()
            .find(|n| n.name() == topology::CONDITION_NODE)
            .unwrap();
        assert_eq!(condition.r#type(), &agent::FlowNodeType::Condition);
        assert!(condition.outputs().is_empty());
    }
}
