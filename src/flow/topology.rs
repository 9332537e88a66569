// src/flow/topology.rs

//! Declarative description of the classify-then-transform flow.
//!
//! The graph is plain data, built once from [`PipelineConfig`] and handed to
//! the flow service at creation time:
//!
//! ```text
//! FlowInput ──document──▶ ScopeClassifier ──completion──▶ ScopeCondition
//!     │                        │                          │ InTheScope     │ default
//!     │                        │                          ▼                ▼
//!     └──────document───────────────────────────▶ ItemTransformer   UnclassifiedOutput
//!                              │                          │                ▲
//!                              │                          ▼                │
//!                              │                     FlowOutput            │
//!                              └──────────────completion───────────────────┘
//! ```
//!
//! `OutOfTheScope` has no outgoing edge, so an out-of-scope entry completes
//! the flow without producing any output document.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::flow::Classification;
use crate::models::PipelineConfig;

pub const INPUT_NODE: &str = "FlowInput";
pub const INPUT_OUTPUT: &str = "document";
pub const CLASSIFY_NODE: &str = "ScopeClassifier";
pub const CLASSIFY_INPUT: &str = "scope_item";
pub const CONDITION_NODE: &str = "ScopeCondition";
pub const CONDITION_INPUT: &str = "classification";
pub const TRANSFORM_NODE: &str = "ItemTransformer";
pub const TRANSFORM_INPUT: &str = "news_item";
pub const OUTPUT_NODE: &str = "FlowOutput";
pub const UNCLASSIFIED_NODE: &str = "UnclassifiedOutput";
pub const OUTPUT_INPUT: &str = "document";
pub const PROMPT_OUTPUT: &str = "modelCompletion";
pub const DEFAULT_CONDITION: &str = "default";

/// Expression selecting the whole payload of an input.
const DATA_EXPRESSION: &str = "$.data";

/// Node graph plus its typed connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub nodes: Vec<FlowNode>,
    pub connections: Vec<FlowConnection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<NodeInput>,
    #[serde(default)]
    pub outputs: Vec<NodeOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Prompt(PromptSpec),
    Condition { conditions: Vec<ConditionBranch> },
    Output,
}

/// Inline prompt of a prompt node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub model_id: String,
    pub template: String,
    pub temperature: f32,
}

/// A named branch; the branch without expression is the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionBranch {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// String-typed node input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    pub name: String,
    pub expression: String,
}

/// String-typed node output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConnection {
    pub name: String,
    pub source: String,
    pub target: String,
    pub kind: ConnectionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionKind {
    Data {
        source_output: String,
        target_input: String,
    },
    Conditional {
        condition: String,
    },
}

impl FlowNode {
    fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn input(mut self, name: &str) -> Self {
        self.inputs.push(NodeInput {
            name: name.to_string(),
            expression: DATA_EXPRESSION.to_string(),
        });
        self
    }

    fn output(mut self, name: &str) -> Self {
        self.outputs.push(NodeOutput {
            name: name.to_string(),
        });
        self
    }
}

impl FlowConnection {
    fn data(source: &str, source_output: &str, target: &str, target_input: &str) -> Self {
        Self {
            name: format!("{source}_{target}_{target_input}"),
            source: source.to_string(),
            target: target.to_string(),
            kind: ConnectionKind::Data {
                source_output: source_output.to_string(),
                target_input: target_input.to_string(),
            },
        }
    }

    fn conditional(source: &str, condition: &str, target: &str) -> Self {
        Self {
            name: format!("{source}_{target}_{condition}"),
            source: source.to_string(),
            target: target.to_string(),
            kind: ConnectionKind::Conditional {
                condition: condition.to_string(),
            },
        }
    }
}

/// Prompt of the classification stage.
pub fn classify_prompt(config: &PipelineConfig) -> String {
    let keywords = config
        .scope_keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Task: Analyze the provided news item and categorize it based on specific keywords.\n\
         \n\
         Input: A news item, enclosed in <ScopeItem> tags.\n\
         \n\
         Instructions:\n\
         1. Read the content within the <ScopeItem> tags.\n\
         2. Search for the following keywords (case-insensitive):\n   {keywords}\n\
         3. Categorization:\n   \
            - If any of the keywords are present: Respond with \"{in_scope}\"\n   \
            - If none of the keywords are present: Respond with \"{out_of_scope}\"\n\
         4. Provide only the categorization result without any additional text.\n\
         \n\
         <ScopeItem>\n{{{{{input}}}}}\n</ScopeItem>",
        in_scope = Classification::InScope.token(),
        out_of_scope = Classification::OutOfScope.token(),
        input = CLASSIFY_INPUT,
    )
}

/// Prompt of the transformation stage.
pub fn transform_prompt(config: &PipelineConfig) -> String {
    format!(
        "Task: Rewrite a news item for a large internal project team and reformat it as an RSS feed item.\n\
         \n\
         Input: A news item, enclosed in <NewsItem> tags.\n\
         \n\
         Instructions:\n\
         1. Read the content within the <NewsItem> tags.\n\
         2. Rewrite the content in {language} as a message suitable for a large internal project team.\n\
         3. Reformat the content into a single RSS feed <item> with the following elements:\n   \
            <guid>: Generate a unique identifier\n   \
            <title>: Create a concise {language} title\n   \
            <link>: Include the original news link if available\n   \
            <description>: Summarize the content in {language}, limited to {words} words\n\
         4. Respond with only the formatted RSS <item> XML, without any additional text.\n\
         \n\
         <NewsItem>\n{{{{{input}}}}}\n</NewsItem>",
        language = config.target_language,
        words = config.max_summary_words,
        input = TRANSFORM_INPUT,
    )
}

/// Build the fixed two-stage flow.
pub fn pipeline_definition(config: &PipelineConfig) -> FlowDefinition {
    let prompt = |template: String| {
        NodeKind::Prompt(PromptSpec {
            model_id: config.model_id.clone(),
            template,
            temperature: config.temperature,
        })
    };

    let in_scope = Classification::InScope.token();
    let out_of_scope = Classification::OutOfScope.token();

    let nodes = vec![
        FlowNode::new(INPUT_NODE, NodeKind::Input).output(INPUT_OUTPUT),
        FlowNode::new(CLASSIFY_NODE, prompt(classify_prompt(config)))
            .input(CLASSIFY_INPUT)
            .output(PROMPT_OUTPUT),
        FlowNode::new(
            CONDITION_NODE,
            NodeKind::Condition {
                conditions: vec![
                    ConditionBranch {
                        name: in_scope.to_string(),
                        expression: Some(format!("{CONDITION_INPUT} == \"{in_scope}\"")),
                    },
                    ConditionBranch {
                        name: out_of_scope.to_string(),
                        expression: Some(format!("{CONDITION_INPUT} == \"{out_of_scope}\"")),
                    },
                    ConditionBranch {
                        name: DEFAULT_CONDITION.to_string(),
                        expression: None,
                    },
                ],
            },
        )
        .input(CONDITION_INPUT),
        FlowNode::new(TRANSFORM_NODE, prompt(transform_prompt(config)))
            .input(TRANSFORM_INPUT)
            .output(PROMPT_OUTPUT),
        FlowNode::new(OUTPUT_NODE, NodeKind::Output).input(OUTPUT_INPUT),
        FlowNode::new(UNCLASSIFIED_NODE, NodeKind::Output).input(OUTPUT_INPUT),
    ];

    let connections = vec![
        FlowConnection::data(INPUT_NODE, INPUT_OUTPUT, CLASSIFY_NODE, CLASSIFY_INPUT),
        FlowConnection::data(CLASSIFY_NODE, PROMPT_OUTPUT, CONDITION_NODE, CONDITION_INPUT),
        FlowConnection::conditional(CONDITION_NODE, in_scope, TRANSFORM_NODE),
        FlowConnection::data(INPUT_NODE, INPUT_OUTPUT, TRANSFORM_NODE, TRANSFORM_INPUT),
        FlowConnection::data(TRANSFORM_NODE, PROMPT_OUTPUT, OUTPUT_NODE, OUTPUT_INPUT),
        FlowConnection::conditional(CONDITION_NODE, DEFAULT_CONDITION, UNCLASSIFIED_NODE),
        FlowConnection::data(CLASSIFY_NODE, PROMPT_OUTPUT, UNCLASSIFIED_NODE, OUTPUT_INPUT),
    ];

    FlowDefinition { nodes, connections }
}

impl FlowDefinition {
    pub fn node(&self, name: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Check the graph is wired consistently before sending it anywhere.
    pub fn validate(&self) -> Result<()> {
        let mut nodes: HashMap<&str, &FlowNode> = HashMap::new();
        for node in &self.nodes {
            if nodes.insert(node.name.as_str(), node).is_some() {
                return Err(AppError::validation(format!(
                    "duplicate node name {}",
                    node.name
                )));
            }
        }

        let mut names = HashSet::new();
        let mut wired: HashMap<(&str, &str), usize> = HashMap::new();

        for connection in &self.connections {
            if !names.insert(connection.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate connection name {}",
                    connection.name
                )));
            }

            let source = nodes.get(connection.source.as_str()).ok_or_else(|| {
                AppError::validation(format!(
                    "{}: unknown source node {}",
                    connection.name, connection.source
                ))
            })?;
            let target = nodes.get(connection.target.as_str()).ok_or_else(|| {
                AppError::validation(format!(
                    "{}: unknown target node {}",
                    connection.name, connection.target
                ))
            })?;

            match &connection.kind {
                ConnectionKind::Data {
                    source_output,
                    target_input,
                } => {
                    if !source.outputs.iter().any(|o| &o.name == source_output) {
                        return Err(AppError::validation(format!(
                            "{}: {} has no output {}",
                            connection.name, source.name, source_output
                        )));
                    }
                    if !target.inputs.iter().any(|i| &i.name == target_input) {
                        return Err(AppError::validation(format!(
                            "{}: {} has no input {}",
                            connection.name, target.name, target_input
                        )));
                    }
                    *wired
                        .entry((target.name.as_str(), target_input.as_str()))
                        .or_default() += 1;
                }
                ConnectionKind::Conditional { condition } => {
                    let NodeKind::Condition { conditions } = &source.kind else {
                        return Err(AppError::validation(format!(
                            "{}: {} is not a condition node",
                            connection.name, source.name
                        )));
                    };
                    if !conditions.iter().any(|c| &c.name == condition) {
                        return Err(AppError::validation(format!(
                            "{}: {} declares no condition {}",
                            connection.name, source.name, condition
                        )));
                    }
                }
            }
        }

        for node in &self.nodes {
            for input in &node.inputs {
                match wired.get(&(node.name.as_str(), input.name.as_str())) {
                    Some(1) => {}
                    Some(n) => {
                        return Err(AppError::validation(format!(
                            "{}.{} is wired {} times",
                            node.name, input.name, n
                        )));
                    }
                    None => {
                        return Err(AppError::validation(format!(
                            "{}.{} is not wired",
                            node.name, input.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> FlowDefinition {
        pipeline_definition(&PipelineConfig::default())
    }

    #[test]
    fn test_definition_is_valid() {
        definition().validate().unwrap();
    }

    #[test]
    fn test_condition_branches() {
        let def = definition();
        let node = def.node(CONDITION_NODE).unwrap();
        let NodeKind::Condition { conditions } = &node.kind else {
            panic!("not a condition node");
        };

        let names: Vec<_> = conditions.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["InTheScope", "OutOfTheScope", "default"]);
        assert_eq!(
            conditions[0].expression.as_deref(),
            Some("classification == \"InTheScope\"")
        );
        assert!(conditions[2].expression.is_none());
    }

    #[test]
    fn test_out_of_scope_has_no_edge() {
        let def = definition();
        let out_edges: Vec<_> = def
            .connections
            .iter()
            .filter(|c| {
                matches!(&c.kind, ConnectionKind::Conditional { condition } if condition == "OutOfTheScope")
            })
            .collect();
        assert!(out_edges.is_empty());
    }

    #[test]
    fn test_prompts_use_config() {
        let mut config = PipelineConfig::default();
        config.scope_keywords = vec!["EKS".into(), " ".into(), "Fargate".into()];
        config.target_language = "German".into();
        config.max_summary_words = 80;

        let classify = classify_prompt(&config);
        assert!(classify.contains("EKS, Fargate"));
        assert!(classify.contains("{{scope_item}}"));
        assert!(classify.contains("\"InTheScope\""));

        let transform = transform_prompt(&config);
        assert!(transform.contains("in German"));
        assert!(transform.contains("limited to 80 words"));
        assert!(transform.contains("{{news_item}}"));
    }

    #[test]
    fn test_validate_unknown_node() {
        let mut def = definition();
        def.connections[0].target = "Nowhere".into();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_validate_missing_output() {
        let mut def = definition();
        if let ConnectionKind::Data { source_output, .. } = &mut def.connections[0].kind {
            *source_output = "bogus".into();
        }
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_validate_unwired_input() {
        let mut def = definition();
        def.connections
            .retain(|c| !(c.target == TRANSFORM_NODE && matches!(c.kind, ConnectionKind::Data { .. })));
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("ItemTransformer.news_item is not wired"));
    }

    #[test]
    fn test_validate_conditional_from_prompt() {
        let mut def = definition();
        def.connections
            .push(FlowConnection::conditional(CLASSIFY_NODE, "InTheScope", OUTPUT_NODE));
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_serializes_as_tagged_json() {
        let json = serde_json::to_value(definition()).unwrap();
        assert_eq!(json["nodes"][0]["kind"]["type"], "input");
        assert_eq!(json["nodes"][1]["kind"]["type"], "prompt");
        assert_eq!(json["connections"][2]["kind"]["type"], "conditional");
    }
}
