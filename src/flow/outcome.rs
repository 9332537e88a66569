// src/flow/outcome.rs

//! Interpretation of a finished flow invocation.
//!
//! The flow itself does the branching; this module maps what came back
//! (completion reason plus output documents, keyed by output node) onto
//! one of three terminal outcomes.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::flow::topology::{OUTPUT_NODE, UNCLASSIFIED_NODE};
use crate::models::{FeedItem, FeedSettings, RawSourceEntry};
use crate::utils::text;

/// Completion reason of a successful invocation.
pub const COMPLETION_SUCCESS: &str = "SUCCESS";

static ITEM_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item(?:\s[^>]*)?>.*?</item>").expect("valid regex"));

/// An ampersand, with the XML reference it opens when there is one.
static AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9A-Fa-f]+;|#[0-9]+;|amp;|lt;|gt;|quot;|apos;)?").expect("valid regex")
});

/// Verdict of the classification stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    InScope,
    OutOfScope,
}

impl Classification {
    /// Literal token the classifier answers with.
    pub fn token(self) -> &'static str {
        match self {
            Self::InScope => "InTheScope",
            Self::OutOfScope => "OutOfTheScope",
        }
    }

    /// Strict parse; anything but the two literals is rejected.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "InTheScope" => Some(Self::InScope),
            "OutOfTheScope" => Some(Self::OutOfScope),
            _ => None,
        }
    }
}

/// A document emitted by one of the flow's output nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutputDocument {
    pub node_name: String,
    pub document: String,
}

/// Everything collected from one invocation stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowInvocation {
    pub completion_reason: Option<String>,
    pub outputs: Vec<FlowOutputDocument>,
}

/// Why an invocation produced no usable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Flow finished with something other than `SUCCESS`
    Completion(String),
    /// Classifier answered outside the two literals
    MalformedClassification(String),
    /// Transform output was not a well-formed item
    MalformedDocument(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completion(reason) => write!(f, "flow completed with {reason}"),
            Self::MalformedClassification(token) => {
                write!(f, "unrecognised classification {token:?}")
            }
            Self::MalformedDocument(why) => write!(f, "malformed item: {why}"),
        }
    }
}

/// Terminal outcome of running one entry through the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Accepted(FeedItem),
    Dropped,
    Failed(FailureReason),
}

/// Map an invocation onto its terminal outcome.
pub fn interpret(
    invocation: &FlowInvocation,
    entry: &RawSourceEntry,
    max_summary_words: usize,
    now: DateTime<Utc>,
) -> PipelineOutcome {
    match invocation.completion_reason.as_deref() {
        Some(COMPLETION_SUCCESS) => {}
        Some(reason) => return PipelineOutcome::Failed(FailureReason::Completion(reason.into())),
        None => {
            return PipelineOutcome::Failed(FailureReason::Completion(
                "no completion event".into(),
            ));
        }
    }

    let find = |node: &str| invocation.outputs.iter().find(|o| o.node_name == node);

    if let Some(output) = find(UNCLASSIFIED_NODE) {
        let token = output.document.trim();
        if let Some(verdict) = Classification::parse(token) {
            // The condition node compares the raw completion, padding included.
            log::warn!(
                "Classifier answered {:?} with surrounding text: {:?}",
                verdict.token(),
                output.document
            );
        }
        return PipelineOutcome::Failed(FailureReason::MalformedClassification(token.to_string()));
    }

    match find(OUTPUT_NODE) {
        Some(output) => match parse_item(&output.document, entry, max_summary_words, now) {
            Ok(item) => PipelineOutcome::Accepted(item),
            Err(why) => PipelineOutcome::Failed(FailureReason::MalformedDocument(why)),
        },
        None => PipelineOutcome::Dropped,
    }
}

/// Parse the `<item>` produced by the transform stage and enforce its shape.
pub fn parse_item(
    completion: &str,
    entry: &RawSourceEntry,
    max_summary_words: usize,
    now: DateTime<Utc>,
) -> std::result::Result<FeedItem, String> {
    let fragment = ITEM_FRAGMENT
        .find(completion)
        .ok_or_else(|| "no <item> element in completion".to_string())?
        .as_str();
    let fragment = escape_stray_ampersands(fragment);

    // Wrap the bare item in a channel so the RSS reader accepts it.
    let settings = FeedSettings::default();
    let wrapped = format!(
        "<rss version=\"2.0\"><channel><title>{}</title><link>{}</link><description>{}</description>{}</channel></rss>",
        settings.title, settings.link, settings.description, fragment
    );

    let channel = rss::Channel::read_from(wrapped.as_bytes()).map_err(|e| e.to_string())?;
    let item = channel
        .items()
        .first()
        .ok_or_else(|| "completion item could not be read".to_string())?;

    let required = |value: Option<&str>, field: &str| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("missing {field}"))
    };

    let guid = required(item.guid().map(|g| g.value()), "guid")?;
    let title = required(item.title(), "title")?;
    let description = required(item.description(), "description")?;
    let link = item
        .link()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .or_else(|| entry.link.clone())
        .ok_or_else(|| "missing link".to_string())?;

    if guid == entry.id {
        return Err(format!("guid {guid} reuses the source entry id"));
    }

    let description = text::clip_words(&description, max_summary_words).into_owned();

    Ok(FeedItem {
        guid,
        title: text::collapse_whitespace(&title),
        link: Some(link),
        description,
        published_at: Some(now),
    })
}

/// Escape every `&` that does not open an XML reference.
fn escape_stray_ampersands(fragment: &str) -> std::borrow::Cow<'_, str> {
    AMPERSAND.replace_all(fragment, |caps: &regex::Captures<'_>| match caps.get(1) {
        Some(_) => caps[0].to_string(),
        None => "&amp;".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry() -> RawSourceEntry {
        RawSourceEntry {
            id: "b2".into(),
            title: "New Title".into(),
            link: Some("http://x".into()),
            description: "desc".into(),
            published: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn success(outputs: Vec<(&str, &str)>) -> FlowInvocation {
        FlowInvocation {
            completion_reason: Some(COMPLETION_SUCCESS.into()),
            outputs: outputs
                .into_iter()
                .map(|(node, doc)| FlowOutputDocument {
                    node_name: node.into(),
                    document: doc.into(),
                })
                .collect(),
        }
    }

    const ITEM: &str = "<item><guid>f3c1</guid><title>Nouveauté S3</title><link>http://x</link><description>Résumé en français.</description></item>";

    #[test]
    fn test_classification_tokens() {
        assert_eq!(Classification::parse("InTheScope"), Some(Classification::InScope));
        assert_eq!(
            Classification::parse("OutOfTheScope"),
            Some(Classification::OutOfScope)
        );
        assert_eq!(Classification::parse("inthescope"), None);
        assert_eq!(Classification::parse(""), None);
        assert_eq!(Classification::InScope.token(), "InTheScope");
    }

    #[test]
    fn test_accepted() {
        let outcome = interpret(&success(vec![(OUTPUT_NODE, ITEM)]), &entry(), 150, now());
        let PipelineOutcome::Accepted(item) = outcome else {
            panic!("expected accepted, got {outcome:?}");
        };
        assert_eq!(item.guid, "f3c1");
        assert_eq!(item.title, "Nouveauté S3");
        assert_eq!(item.link.as_deref(), Some("http://x"));
        assert_eq!(item.published_at, Some(now()));
    }

    #[test]
    fn test_dropped_when_no_output() {
        let outcome = interpret(&success(vec![]), &entry(), 150, now());
        assert_eq!(outcome, PipelineOutcome::Dropped);
    }

    #[test]
    fn test_non_success_completion() {
        let invocation = FlowInvocation {
            completion_reason: Some("INPUT_REQUIRED".into()),
            outputs: vec![FlowOutputDocument {
                node_name: OUTPUT_NODE.into(),
                document: ITEM.into(),
            }],
        };
        assert_eq!(
            interpret(&invocation, &entry(), 150, now()),
            PipelineOutcome::Failed(FailureReason::Completion("INPUT_REQUIRED".into()))
        );

        let missing = FlowInvocation::default();
        assert!(matches!(
            interpret(&missing, &entry(), 150, now()),
            PipelineOutcome::Failed(FailureReason::Completion(_))
        ));
    }

    #[test]
    fn test_malformed_classification() {
        let outcome = interpret(
            &success(vec![(UNCLASSIFIED_NODE, " Maybe in scope?\n")]),
            &entry(),
            150,
            now(),
        );
        assert_eq!(
            outcome,
            PipelineOutcome::Failed(FailureReason::MalformedClassification(
                "Maybe in scope?".into()
            ))
        );
    }

    #[test]
    fn test_item_inside_prose_and_fences() {
        let completion = format!("Voici l'élément :\n```xml\n{ITEM}\n```\n");
        let item = parse_item(&completion, &entry(), 150, now()).unwrap();
        assert_eq!(item.guid, "f3c1");
    }

    #[test]
    fn test_bare_ampersands_are_escaped() {
        let completion = "<item><guid>f3c1</guid><title>Nouveautés S3 & Lambda</title><link>http://x</link><description>Amazon S3 & AWS Lambda &amp; co &#233;voluent.</description></item>";
        let item = parse_item(completion, &entry(), 150, now()).unwrap();
        assert_eq!(item.title, "Nouveautés S3 & Lambda");
        assert_eq!(item.description, "Amazon S3 & AWS Lambda & co évoluent.");
    }

    #[test]
    fn test_link_falls_back_to_source() {
        let completion = "<item><guid>g</guid><title>T</title><description>D</description></item>";
        let item = parse_item(completion, &entry(), 150, now()).unwrap();
        assert_eq!(item.link.as_deref(), Some("http://x"));

        let mut no_link = entry();
        no_link.link = None;
        assert_eq!(
            parse_item(completion, &no_link, 150, now()).unwrap_err(),
            "missing link"
        );
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let no_guid = "<item><title>T</title><description>D</description></item>";
        assert_eq!(parse_item(no_guid, &entry(), 150, now()).unwrap_err(), "missing guid");

        let blank_title = "<item><guid>g</guid><title> </title><description>D</description></item>";
        assert_eq!(
            parse_item(blank_title, &entry(), 150, now()).unwrap_err(),
            "missing title"
        );

        let outcome = interpret(&success(vec![(OUTPUT_NODE, "Sorry, I cannot.")]), &entry(), 150, now());
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed(FailureReason::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_guid_must_be_fresh() {
        let completion = "<item><guid>b2</guid><title>T</title><description>D</description></item>";
        assert!(parse_item(completion, &entry(), 150, now()).is_err());
    }

    #[test]
    fn test_description_is_clipped() {
        let long = vec!["mot"; 200].join(" ");
        let completion = format!(
            "<item><guid>g</guid><title>T</title><description>{long}</description></item>"
        );
        let item = parse_item(&completion, &entry(), 150, now()).unwrap();
        assert_eq!(text::word_count(&item.description), 150);
        assert!(item.description.ends_with('…'));
    }
}
