use serde::{Deserialize, Deserializer, Serialize};

/// Action that asks the backend to run the structural analysis pass.
pub const ANALYZE_ACTION: &str = "analyze_step1";

/// Message pushed by the analysis backend over the paper connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    #[serde(rename = "status_change")]
    StatusChanged {
        #[serde(rename = "msg")]
        message: String,
    },
    /// Incremental chunk, appended to the accumulated text of the run.
    #[serde(rename = "step1_stream")]
    TextChunk { content: String },
    /// Terminal result of the run. `data` may be null or missing.
    #[serde(rename = "step1_done")]
    ResultFinal {
        #[serde(rename = "data", default)]
        payload: Option<ResultPayload>,
    },
}

impl InboundEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::StatusChanged {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "status_change",
            Self::TextChunk { .. } => "step1_stream",
            Self::ResultFinal { .. } => "step1_done",
        }
    }
}

/// Fire-and-forget instruction sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub action: String,
}

impl OutboundCommand {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }

    pub fn analyze() -> Self {
        Self::new(ANALYZE_ACTION)
    }
}

/// Reads an explicit `null` as the type's default. `#[serde(default)]` only
/// covers missing keys.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Like [`null_as_default`] for lists, also defaulting `null` elements so
/// list positions are preserved.
fn null_as_default_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<Vec<Option<T>>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Structured analysis output. Every field is optional; an absent field
/// simply contributes nothing to the display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultPayload {
    pub title: Option<String>,
    pub research_gap: Option<String>,
    pub core_methodology: Option<String>,
    pub framework_map: Option<FrameworkMap>,
    pub flow_chart: Option<FlowChart>,
    pub structural_tree: Option<StructuralTree>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkMap {
    #[serde(deserialize_with = "null_as_default_list")]
    pub nodes: Vec<GraphNode>,
    #[serde(deserialize_with = "null_as_default_list")]
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphNode {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphLink {
    #[serde(deserialize_with = "null_as_default")]
    pub from: String,
    #[serde(deserialize_with = "null_as_default")]
    pub to: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowChart {
    pub title: Option<String>,
    #[serde(deserialize_with = "null_as_default_list")]
    pub steps: Vec<FlowStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowStep {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub detail: Option<String>,
}

/// Problem / method / experiment breakdown of the paper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralTree {
    #[serde(deserialize_with = "null_as_default_list")]
    pub problem_definition: Vec<String>,
    #[serde(deserialize_with = "null_as_default_list")]
    pub technical_approach: Vec<String>,
    #[serde(deserialize_with = "null_as_default_list")]
    pub empirical_evidence: Vec<String>,
}

impl ResultPayload {
    pub fn nodes(&self) -> &[GraphNode] {
        self.framework_map
            .as_ref()
            .map(|map| map.nodes.as_slice())
            .unwrap_or_default()
    }

    pub fn links(&self) -> &[GraphLink] {
        self.framework_map
            .as_ref()
            .map(|map| map.links.as_slice())
            .unwrap_or_default()
    }

    pub fn flow_steps(&self) -> &[FlowStep] {
        self.flow_chart
            .as_ref()
            .map(|chart| chart.steps.as_slice())
            .unwrap_or_default()
    }

    pub fn flow_title(&self) -> Option<&str> {
        self.flow_chart.as_ref().and_then(|chart| chart.title.as_deref())
    }
}

/// Visual classification of a display item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    Expanding,
    Focused,
    Final,
}

impl Stage {
    /// Fixed cycle order used for rotating transient items and laying out panels.
    pub const ALL: [Stage; 4] = [Stage::Initial, Stage::Expanding, Stage::Focused, Stage::Final];

    pub fn from_position(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn icon(self) -> &'static str {
        match self {
            Stage::Initial => "🧭",
            Stage::Expanding => "🧪",
            Stage::Focused => "🔬",
            Stage::Final => "✅",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Initial => "Initial · clues surface",
            Stage::Expanding => "Expanding · methods unfold",
            Stage::Focused => "Focused · key findings",
            Stage::Final => "Final · results settle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Derived from raw streamed text; regenerated on every chunk.
    Transient,
    /// Derived from the terminal payload; ids are stable.
    Final,
}

/// Unit of on-screen reveal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayItem {
    pub id: String,
    pub stage: Stage,
    pub icon: String,
    pub title: String,
    pub content: String,
    pub provenance: Provenance,
}

/// Lifecycle of the paper connection as seen by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection has been requested yet.
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}
