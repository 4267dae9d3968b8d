//! Stage catalog: the six operational delay stages and the columns that carry
//! each stage's delay quantity and share.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Routing,
    TrunkTransport,
    DepotIntake,
    DepotDispatch,
    HubInbound,
    HubOutbound,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Routing => write!(f, "routing"),
            Self::TrunkTransport => write!(f, "trunk_transport"),
            Self::DepotIntake => write!(f, "depot_intake"),
            Self::DepotDispatch => write!(f, "depot_dispatch"),
            Self::HubInbound => write!(f, "hub_inbound"),
            Self::HubOutbound => write!(f, "hub_outbound"),
        }
    }
}

/// One catalog entry. `token` is matched as a substring of free-text
/// dominant-stage labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub stage: Stage,
    pub token: String,
    pub quantity_column: String,
    pub share_column: String,
}

impl StageSpec {
    fn new(stage: Stage, token: &str, quantity_column: &str, share_column: &str) -> Self {
        Self {
            stage,
            token: token.to_string(),
            quantity_column: quantity_column.to_string(),
            share_column: share_column.to_string(),
        }
    }
}

/// Default catalog, in evaluation order.
pub static DEFAULT_STAGES: Lazy<Vec<StageSpec>> = Lazy::new(|| {
    vec![
        StageSpec::new(Stage::Routing, "路由", "路由延误量", "路由占比"),
        StageSpec::new(Stage::TrunkTransport, "干线", "干线运输延误量", "干线运输占比"),
        StageSpec::new(Stage::DepotIntake, "交件", "网点交件延误量", "网点交件占比"),
        StageSpec::new(Stage::DepotDispatch, "发件", "网点发件延误量", "网点发件占比"),
        StageSpec::new(Stage::HubInbound, "进港", "中心进港延误量", "中心进港占比"),
        StageSpec::new(Stage::HubOutbound, "出港", "中心出港延误量", "中心出港占比"),
    ]
});

/// Which candidate wins when a label names several stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The last matching stage in catalog order. Historical reports were
    /// produced this way, so it stays the default.
    #[default]
    LastMatch,
    FirstMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMatch {
    NoMatch,
    Stage(Stage),
}

/// Result of classifying one label: the selected stage plus every stage whose
/// token occurred, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub selected: StageMatch,
    pub candidates: Vec<Stage>,
}

impl Classification {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct StageCatalog {
    specs: Vec<StageSpec>,
    tie_break: TieBreak,
}

impl StageCatalog {
    pub fn new(specs: Vec<StageSpec>, tie_break: TieBreak) -> Self {
        Self { specs, tie_break }
    }

    pub fn specs(&self) -> &[StageSpec] {
        &self.specs
    }

    pub fn spec(&self, stage: Stage) -> Option<&StageSpec> {
        self.specs.iter().find(|s| s.stage == stage)
    }

    pub fn quantity_columns(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.quantity_column.clone()).collect()
    }

    pub fn classify(&self, label: &str) -> Classification {
        let candidates: Vec<Stage> = self
            .specs
            .iter()
            .filter(|s| !s.token.is_empty() && label.contains(s.token.as_str()))
            .map(|s| s.stage)
            .collect();
        let picked = match self.tie_break {
            TieBreak::LastMatch => candidates.last(),
            TieBreak::FirstMatch => candidates.first(),
        };
        let selected = picked.map_or(StageMatch::NoMatch, |s| StageMatch::Stage(*s));
        Classification { selected, candidates }
    }
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_STAGES.clone(), TieBreak::default())
    }
}
