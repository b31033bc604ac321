use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ResponseMap = BTreeMap<String, i32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(alias = "texto")]
    pub text: String,
    #[serde(alias = "orden", default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "descripcion", default)]
    pub description: String,
    #[serde(alias = "peso")]
    pub weight: f64,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    #[serde(alias = "nivel")]
    pub level: String,
    #[serde(alias = "dimensionesDesempeno")]
    pub performance_dimensions: Vec<Dimension>,
    #[serde(alias = "dimensionesPotencial", default)]
    pub potential_dimensions: Vec<Dimension>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorRole {
    #[serde(rename = "self")]
    SelfEvaluation,
    Supervisor,
}

impl EvaluatorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluatorRole::SelfEvaluation => "self",
            EvaluatorRole::Supervisor => "supervisor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "self" | "auto" | "autoevaluacion" => Some(EvaluatorRole::SelfEvaluation),
            "supervisor" | "jefe" | "jefatura" => Some(EvaluatorRole::Supervisor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDraft {
    pub id: Option<Uuid>,
    pub role: EvaluatorRole,
    pub responses: ResponseMap,
    #[serde(default)]
    pub potential_responses: Option<ResponseMap>,
}

impl EvaluationDraft {
    pub fn new(role: EvaluatorRole, responses: ResponseMap) -> Self {
        Self {
            id: None,
            role,
            responses,
            potential_responses: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_potential(mut self, responses: ResponseMap) -> Self {
        self.potential_responses = Some(responses);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NineBoxLevel {
    Low,
    Medium,
    High,
}

impl NineBoxLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NineBoxLevel::Low => "low",
            NineBoxLevel::Medium => "medium",
            NineBoxLevel::High => "high",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(NineBoxLevel::Low),
            "medium" => Some(NineBoxLevel::Medium),
            "high" => Some(NineBoxLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NineBoxPosition {
    pub performance: NineBoxLevel,
    pub potential: NineBoxLevel,
}

impl NineBoxPosition {
    pub fn new(performance: NineBoxLevel, potential: NineBoxLevel) -> Self {
        Self {
            performance,
            potential,
        }
    }

    pub fn label(&self) -> &'static str {
        use NineBoxLevel::*;
        match (self.performance, self.potential) {
            (High, High) => "Talento clave",
            (High, Medium) => "Alto desempeño",
            (High, Low) => "Profesional confiable",
            (Medium, High) => "Alto potencial",
            (Medium, Medium) => "Colaborador sólido",
            (Medium, Low) => "Colaborador efectivo",
            (Low, High) => "Potencial por desarrollar",
            (Low, Medium) => "Desempeño en riesgo",
            (Low, Low) => "Bajo desempeño",
        }
    }
}

impl fmt::Display for NineBoxPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.performance.as_str(), self.potential.as_str())
    }
}

impl TryFrom<String> for NineBoxPosition {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (perf, pot) = value
            .split_once('-')
            .ok_or_else(|| format!("invalid nine-box position: {value}"))?;
        match (NineBoxLevel::parse(perf), NineBoxLevel::parse(pot)) {
            (Some(performance), Some(potential)) => Ok(Self::new(performance, potential)),
            _ => Err(format!("invalid nine-box position: {value}")),
        }
    }
}

impl From<NineBoxPosition> for String {
    fn from(value: NineBoxPosition) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub performance_self: f64,
    pub performance_supervisor: f64,
    pub performance_final: f64,
    #[serde(default)]
    pub potential: Option<f64>,
    #[serde(default)]
    pub nine_box_position: Option<NineBoxPosition>,
}

impl FinalScore {
    pub fn has_two_axis_placement(&self) -> bool {
        self.potential.is_some() && self.nine_box_position.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    #[serde(rename = "urgent")]
    Urgent,
    #[serde(rename = "alta")]
    High,
    #[serde(rename = "media")]
    Medium,
    #[serde(rename = "baja")]
    Low,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Urgent => "urgent",
            PriorityTier::High => "alta",
            PriorityTier::Medium => "media",
            PriorityTier::Low => "baja",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMention {
    pub person_id: Uuid,
    pub topic: String,
    pub category: String,
    pub source: String,
    #[serde(default)]
    pub related_dimensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicEntry {
    pub topic: String,
    pub category: String,
    pub frequency: usize,
    pub frequency_percentage: f64,
    pub related_dimensions: BTreeSet<String>,
    pub sources: BTreeSet<String>,
    pub priority_score: f64,
    pub priority_tier: PriorityTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: Uuid,
    pub full_name: String,
    pub area: Option<String>,
    pub gender: Option<String>,
    pub job_type: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub hire_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEmployee {
    pub profile: EmployeeProfile,
    pub score: FinalScore,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationPair {
    pub employee: EmployeeProfile,
    pub instrument_id: String,
    pub self_draft: Option<EvaluationDraft>,
    pub supervisor_draft: Option<EvaluationDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPeriod {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub starts_on: NaiveDate,
    pub self_ends_on: NaiveDate,
    pub supervisor_ends_on: NaiveDate,
}

impl EvaluationPeriod {
    pub fn is_open_for(&self, role: EvaluatorRole, today: NaiveDate) -> bool {
        if self.status != "open" || today < self.starts_on {
            return false;
        }
        match role {
            EvaluatorRole::SelfEvaluation => today <= self.self_ends_on,
            EvaluatorRole::Supervisor => today <= self.supervisor_ends_on,
        }
    }
}
