use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::models::{PriorityTier, TopicEntry, TopicMention};
use crate::scoring::round2;
use crate::stats;

pub const SIMILARITY_THRESHOLD: f64 = 0.3;
pub const BASELINE_PRIORITY: f64 = 50.0;
const FREQUENCY_WEIGHT: f64 = 0.5;
const URGENCY_Z_SPAN: f64 = 2.0;

pub fn normalize_topic(topic: &str) -> String {
    topic.trim().to_lowercase()
}

fn tokens(topic: &str) -> BTreeSet<&str> {
    topic.split_whitespace().collect()
}

pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left = tokens(a);
    let right = tokens(b);
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

pub fn are_related(a: &TopicEntry, b: &TopicEntry) -> bool {
    a.category == b.category && jaccard_similarity(&a.topic, &b.topic) >= SIMILARITY_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicCluster {
    pub category: String,
    pub topics: Vec<TopicEntry>,
}

/// First-match grouping: each topic joins the first earlier cluster holding a
/// related member. Output depends on input order.
pub fn cluster_topics(entries: &[TopicEntry]) -> Vec<TopicCluster> {
    let mut clusters: Vec<TopicCluster> = Vec::new();
    for entry in entries {
        let target = clusters
            .iter_mut()
            .find(|cluster| cluster.topics.iter().any(|member| are_related(member, entry)));
        match target {
            Some(cluster) => cluster.topics.push(entry.clone()),
            None => clusters.push(TopicCluster {
                category: entry.category.clone(),
                topics: vec![entry.clone()],
            }),
        }
    }
    clusters
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

impl TierThresholds {
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        Some(Self {
            p25: stats::percentile(scores, 25.0).ok()?,
            p50: stats::percentile(scores, 50.0).ok()?,
            p75: stats::percentile(scores, 75.0).ok()?,
        })
    }

    pub fn tier(&self, score: f64) -> PriorityTier {
        if score >= self.p75 {
            PriorityTier::Urgent
        } else if score >= self.p50 {
            PriorityTier::High
        } else if score >= self.p25 {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        }
    }
}

struct Aggregate {
    topic: String,
    category: String,
    people: HashSet<Uuid>,
    related_dimensions: BTreeSet<String>,
    sources: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TopicPrioritizer {
    population: usize,
    dimension_means: BTreeMap<String, f64>,
}

impl TopicPrioritizer {
    pub fn new(population: usize) -> Self {
        Self {
            population,
            dimension_means: BTreeMap::new(),
        }
    }

    pub fn with_dimension_means(mut self, means: BTreeMap<String, f64>) -> Self {
        self.dimension_means = means;
        self
    }

    /// 0-100 urgency centred on the baseline: a related dimension at the
    /// organisation mean (or no data at all) scores 50, two standard
    /// deviations below scores 100 and two above scores 0.
    fn urgency(&self, related: &BTreeSet<String>) -> f64 {
        let means: Vec<f64> = self.dimension_means.values().copied().collect();
        let (Ok(mean), Ok(sd)) = (stats::mean(&means), stats::standard_deviation(&means)) else {
            return BASELINE_PRIORITY;
        };
        related
            .iter()
            .filter_map(|dimension| self.dimension_means.get(dimension))
            .map(|value| -stats::z_score(*value, mean, sd))
            .max_by(f64::total_cmp)
            .map(|z| {
                let deviation = z.clamp(-URGENCY_Z_SPAN, URGENCY_Z_SPAN) / URGENCY_Z_SPAN;
                BASELINE_PRIORITY + deviation * BASELINE_PRIORITY
            })
            .unwrap_or(BASELINE_PRIORITY)
    }

    fn frequency_percentage(&self, frequency: usize) -> f64 {
        if self.population == 0 {
            0.0
        } else {
            frequency as f64 / self.population as f64 * 100.0
        }
    }

    fn aggregate(mentions: &[TopicMention]) -> Vec<Aggregate> {
        let mut order: Vec<Aggregate> = Vec::new();
        let mut index: BTreeMap<(String, String), usize> = BTreeMap::new();

        for mention in mentions {
            let topic = normalize_topic(&mention.topic);
            if topic.is_empty() {
                continue;
            }
            let category = mention.category.trim().to_string();
            let slot = *index.entry((topic.clone(), category.clone())).or_insert_with(|| {
                order.push(Aggregate {
                    topic,
                    category,
                    people: HashSet::new(),
                    related_dimensions: BTreeSet::new(),
                    sources: BTreeSet::new(),
                });
                order.len() - 1
            });
            let aggregate = &mut order[slot];
            aggregate.people.insert(mention.person_id);
            aggregate.sources.insert(mention.source.clone());
            aggregate
                .related_dimensions
                .extend(mention.related_dimensions.iter().cloned());
        }
        order
    }

    pub fn prioritize(&self, mentions: &[TopicMention]) -> Vec<TopicEntry> {
        let mut entries: Vec<TopicEntry> = Self::aggregate(mentions)
            .into_iter()
            .map(|aggregate| {
                let frequency = aggregate.people.len();
                let frequency_percentage = self.frequency_percentage(frequency);
                let urgency = self.urgency(&aggregate.related_dimensions);
                TopicEntry {
                    topic: aggregate.topic,
                    category: aggregate.category,
                    frequency,
                    frequency_percentage: round2(frequency_percentage),
                    related_dimensions: aggregate.related_dimensions,
                    sources: aggregate.sources,
                    priority_score: round2(
                        FREQUENCY_WEIGHT * frequency_percentage
                            + (1.0 - FREQUENCY_WEIGHT) * urgency,
                    ),
                    priority_tier: PriorityTier::Low,
                }
            })
            .collect();

        let scores: Vec<f64> = entries.iter().map(|entry| entry.priority_score).collect();
        if let Some(thresholds) = TierThresholds::from_scores(&scores) {
            debug!(?thresholds, topics = entries.len(), "topic tier thresholds");
            for entry in &mut entries {
                entry.priority_tier = thresholds.tier(entry.priority_score);
            }
        }

        entries.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationalContext {
    pub employee_count: usize,
    pub evaluated_count: usize,
    pub average_performance: Option<f64>,
    pub gap_by_dimension: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPlanRequest {
    pub topics: Vec<TopicEntry>,
    pub themes: Vec<TopicCluster>,
    pub context: OrganizationalContext,
}

impl TrainingPlanRequest {
    pub fn new(topics: Vec<TopicEntry>, context: OrganizationalContext) -> Self {
        let themes = cluster_topics(&topics);
        Self {
            topics,
            themes,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(person: Uuid, topic: &str, category: &str, source: &str) -> TopicMention {
        TopicMention {
            person_id: person,
            topic: topic.to_string(),
            category: category.to_string(),
            source: source.to_string(),
            related_dimensions: Vec::new(),
        }
    }

    fn entry(topic: &str, category: &str) -> TopicEntry {
        TopicEntry {
            topic: topic.to_string(),
            category: category.to_string(),
            frequency: 1,
            frequency_percentage: 10.0,
            related_dimensions: BTreeSet::new(),
            sources: BTreeSet::new(),
            priority_score: 30.0,
            priority_tier: PriorityTier::Low,
        }
    }

    #[test]
    fn similar_topics_in_same_category_cluster() {
        let a = entry("atención al cliente", "técnica");
        let b = entry("atención al usuario", "técnica");
        assert!(jaccard_similarity(&a.topic, &b.topic) >= SIMILARITY_THRESHOLD);
        assert!(are_related(&a, &b));

        let clusters = cluster_topics(&[a, b]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].topics.len(), 2);
    }

    #[test]
    fn unrelated_topics_never_cluster() {
        let a = entry("presupuesto municipal", "gestión");
        let b = entry("piano", "gestión");
        let c = entry("piano", "otra");
        assert_eq!(jaccard_similarity(&a.topic, &b.topic), 0.0);
        assert_eq!(cluster_topics(&[a.clone(), b]).len(), 2);
        assert_eq!(cluster_topics(&[a, c]).len(), 2);
    }

    #[test]
    fn same_words_in_other_category_stay_apart() {
        let a = entry("atención al cliente", "técnica");
        let b = entry("atención al cliente", "blanda");
        assert_eq!(cluster_topics(&[a, b]).len(), 2);
    }

    #[test]
    fn clustering_is_first_match() {
        // "excel basico" links to both earlier topics but joins the first cluster.
        let a = entry("excel avanzado", "técnica");
        let b = entry("word basico", "técnica");
        let c = entry("excel basico", "técnica");
        let clusters = cluster_topics(&[a, b, c]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].topics.len(), 2);
        assert_eq!(clusters[0].topics[1].topic, "excel basico");
    }

    #[test]
    fn frequency_counts_distinct_people_after_normalizing() {
        let ana = Uuid::new_v4();
        let luis = Uuid::new_v4();
        let mentions = vec![
            mention(ana, "  Excel Avanzado ", "técnica", "colleague request"),
            mention(ana, "excel avanzado", "técnica", "supervisor plan"),
            mention(luis, "EXCEL AVANZADO", "técnica", "colleague request"),
            mention(luis, "excel avanzado", "blanda", "colleague request"),
        ];
        let entries = TopicPrioritizer::new(10).prioritize(&mentions);
        assert_eq!(entries.len(), 2);
        let tecnica = entries.iter().find(|e| e.category == "técnica").unwrap();
        assert_eq!(tecnica.frequency, 2);
        assert_eq!(tecnica.frequency_percentage, 20.0);
        assert_eq!(tecnica.priority_score, 0.5 * 20.0 + 0.5 * BASELINE_PRIORITY);
        assert_eq!(tecnica.sources.len(), 2);
    }

    #[test]
    fn tiers_follow_batch_percentiles() {
        let people: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let mut mentions = Vec::new();
        for (topic, count) in [("a", 8), ("b", 6), ("c", 4), ("d", 2), ("e", 1)] {
            for person in people.iter().take(count) {
                mentions.push(mention(*person, topic, "general", "colleague request"));
            }
        }
        let entries = TopicPrioritizer::new(8).prioritize(&mentions);
        let tiers: Vec<(&str, PriorityTier)> =
            entries.iter().map(|e| (e.topic.as_str(), e.priority_tier)).collect();
        assert_eq!(
            tiers,
            vec![
                ("a", PriorityTier::Urgent),
                ("b", PriorityTier::Urgent),
                ("c", PriorityTier::High),
                ("d", PriorityTier::Medium),
                ("e", PriorityTier::Low),
            ]
        );
    }

    #[test]
    fn empty_mentions_are_not_an_error() {
        assert!(TopicPrioritizer::new(0).prioritize(&[]).is_empty());
        let request = TrainingPlanRequest::new(
            Vec::new(),
            OrganizationalContext {
                employee_count: 0,
                evaluated_count: 0,
                average_performance: None,
                gap_by_dimension: BTreeMap::new(),
            },
        );
        assert!(request.themes.is_empty());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topics"], serde_json::json!([]));
        assert!(json["context"]["gapByDimension"].is_object());
    }

    #[test]
    fn weak_dimensions_raise_urgency() {
        let person = Uuid::new_v4();
        let mut weak = mention(person, "liderazgo", "blanda", "supervisor plan");
        weak.related_dimensions = vec!["liderazgo".to_string()];
        let mut strong = mention(person, "planificación", "blanda", "supervisor plan");
        strong.related_dimensions = vec!["planificacion".to_string()];

        let means: BTreeMap<String, f64> = [
            ("liderazgo".to_string(), 2.0),
            ("planificacion".to_string(), 4.0),
        ]
        .into_iter()
        .collect();
        let entries = TopicPrioritizer::new(1)
            .with_dimension_means(means)
            .prioritize(&[weak, strong]);

        // One sd below the mean: urgency 75. One sd above: 25.
        assert_eq!(entries[0].topic, "liderazgo");
        assert_eq!(entries[0].priority_score, 87.5);
        assert_eq!(entries[1].priority_score, 62.5);
    }

    #[test]
    fn linked_topics_at_the_mean_rank_like_unlinked_ones() {
        let ana = Uuid::new_v4();
        let luis = Uuid::new_v4();
        let mut excel_ana = mention(ana, "excel", "técnica", "colleague request");
        excel_ana.related_dimensions = vec!["calidad".to_string()];
        let mut excel_luis = mention(luis, "excel", "técnica", "colleague request");
        excel_luis.related_dimensions = vec!["calidad".to_string()];
        let piano = mention(ana, "piano", "otra", "colleague request");

        let means: BTreeMap<String, f64> = [("calidad".to_string(), 3.5)].into_iter().collect();
        let entries = TopicPrioritizer::new(10)
            .with_dimension_means(means)
            .prioritize(&[piano, excel_ana, excel_luis]);

        assert_eq!(entries[0].topic, "excel");
        assert_eq!(entries[0].priority_score, 0.5 * 20.0 + 0.5 * BASELINE_PRIORITY);
        assert_eq!(entries[0].priority_tier, PriorityTier::Urgent);
        assert_eq!(entries[1].topic, "piano");
        assert_eq!(entries[1].priority_score, 0.5 * 10.0 + 0.5 * BASELINE_PRIORITY);
        assert_eq!(entries[1].priority_tier, PriorityTier::Low);
    }
}
