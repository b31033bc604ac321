use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::blend::BlendWeights;
use crate::error::{EngineError, Result as EngineResult};
use crate::instruments::InstrumentRegistry;
use crate::models::{
    Dimension, EmployeeProfile, EvaluationDraft, EvaluationPair, EvaluationPeriod, EvaluatorRole,
    FinalScore, Instrument, NineBoxPosition, ResponseMap, ScoredEmployee, TopicMention,
};
use crate::remote::ScoringBackend;

const SECTION_PERFORMANCE: &str = "performance";
const SECTION_POTENTIAL: &str = "potential";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgScoringBackend {
    pool: PgPool,
}

impl PgScoringBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoringBackend for PgScoringBackend {
    async fn calculate_final_score(
        &self,
        self_evaluation_id: Uuid,
        supervisor_evaluation_id: Uuid,
        instrument: &Instrument,
        blend: BlendWeights,
    ) -> EngineResult<Option<FinalScore>> {
        let config = serde_json::json!({ "instrument": instrument, "blend": blend });
        let payload: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT evaluation_engine.calculate_final_score($1, $2, $3)",
        )
        .bind(self_evaluation_id)
        .bind(supervisor_evaluation_id)
        .bind(config)
        .fetch_one(&self.pool)
        .await?;

        match payload {
            Some(serde_json::Value::Null) | None => Ok(None),
            Some(value) if !value.is_object() => Err(EngineError::Remote(format!(
                "calculate_final_score returned {value}"
            ))),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    async fn validate_complete(
        &self,
        responses: &ResponseMap,
        dimensions: &[Dimension],
    ) -> EngineResult<bool> {
        let complete: bool =
            sqlx::query_scalar("SELECT evaluation_engine.validate_complete($1, $2)")
                .bind(serde_json::to_value(responses)?)
                .bind(serde_json::to_value(dimensions)?)
                .fetch_one(&self.pool)
                .await?;
        Ok(complete)
    }

    async fn is_period_open(&self, period_id: Uuid, role: EvaluatorRole) -> EngineResult<bool> {
        let open: bool = sqlx::query_scalar("SELECT evaluation_engine.is_period_open($1, $2)")
            .bind(period_id)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(open)
    }
}

pub async fn fetch_period(pool: &PgPool, name: &str) -> anyhow::Result<EvaluationPeriod> {
    let row = sqlx::query(
        "SELECT id, name, status, starts_on, self_ends_on, supervisor_ends_on \
         FROM evaluation_engine.evaluation_periods WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("evaluation period {name} not found"))?;

    Ok(EvaluationPeriod {
        id: row.get("id"),
        name: row.get("name"),
        status: row.get("status"),
        starts_on: row.get("starts_on"),
        self_ends_on: row.get("self_ends_on"),
        supervisor_ends_on: row.get("supervisor_ends_on"),
    })
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> EmployeeProfile {
    EmployeeProfile {
        id: row.get("employee_id"),
        full_name: row.get("full_name"),
        area: row.get("area"),
        gender: row.get("gender"),
        job_type: row.get("job_type"),
        birth_date: row.get("birth_date"),
        hire_date: row.get("hire_date"),
    }
}

pub async fn fetch_evaluation_pairs(
    pool: &PgPool,
    period_id: Uuid,
    email: Option<&str>,
) -> anyhow::Result<Vec<EvaluationPair>> {
    let mut query = String::from(
        "SELECT e.id AS employee_id, e.full_name, e.area, e.gender, e.job_type, \
         e.birth_date, e.hire_date, e.instrument_id, ev.id AS evaluation_id, ev.role \
         FROM evaluation_engine.evaluations ev \
         JOIN evaluation_engine.employees e ON e.id = ev.employee_id \
         WHERE ev.period_id = $1",
    );
    if email.is_some() {
        query.push_str(" AND e.email = $2");
    }

    let mut rows = sqlx::query(&query).bind(period_id);
    if let Some(value) = email {
        rows = rows.bind(value);
    }
    let evaluations = rows.fetch_all(pool).await?;

    let responses = sqlx::query(
        "SELECT r.evaluation_id, r.item_id, r.rating, r.section \
         FROM evaluation_engine.evaluation_responses r \
         JOIN evaluation_engine.evaluations ev ON ev.id = r.evaluation_id \
         WHERE ev.period_id = $1",
    )
    .bind(period_id)
    .fetch_all(pool)
    .await?;

    let mut answers: HashMap<Uuid, (ResponseMap, ResponseMap)> = HashMap::new();
    for row in responses {
        let entry = answers.entry(row.get("evaluation_id")).or_default();
        let section: String = row.get("section");
        let target = if section == SECTION_POTENTIAL {
            &mut entry.1
        } else {
            &mut entry.0
        };
        target.insert(row.get("item_id"), row.get("rating"));
    }

    let mut pairs: BTreeMap<Uuid, EvaluationPair> = BTreeMap::new();
    for row in evaluations {
        let role_label: String = row.get("role");
        let Some(role) = EvaluatorRole::parse(&role_label) else {
            debug!(role = %role_label, "skipping evaluation with unknown role");
            continue;
        };
        let evaluation_id: Uuid = row.get("evaluation_id");
        let (performance, potential) = answers.remove(&evaluation_id).unwrap_or_default();
        let mut draft = EvaluationDraft::new(role, performance).with_id(evaluation_id);
        if !potential.is_empty() {
            draft = draft.with_potential(potential);
        }

        let pair = pairs
            .entry(row.get("employee_id"))
            .or_insert_with(|| EvaluationPair {
                employee: profile_from_row(&row),
                instrument_id: row.get("instrument_id"),
                self_draft: None,
                supervisor_draft: None,
            });
        match role {
            EvaluatorRole::SelfEvaluation => pair.self_draft = Some(draft),
            EvaluatorRole::Supervisor => pair.supervisor_draft = Some(draft),
        }
    }

    Ok(pairs.into_values().collect())
}

pub async fn save_final_score(
    pool: &PgPool,
    employee_id: Uuid,
    period_id: Uuid,
    score: &FinalScore,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO evaluation_engine.final_scores
        (employee_id, period_id, performance_self, performance_supervisor,
         performance_final, potential, nine_box_position, computed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        ON CONFLICT (employee_id, period_id) DO UPDATE
        SET performance_self = EXCLUDED.performance_self,
            performance_supervisor = EXCLUDED.performance_supervisor,
            performance_final = EXCLUDED.performance_final,
            potential = EXCLUDED.potential,
            nine_box_position = EXCLUDED.nine_box_position,
            computed_at = EXCLUDED.computed_at
        "#,
    )
    .bind(employee_id)
    .bind(period_id)
    .bind(score.performance_self)
    .bind(score.performance_supervisor)
    .bind(score.performance_final)
    .bind(score.potential)
    .bind(score.nine_box_position.map(|position| position.to_string()))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_scored_employees(
    pool: &PgPool,
    period_id: Uuid,
) -> anyhow::Result<Vec<ScoredEmployee>> {
    let rows = sqlx::query(
        "SELECT e.id AS employee_id, e.full_name, e.area, e.gender, e.job_type, \
         e.birth_date, e.hire_date, f.performance_self, f.performance_supervisor, \
         f.performance_final, f.potential, f.nine_box_position \
         FROM evaluation_engine.final_scores f \
         JOIN evaluation_engine.employees e ON e.id = f.employee_id \
         WHERE f.period_id = $1 ORDER BY e.full_name",
    )
    .bind(period_id)
    .fetch_all(pool)
    .await?;

    let mut employees = Vec::with_capacity(rows.len());
    for row in rows {
        let position: Option<String> = row.get("nine_box_position");
        let nine_box_position = position
            .map(NineBoxPosition::try_from)
            .transpose()
            .map_err(anyhow::Error::msg)?;
        employees.push(ScoredEmployee {
            profile: profile_from_row(&row),
            score: FinalScore {
                performance_self: row.get("performance_self"),
                performance_supervisor: row.get("performance_supervisor"),
                performance_final: row.get("performance_final"),
                potential: row.get("potential"),
                nine_box_position,
            },
        });
    }
    Ok(employees)
}

pub async fn count_employees(pool: &PgPool) -> anyhow::Result<usize> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM evaluation_engine.employees")
        .fetch_one(pool)
        .await?;
    Ok(usize::try_from(count)?)
}

pub async fn fetch_topic_mentions(
    pool: &PgPool,
    period_id: Uuid,
) -> anyhow::Result<Vec<TopicMention>> {
    let rows = sqlx::query(
        "SELECT employee_id, topic, category, source, related_dimensions \
         FROM evaluation_engine.training_topics WHERE period_id = $1 ORDER BY source_key",
    )
    .bind(period_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| TopicMention {
            person_id: row.get("employee_id"),
            topic: row.get("topic"),
            category: row.get("category"),
            source: row.get("source"),
            related_dimensions: row.get("related_dimensions"),
        })
        .collect())
}

struct SeedEmployee {
    name: &'static str,
    email: &'static str,
    instrument: &'static str,
    area: &'static str,
    gender: &'static str,
    job_type: &'static str,
    born: (i32, u32, u32),
    hired: (i32, u32, u32),
    self_base: i32,
    supervisor_base: i32,
    rate_potential: bool,
}

const SEED_EMPLOYEES: [SeedEmployee; 6] = [
    SeedEmployee {
        name: "Camila Rojas",
        email: "camila.rojas@municipio.cl",
        instrument: "A1",
        area: "Finanzas",
        gender: "F",
        job_type: "planta",
        born: (1986, 4, 12),
        hired: (2012, 3, 1),
        self_base: 4,
        supervisor_base: 4,
        rate_potential: true,
    },
    SeedEmployee {
        name: "Jorge Muñoz",
        email: "jorge.munoz@municipio.cl",
        instrument: "O1",
        area: "Operaciones",
        gender: "M",
        job_type: "contrata",
        born: (1972, 9, 3),
        hired: (1999, 6, 15),
        self_base: 5,
        supervisor_base: 3,
        rate_potential: true,
    },
    SeedEmployee {
        name: "Valentina Soto",
        email: "valentina.soto@municipio.cl",
        instrument: "A1",
        area: "Finanzas",
        gender: "F",
        job_type: "contrata",
        born: (1998, 1, 20),
        hired: (2023, 8, 1),
        self_base: 3,
        supervisor_base: 4,
        rate_potential: false,
    },
    SeedEmployee {
        name: "Pedro González",
        email: "pedro.gonzalez@municipio.cl",
        instrument: "J1",
        area: "Obras",
        gender: "M",
        job_type: "planta",
        born: (1968, 11, 30),
        hired: (2004, 1, 5),
        self_base: 4,
        supervisor_base: 5,
        rate_potential: true,
    },
    SeedEmployee {
        name: "Francisca Díaz",
        email: "francisca.diaz@municipio.cl",
        instrument: "O1",
        area: "Operaciones",
        gender: "F",
        job_type: "honorarios",
        born: (1991, 7, 7),
        hired: (2020, 10, 19),
        self_base: 3,
        supervisor_base: 2,
        rate_potential: true,
    },
    SeedEmployee {
        name: "Matías Fuentes",
        email: "matias.fuentes@municipio.cl",
        instrument: "A1",
        area: "Salud",
        gender: "M",
        job_type: "planta",
        born: (1980, 2, 14),
        hired: (2008, 5, 2),
        self_base: 4,
        supervisor_base: 3,
        rate_potential: true,
    },
];

const SEED_TOPICS: [(&str, &str, &str, &str, &[&str]); 9] = [
    (
        "camila.rojas@municipio.cl",
        "Excel avanzado",
        "técnica",
        "colleague request",
        &["conocimiento"],
    ),
    (
        "valentina.soto@municipio.cl",
        "excel avanzado",
        "técnica",
        "supervisor plan",
        &["conocimiento"],
    ),
    (
        "matias.fuentes@municipio.cl",
        "Excel básico",
        "técnica",
        "colleague request",
        &["conocimiento"],
    ),
    (
        "jorge.munoz@municipio.cl",
        "Atención al cliente",
        "blanda",
        "supervisor plan",
        &["atencion_usuario"],
    ),
    (
        "francisca.diaz@municipio.cl",
        "atención al usuario",
        "blanda",
        "colleague request",
        &["atencion_usuario"],
    ),
    (
        "francisca.diaz@municipio.cl",
        "Prevención de riesgos",
        "técnica",
        "supervisor plan",
        &["responsabilidad"],
    ),
    (
        "pedro.gonzalez@municipio.cl",
        "Liderazgo de equipos",
        "blanda",
        "colleague request",
        &["liderazgo"],
    ),
    (
        "pedro.gonzalez@municipio.cl",
        "Presupuesto municipal",
        "gestión",
        "supervisor plan",
        &["planificacion"],
    ),
    (
        "camila.rojas@municipio.cl",
        "Presupuesto municipal",
        "gestión",
        "colleague request",
        &["organizacion"],
    ),
];

fn seed_date((year, month, day): (i32, u32, u32)) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid date")
}

fn seed_rating(base: i32, index: usize) -> i32 {
    (base + (index % 3) as i32 - 1).clamp(1, 5)
}

async fn upsert_employee(
    pool: &PgPool,
    profile: &EmployeeProfile,
    email: &str,
    instrument_id: &str,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO evaluation_engine.employees
        (id, full_name, email, instrument_id, area, gender, job_type, birth_date, hire_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            instrument_id = EXCLUDED.instrument_id,
            area = EXCLUDED.area,
            gender = EXCLUDED.gender,
            job_type = EXCLUDED.job_type,
            birth_date = EXCLUDED.birth_date,
            hire_date = EXCLUDED.hire_date
        RETURNING id
        "#,
    )
    .bind(profile.id)
    .bind(&profile.full_name)
    .bind(email)
    .bind(instrument_id)
    .bind(&profile.area)
    .bind(&profile.gender)
    .bind(&profile.job_type)
    .bind(profile.birth_date)
    .bind(profile.hire_date)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_evaluation(
    pool: &PgPool,
    employee_id: Uuid,
    period_id: Uuid,
    role: EvaluatorRole,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO evaluation_engine.evaluations (id, employee_id, period_id, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (employee_id, period_id, role) DO UPDATE SET submitted_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(employee_id)
    .bind(period_id)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_response(
    pool: &PgPool,
    evaluation_id: Uuid,
    item_id: &str,
    rating: i32,
    section: &str,
) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO evaluation_engine.evaluation_responses (evaluation_id, item_id, rating, section)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (evaluation_id, item_id) DO UPDATE
        SET rating = EXCLUDED.rating, section = EXCLUDED.section
        "#,
    )
    .bind(evaluation_id)
    .bind(item_id)
    .bind(rating)
    .bind(section)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

async fn upsert_period(pool: &PgPool, period: &EvaluationPeriod) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO evaluation_engine.evaluation_periods
        (id, name, status, starts_on, self_ends_on, supervisor_ends_on)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (name) DO UPDATE SET status = EXCLUDED.status
        RETURNING id
        "#,
    )
    .bind(period.id)
    .bind(&period.name)
    .bind(&period.status)
    .bind(period.starts_on)
    .bind(period.self_ends_on)
    .bind(period.supervisor_ends_on)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

pub async fn seed(pool: &PgPool, registry: &InstrumentRegistry) -> anyhow::Result<()> {
    let period_id = upsert_period(
        pool,
        &EvaluationPeriod {
            id: Uuid::new_v4(),
            name: "2026".to_string(),
            status: "open".to_string(),
            starts_on: seed_date((2026, 9, 1))?,
            self_ends_on: seed_date((2026, 10, 15))?,
            supervisor_ends_on: seed_date((2026, 11, 15))?,
        },
    )
    .await?;

    let mut ids: HashMap<&str, Uuid> = HashMap::new();
    for seed in SEED_EMPLOYEES.iter() {
        let instrument = registry.resolve(seed.instrument)?;
        let profile = EmployeeProfile {
            id: Uuid::new_v4(),
            full_name: seed.name.to_string(),
            area: Some(seed.area.to_string()),
            gender: Some(seed.gender.to_string()),
            job_type: Some(seed.job_type.to_string()),
            birth_date: Some(seed_date(seed.born)?),
            hire_date: Some(seed_date(seed.hired)?),
        };
        let employee_id = upsert_employee(pool, &profile, seed.email, &instrument.id).await?;
        ids.insert(seed.email, employee_id);

        for (role, base) in [
            (EvaluatorRole::SelfEvaluation, seed.self_base),
            (EvaluatorRole::Supervisor, seed.supervisor_base),
        ] {
            let evaluation_id = upsert_evaluation(pool, employee_id, period_id, role).await?;
            let items = instrument
                .performance_dimensions
                .iter()
                .flat_map(|dimension| dimension.items.iter());
            for (index, item) in items.enumerate() {
                let rating = seed_rating(base, index);
                upsert_response(pool, evaluation_id, &item.id, rating, SECTION_PERFORMANCE).await?;
            }

            if role == EvaluatorRole::Supervisor && seed.rate_potential {
                let items = instrument
                    .potential_dimensions
                    .iter()
                    .flat_map(|dimension| dimension.items.iter());
                for (index, item) in items.enumerate() {
                    let rating = seed_rating(base, index + 1);
                    upsert_response(pool, evaluation_id, &item.id, rating, SECTION_POTENTIAL)
                        .await?;
                }
            }
        }
    }

    for (index, (email, topic, category, source, dimensions)) in SEED_TOPICS.iter().enumerate() {
        let employee_id = ids
            .get(email)
            .copied()
            .with_context(|| format!("seed topic references unknown employee {email}"))?;
        sqlx::query(
            r#"
            INSERT INTO evaluation_engine.training_topics
            (id, employee_id, period_id, topic, category, source, related_dimensions, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(period_id)
        .bind(topic)
        .bind(category)
        .bind(source)
        .bind(dimensions.iter().map(|d| d.to_string()).collect::<Vec<String>>())
        .bind(format!("seed-topic-{:03}", index + 1))
        .execute(pool)
        .await?;
    }

    info!(employees = SEED_EMPLOYEES.len(), topics = SEED_TOPICS.len(), "seed data written");
    Ok(())
}

pub async fn import_csv(
    pool: &PgPool,
    registry: &InstrumentRegistry,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        instrument: String,
        area: Option<String>,
        gender: Option<String>,
        job_type: Option<String>,
        birth_date: Option<NaiveDate>,
        hire_date: Option<NaiveDate>,
        period: String,
        role: String,
        item_id: String,
        rating: i32,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut periods: HashMap<String, Uuid> = HashMap::new();
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let row_number = line + 2;
        let instrument = registry.resolve(&row.instrument)?;
        let role = EvaluatorRole::parse(&row.role)
            .with_context(|| format!("row {row_number}: unknown role {}", row.role))?;
        if !(1..=5).contains(&row.rating) {
            anyhow::bail!("row {row_number}: rating {} outside 1-5", row.rating);
        }
        let section = if instrument
            .potential_dimensions
            .iter()
            .any(|d| d.items.iter().any(|item| item.id == row.item_id))
        {
            SECTION_POTENTIAL
        } else if instrument
            .performance_dimensions
            .iter()
            .any(|d| d.items.iter().any(|item| item.id == row.item_id))
        {
            SECTION_PERFORMANCE
        } else {
            anyhow::bail!(
                "row {row_number}: item {} not in instrument {}",
                row.item_id,
                instrument.id
            );
        };
        if section == SECTION_POTENTIAL && role == EvaluatorRole::SelfEvaluation {
            debug!(row = row_number, "self-evaluation potential answer ignored");
            continue;
        }

        let period_id = match periods.get(&row.period) {
            Some(id) => *id,
            None => {
                let id = fetch_period(pool, &row.period).await?.id;
                periods.insert(row.period.clone(), id);
                id
            }
        };

        let profile = EmployeeProfile {
            id: Uuid::new_v4(),
            full_name: row.full_name,
            area: row.area,
            gender: row.gender,
            job_type: row.job_type,
            birth_date: row.birth_date,
            hire_date: row.hire_date,
        };
        let employee_id = upsert_employee(pool, &profile, &row.email, &instrument.id).await?;
        let evaluation_id = upsert_evaluation(pool, employee_id, period_id, role).await?;
        if upsert_response(pool, evaluation_id, &row.item_id, row.rating, section).await? > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::compute_final_score;
    use crate::instruments::ScoringStrategy;
    use crate::models::Item;

    #[test]
    fn seed_ratings_stay_on_scale() {
        for base in 1..=5 {
            for index in 0..10 {
                let rating = seed_rating(base, index);
                assert!((1..=5).contains(&rating));
            }
        }
        assert_eq!(seed_rating(4, 0), 3);
        assert_eq!(seed_rating(4, 1), 4);
        assert_eq!(seed_rating(4, 2), 5);
    }

    #[test]
    fn seed_employees_use_known_instruments() {
        let registry = InstrumentRegistry::builtin().unwrap();
        for seed in SEED_EMPLOYEES.iter() {
            assert!(registry.resolve(seed.instrument).is_ok(), "{}", seed.email);
        }
        for (email, ..) in SEED_TOPICS.iter() {
            assert!(SEED_EMPLOYEES.iter().any(|seed| seed.email == *email));
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a Postgres server in DATABASE_URL"]
    async fn stored_scoring_matches_local_for_seed_data(pool: PgPool) -> anyhow::Result<()> {
        let registry = InstrumentRegistry::builtin()?;
        seed(&pool, &registry).await?;
        let period = fetch_period(&pool, "2026").await?;
        let backend = PgScoringBackend::new(pool.clone());

        let pairs = fetch_evaluation_pairs(&pool, period.id, None).await?;
        assert_eq!(pairs.len(), SEED_EMPLOYEES.len());
        for pair in pairs {
            let instrument = registry.resolve(&pair.instrument_id)?;
            let strategy = registry.strategy_for(&instrument.id);
            let self_draft = pair.self_draft.unwrap();
            let supervisor_draft = pair.supervisor_draft.unwrap();

            let local = compute_final_score(
                &self_draft,
                &supervisor_draft,
                &instrument.performance_dimensions,
                &strategy,
            )?;
            let remote = backend
                .calculate_final_score(
                    self_draft.id.unwrap(),
                    supervisor_draft.id.unwrap(),
                    instrument,
                    strategy.blend,
                )
                .await?;
            assert_eq!(remote, Some(local), "{}", pair.employee.full_name);
        }
        Ok(())
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a Postgres server in DATABASE_URL"]
    async fn stored_scoring_rounds_half_cents_and_pins_missing_potential(
        pool: PgPool,
    ) -> anyhow::Result<()> {
        let instrument = Instrument {
            id: "T1".to_string(),
            level: "prueba".to_string(),
            performance_dimensions: vec![Dimension {
                id: "calidad".to_string(),
                name: "Calidad".to_string(),
                description: String::new(),
                weight: 1.0,
                items: (1..=4u32)
                    .map(|n| Item {
                        id: format!("c{n}"),
                        text: String::new(),
                        order: n,
                    })
                    .collect(),
            }],
            potential_dimensions: Vec::new(),
        };
        let period_id = upsert_period(
            &pool,
            &EvaluationPeriod {
                id: Uuid::new_v4(),
                name: "prueba".to_string(),
                status: "open".to_string(),
                starts_on: seed_date((2026, 9, 1))?,
                self_ends_on: seed_date((2026, 10, 15))?,
                supervisor_ends_on: seed_date((2026, 11, 15))?,
            },
        )
        .await?;
        let profile = EmployeeProfile {
            id: Uuid::new_v4(),
            full_name: "Prueba".to_string(),
            area: None,
            gender: None,
            job_type: None,
            birth_date: None,
            hire_date: None,
        };
        let employee_id = upsert_employee(&pool, &profile, "prueba@municipio.cl", "T1").await?;
        let self_id =
            upsert_evaluation(&pool, employee_id, period_id, EvaluatorRole::SelfEvaluation).await?;
        let supervisor_id =
            upsert_evaluation(&pool, employee_id, period_id, EvaluatorRole::Supervisor).await?;

        let self_answers: ResponseMap = (1..=4).map(|n| (format!("c{n}"), 3)).collect();
        let supervisor_answers: ResponseMap = (1..=4)
            .map(|n| (format!("c{n}"), if n == 4 { 5 } else { 4 }))
            .collect();
        let evaluations = [(self_id, &self_answers), (supervisor_id, &supervisor_answers)];
        for (evaluation_id, answers) in evaluations {
            for (item, rating) in answers {
                upsert_response(&pool, evaluation_id, item, *rating, SECTION_PERFORMANCE).await?;
            }
        }

        let local = compute_final_score(
            &EvaluationDraft::new(EvaluatorRole::SelfEvaluation, self_answers).with_id(self_id),
            &EvaluationDraft::new(EvaluatorRole::Supervisor, supervisor_answers)
                .with_id(supervisor_id),
            &instrument.performance_dimensions,
            &ScoringStrategy::default(),
        )?;
        assert_eq!(local.performance_final, 3.88);
        assert_eq!(
            local.nine_box_position.map(|position| position.to_string()).as_deref(),
            Some("medium-medium")
        );

        let remote = PgScoringBackend::new(pool.clone())
            .calculate_final_score(self_id, supervisor_id, &instrument, BlendWeights::default())
            .await?;
        assert_eq!(remote, Some(local));

        let out_of_scale = upsert_response(&pool, self_id, "c1", 6, SECTION_PERFORMANCE).await;
        assert!(out_of_scale.is_err());
        Ok(())
    }
}
