use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::blend::BlendWeights;
use crate::error::{EngineError, Result};
use crate::models::{Dimension, Instrument, Item, ResponseMap};
use crate::scoring;

pub const WEIGHT_TOLERANCE: f64 = 1e-3;

pub type PerformanceFn = fn(&ResponseMap, &[Dimension]) -> f64;

#[derive(Clone, Copy)]
pub struct ScoringStrategy {
    pub performance: PerformanceFn,
    pub blend: BlendWeights,
}

impl fmt::Debug for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringStrategy")
            .field("blend", &self.blend)
            .finish_non_exhaustive()
    }
}

impl Default for ScoringStrategy {
    fn default() -> Self {
        Self {
            performance: scoring::performance_score,
            blend: BlendWeights::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstrumentRegistry {
    instruments: Vec<Instrument>,
    by_key: HashMap<String, usize>,
    strategies: HashMap<String, ScoringStrategy>,
}

impl InstrumentRegistry {
    pub fn new(instruments: Vec<Instrument>) -> Result<Self> {
        let mut by_key = HashMap::new();

        for (index, instrument) in instruments.iter().enumerate() {
            validate_weights(
                &format!("{} performance", instrument.id),
                &instrument.performance_dimensions,
            )?;
            if !instrument.potential_dimensions.is_empty() {
                validate_weights(
                    &format!("{} potential", instrument.id),
                    &instrument.potential_dimensions,
                )?;
            }

            let id_key = normalize_key(&instrument.id);
            if by_key.insert(id_key, index).is_some() {
                return Err(EngineError::DuplicateInstrument(instrument.id.clone()));
            }
            by_key.entry(normalize_key(&instrument.level)).or_insert(index);
            debug!(instrument = %instrument.id, level = %instrument.level, "instrument registered");
        }

        Ok(Self {
            instruments,
            by_key,
            strategies: HashMap::new(),
        })
    }

    pub fn builtin() -> Result<Self> {
        let registry = Self::new(catalog())?;
        registry.with_strategy(
            "J1",
            ScoringStrategy {
                blend: BlendWeights::new(0.6, 0.4)?,
                ..ScoringStrategy::default()
            },
        )
    }

    pub fn from_json_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let instruments: Vec<Instrument> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), count = instruments.len(), "loaded instrument file");
        Self::new(instruments)
    }

    pub fn with_strategy(mut self, instrument_id: &str, strategy: ScoringStrategy) -> Result<Self> {
        let instrument = self.resolve(instrument_id)?;
        let key = normalize_key(&instrument.id);
        self.strategies.insert(key, strategy);
        Ok(self)
    }

    pub fn resolve(&self, id_or_level: &str) -> Result<&Instrument> {
        self.by_key
            .get(&normalize_key(id_or_level))
            .map(|index| &self.instruments[*index])
            .ok_or_else(|| EngineError::UnknownInstrument(id_or_level.to_string()))
    }

    pub fn strategy_for(&self, instrument_id: &str) -> ScoringStrategy {
        self.strategies
            .get(&normalize_key(instrument_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }
}

fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn validate_weights(list: &str, dimensions: &[Dimension]) -> Result<()> {
    let sum: f64 = dimensions.iter().map(|dimension| dimension.weight).sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(EngineError::InvalidWeights {
            list: list.to_string(),
            sum,
        });
    }
    Ok(())
}

fn dimension(
    prefix: &str,
    id: &str,
    name: &str,
    description: &str,
    weight: f64,
    items: &[&str],
) -> Dimension {
    Dimension {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        weight,
        items: items
            .iter()
            .enumerate()
            .map(|(index, text)| Item {
                id: format!("{prefix}-{id}-{}", index + 1),
                text: text.to_string(),
                order: index as u32 + 1,
            })
            .collect(),
    }
}

fn catalog() -> Vec<Instrument> {
    vec![operational(), administrative(), management()]
}

fn operational() -> Instrument {
    let p = "O1";
    Instrument {
        id: p.to_string(),
        level: "operativo".to_string(),
        performance_dimensions: vec![
            dimension(
                p,
                "calidad",
                "Calidad del trabajo",
                "Exactitud y prolijidad de las tareas",
                35.0 / 140.0,
                &[
                    "Realiza sus tareas sin errores",
                    "Cuida las herramientas y materiales asignados",
                    "Termina los trabajos de acuerdo con lo solicitado",
                ],
            ),
            dimension(
                p,
                "productividad",
                "Productividad",
                "Volumen y oportunidad del trabajo",
                30.0 / 140.0,
                &[
                    "Cumple los plazos asignados",
                    "Mantiene un ritmo de trabajo constante",
                ],
            ),
            dimension(
                p,
                "responsabilidad",
                "Responsabilidad",
                "Asistencia, puntualidad y normas",
                25.0 / 140.0,
                &[
                    "Es puntual",
                    "Respeta las normas de seguridad",
                ],
            ),
            dimension(
                p,
                "trabajo_equipo",
                "Trabajo en equipo",
                "Colaboración con compañeros",
                25.0 / 140.0,
                &[
                    "Colabora con sus compañeros",
                    "Comparte información útil",
                ],
            ),
            dimension(
                p,
                "atencion_usuario",
                "Atención al usuario",
                "Trato con vecinos y usuarios",
                25.0 / 140.0,
                &[
                    "Trata con respeto a los vecinos",
                    "Orienta al usuario cuando lo necesita",
                ],
            ),
        ],
        potential_dimensions: vec![
            dimension(p, "aprendizaje", "Aprendizaje", "Disposición a aprender", 0.5, &[
                "Aprende nuevas tareas con rapidez",
                "Busca mejorar su forma de trabajar",
            ]),
            dimension(p, "adaptabilidad", "Adaptabilidad", "Respuesta ante cambios", 0.5, &[
                "Se adapta a cambios de prioridades",
                "Asume tareas nuevas sin resistencia",
            ]),
        ],
    }
}

fn administrative() -> Instrument {
    let p = "A1";
    Instrument {
        id: p.to_string(),
        level: "administrativo".to_string(),
        performance_dimensions: vec![
            dimension(
                p,
                "calidad",
                "Calidad del trabajo",
                "Exactitud de trámites y documentos",
                0.30,
                &[
                    "Elabora documentos sin errores",
                    "Revisa su trabajo antes de entregarlo",
                    "Aplica correctamente los procedimientos",
                ],
            ),
            dimension(
                p,
                "organizacion",
                "Organización",
                "Planificación del propio trabajo",
                0.25,
                &[
                    "Prioriza sus tareas adecuadamente",
                    "Mantiene ordenados los expedientes",
                ],
            ),
            dimension(
                p,
                "conocimiento",
                "Conocimiento del puesto",
                "Dominio de normas y sistemas",
                0.20,
                &[
                    "Conoce la normativa aplicable",
                    "Utiliza los sistemas informáticos con soltura",
                ],
            ),
            dimension(p, "comunicacion", "Comunicación", "Claridad oral y escrita", 0.15, &[
                "Se expresa con claridad",
                "Informa oportunamente a su jefatura",
            ]),
            dimension(p, "compromiso", "Compromiso", "Identificación con el servicio", 0.10, &[
                "Muestra disposición a colaborar",
            ]),
        ],
        potential_dimensions: vec![
            dimension(p, "aprendizaje", "Aprendizaje", "Disposición a aprender", 1.0 / 3.0, &[
                "Incorpora nuevos conocimientos",
            ]),
            dimension(p, "iniciativa", "Iniciativa", "Propuestas de mejora", 1.0 / 3.0, &[
                "Propone mejoras a los procesos",
            ]),
            dimension(p, "liderazgo", "Liderazgo", "Influencia positiva en el equipo", 1.0 / 3.0, &[
                "Orienta a compañeros nuevos",
            ]),
        ],
    }
}

fn management() -> Instrument {
    let p = "J1";
    Instrument {
        id: p.to_string(),
        level: "jefatura".to_string(),
        performance_dimensions: vec![
            dimension(p, "liderazgo", "Liderazgo", "Conducción del equipo", 0.30, &[
                "Comunica objetivos claros",
                "Reconoce el trabajo de su equipo",
                "Resuelve conflictos oportunamente",
            ]),
            dimension(
                p,
                "planificacion",
                "Planificación",
                "Definición y seguimiento de metas",
                0.25,
                &[
                    "Planifica las actividades de la unidad",
                    "Hace seguimiento de los compromisos",
                ],
            ),
            dimension(p, "gestion_equipo", "Gestión de personas", "Desarrollo del equipo", 0.25, &[
                "Retroalimenta a sus colaboradores",
                "Delega de acuerdo con las capacidades",
            ]),
            dimension(
                p,
                "resultados",
                "Orientación a resultados",
                "Logro de metas de gestión",
                0.20,
                &[
                    "Cumple las metas de la unidad",
                    "Usa los recursos de forma eficiente",
                ],
            ),
        ],
        potential_dimensions: vec![
            dimension(p, "vision", "Visión estratégica", "Mirada de mediano plazo", 0.5, &[
                "Anticipa necesidades del servicio",
                "Vincula su unidad con la estrategia municipal",
            ]),
            dimension(
                p,
                "desarrollo_personas",
                "Desarrollo de personas",
                "Formación de sucesores",
                0.5,
                &[
                    "Prepara a otros para asumir responsabilidades",
                ],
            ),
        ],
    }
}
