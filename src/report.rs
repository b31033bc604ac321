use std::fmt::Write;

use chrono::NaiveDate;

use crate::breakdown::{self, BreakdownAxis};
use crate::models::{EvaluationPeriod, ScoredEmployee, TopicEntry};
use crate::ninebox;
use crate::stats::{self, DescriptiveStats};

const TOP_TOPICS: usize = 10;

pub fn build_report(
    period: &EvaluationPeriod,
    employees: &[ScoredEmployee],
    topics: &[TopicEntry],
    on: NaiveDate,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Informe de Evaluación de Desempeño");
    let _ = writeln!(
        output,
        "Periodo {} ({} a {}), generado el {}",
        period.name, period.starts_on, period.supervisor_ends_on, on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Resumen");

    let finals: Vec<f64> = employees
        .iter()
        .map(|employee| employee.score.performance_final)
        .collect();
    match DescriptiveStats::from_sample(&finals) {
        Ok(summary) => {
            let _ = writeln!(output, "- Evaluados: {}", summary.n);
            let _ = writeln!(
                output,
                "- Promedio {:.2} (mediana {:.2}, desviación {:.2})",
                summary.mean, summary.median, summary.standard_deviation
            );
            let _ = writeln!(
                output,
                "- Rango {:.2} - {:.2}, Q1 {:.2}, Q3 {:.2}, CV {:.2}",
                summary.min, summary.max, summary.q1, summary.q3, summary.coefficient_of_variation
            );
            if let Some(mode) = stats::mode(&finals).ok().and_then(|modes| modes.first().copied()) {
                let _ = writeln!(output, "- Moda {mode:.2}");
            }
        }
        Err(_) => {
            let _ = writeln!(output, "No hay puntajes finales para este periodo.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Matriz 9-Box");
    let positions: Vec<_> = employees
        .iter()
        .filter_map(|employee| employee.score.nine_box_position)
        .collect();
    if positions.is_empty() {
        let _ = writeln!(output, "Sin clasificaciones registradas.");
    } else {
        for (position, count) in ninebox::distribution(&positions) {
            let _ = writeln!(output, "- {} ({}): {}", position, position.label(), count);
        }
        let degraded = employees
            .iter()
            .filter(|employee| {
                let score = &employee.score;
                score.nine_box_position.is_some() && !score.has_two_axis_placement()
            })
            .count();
        if degraded > 0 {
            let _ = writeln!(
                output,
                "- {degraded} clasificaciones sin potencial evaluado \
                 (eje de potencial fijado en medium)"
            );
        }
    }

    for axis in BreakdownAxis::ALL {
        let rows = breakdown::breakdown(axis, employees, on);
        let _ = writeln!(output);
        let _ = writeln!(output, "## Por {}", axis.title());
        if rows.is_empty() {
            let _ = writeln!(output, "Sin datos.");
            continue;
        }
        for row in rows {
            let _ = writeln!(
                output,
                "- {}: n={} promedio {:.2} (desv. {:.2}, mín {:.2}, máx {:.2})",
                row.group,
                row.stats.n,
                row.stats.mean,
                row.stats.standard_deviation,
                row.stats.min,
                row.stats.max
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Correlaciones");
    let correlations = breakdown::correlations(employees, on);
    if correlations.is_empty() {
        let _ = writeln!(output, "Datos insuficientes para calcular correlaciones.");
    } else {
        for row in correlations {
            let _ = writeln!(output, "- {}: r = {:.2} ({})", row.label, row.r, row.interpretation);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Temas de Capacitación Prioritarios");
    if topics.is_empty() {
        let _ = writeln!(output, "No se registraron temas de capacitación.");
    } else {
        for topic in topics.iter().take(TOP_TOPICS) {
            let _ = writeln!(
                output,
                "- [{}] {} ({}): {} personas, {:.1}% , puntaje {:.2}",
                topic.priority_tier.as_str(),
                topic.topic,
                topic.category,
                topic.frequency,
                topic.frequency_percentage,
                topic.priority_score
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmployeeProfile, FinalScore};
    use crate::ninebox::classify;
    use uuid::Uuid;

    fn period() -> EvaluationPeriod {
        EvaluationPeriod {
            id: Uuid::new_v4(),
            name: "2026".to_string(),
            status: "open".to_string(),
            starts_on: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            self_ends_on: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            supervisor_ends_on: NaiveDate::from_ymd_opt(2026, 11, 15).unwrap(),
        }
    }

    fn scored(name: &str, final_score: f64, potential: Option<f64>) -> ScoredEmployee {
        ScoredEmployee {
            profile: EmployeeProfile {
                id: Uuid::new_v4(),
                full_name: name.to_string(),
                area: Some("Finanzas".to_string()),
                gender: Some("F".to_string()),
                job_type: Some("planta".to_string()),
                birth_date: NaiveDate::from_ymd_opt(1990, 1, 1),
                hire_date: NaiveDate::from_ymd_opt(2015, 1, 1),
            },
            score: FinalScore {
                performance_self: final_score,
                performance_supervisor: final_score,
                performance_final: final_score,
                potential,
                nine_box_position: Some(classify(final_score, potential)),
            },
        }
    }

    #[test]
    fn empty_period_renders_placeholders() {
        let on = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let report = build_report(&period(), &[], &[], on);
        assert!(report.contains("No hay puntajes finales"));
        assert!(report.contains("No se registraron temas"));
        assert!(report.contains("Datos insuficientes"));
    }

    #[test]
    fn report_lists_nine_box_and_degraded_count() {
        let on = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let employees = vec![
            scored("Ana", 4.5, Some(4.5)),
            scored("Luis", 3.2, None),
            scored("Rosa", 2.0, Some(3.0)),
        ];
        let report = build_report(&period(), &employees, &[], on);
        assert!(report.contains("- Evaluados: 3"));
        assert!(report.contains("high-high (Talento clave): 1"));
        assert!(report.contains("1 clasificaciones sin potencial evaluado"));
        assert!(report.contains("## Por Área"));
        assert!(report.contains("- Finanzas: n=3"));
    }
}
