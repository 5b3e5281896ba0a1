//! Hotspot report built from the live views.

use crate::models::{Models, Module};
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::ModelError;
use serde::{Deserialize, Serialize};

/// Top-level report structure written to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the report was generated
    pub generated_at: String,

    /// Calls across all modules
    pub total_calls: u64,

    /// Modules with calls, hottest first
    pub modules: Vec<ModuleReport>,
}

/// One module and its hottest functions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleReport {
    pub name: String,
    pub path: String,
    pub calls: u64,

    /// Percentage of `total_calls`
    pub percentage: f64,

    pub functions: Vec<FunctionReport>,
}

/// One function row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionReport {
    pub name: String,

    /// Offset rendered as `0x...`
    pub offset: String,

    pub calls: u64,
}

/// Build a report from the current live views
///
/// Lists every module with calls and at most `top_functions` functions for
/// each. Collections not created yet are created (and loaded) on the way.
pub fn build_report(models: &Models, top_functions: usize) -> Result<HotspotReport, ModelError> {
    let modules: Vec<Module> = models.modules().all_with_calls().snapshot();
    let total_calls: u64 = modules.iter().map(|m| m.calls).sum();

    let mut reports = Vec::with_capacity(modules.len());
    for module in &modules {
        let view = models.functions().all_in_module(module)?;
        let functions = view
            .items()
            .iter()
            .take(top_functions)
            .map(|f| FunctionReport {
                name: f.name.clone(),
                offset: format!("{:#x}", f.offset),
                calls: f.calls,
            })
            .collect();

        reports.push(ModuleReport {
            name: module.name.clone(),
            path: module.path.clone(),
            calls: module.calls,
            percentage: percentage(module.calls, total_calls),
            functions,
        });
    }

    Ok(HotspotReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        total_calls,
        modules: reports,
    })
}

/// Render a report as plain text
pub fn text_summary(report: &HotspotReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} calls across {} modules\n",
        report.total_calls,
        report.modules.len()
    ));
    for module in &report.modules {
        out.push_str(&format!(
            "\n{:<40} {:>12} {:>6.1}%\n",
            module.name, module.calls, module.percentage
        ));
        for function in &module.functions {
            out.push_str(&format!(
                "  {:<38} {:>12} {:>10}\n",
                function.name, function.calls, function.offset
            ));
        }
    }
    out
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(25, 100), 25.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_text_summary_lists_functions() {
        let report = HotspotReport {
            version: SCHEMA_VERSION.to_string(),
            generated_at: "2024-01-01T00:00:00Z".to_string(),
            total_calls: 8,
            modules: vec![ModuleReport {
                name: "libfoo.so".to_string(),
                path: "/usr/lib/libfoo.so".to_string(),
                calls: 8,
                percentage: 100.0,
                functions: vec![FunctionReport {
                    name: "foo_20".to_string(),
                    offset: "0x20".to_string(),
                    calls: 8,
                }],
            }],
        };

        let text = text_summary(&report);
        assert!(text.starts_with("8 calls across 1 modules"));
        assert!(text.contains("libfoo.so"));
        assert!(text.contains("foo_20"));
    }
}
