use serde::Deserialize;

use jobset_core::JobColor;

const DEFAULT_MAX_HISTORY: usize = 100;
const DEFAULT_PROCESSING_TIME_MS: i64 = 60_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Oldest steps are dropped once the log grows past this.
    pub max_history: usize,
    /// Processing time given to procedures created without one.
    pub default_processing_time_ms: i64,
    /// Cycled through when new jobs are added.
    pub job_color_palette: Vec<JobColor>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let palette = [
            ("#1f77b4", "#ffffff"),
            ("#ff7f0e", "#000000"),
            ("#2ca02c", "#ffffff"),
            ("#d62728", "#ffffff"),
            ("#9467bd", "#ffffff"),
            ("#8c564b", "#ffffff"),
            ("#e377c2", "#000000"),
            ("#7f7f7f", "#ffffff"),
            ("#bcbd22", "#000000"),
            ("#17becf", "#000000"),
        ];
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            default_processing_time_ms: DEFAULT_PROCESSING_TIME_MS,
            job_color_palette: palette
                .into_iter()
                .map(|(color, text_color)| JobColor {
                    color: color.to_string(),
                    text_color: text_color.to_string(),
                })
                .collect(),
        }
    }
}

impl EditorConfig {
    /// Color for the `index`-th job. Falls back to grey on an empty palette.
    pub fn job_color(&self, index: usize) -> JobColor {
        if self.job_color_palette.is_empty() {
            return JobColor {
                color: "#7f7f7f".to_string(),
                text_color: "#ffffff".to_string(),
            };
        }
        self.job_color_palette[index % self.job_color_palette.len()].clone()
    }
}
